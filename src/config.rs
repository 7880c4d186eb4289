//! Knobs for closure discovery and recurrence solving.

/// How characteristic roots are found.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RootMode {
    /// Exact roots in the coefficient field. Parameter-free polynomials that do
    /// not split over the rationals fall back to numeric complex roots.
    Exact,
    /// Numeric roots; a root whose imaginary part exceeds `epsilon` is an error.
    NumericReal { epsilon: f64 },
    /// Numeric complex roots, clustered within `epsilon`.
    NumericComplex { epsilon: f64 },
}

impl Default for RootMode {
    fn default() -> Self {
        RootMode::Exact
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecurrenceConfig {
    /// Upper bound on the number of monomials closure discovery may collect.
    pub max_monomials: usize,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        RecurrenceConfig { max_monomials: 256 }
    }
}

impl RecurrenceConfig {
    pub fn with_max_monomials(mut self, max_monomials: usize) -> Self {
        self.max_monomials = max_monomials;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    pub root_mode: RootMode,
    /// Use the cyclic solver even when the dependency graph is acyclic.
    pub force_cyclic: bool,
    /// Clustering tolerance used when exact root finding falls back to numerics.
    pub fallback_epsilon: f64,
    /// Extra equations the ansatz fit may add beyond the unknown count.
    pub max_fit_rounds: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            root_mode: RootMode::Exact,
            force_cyclic: false,
            fallback_epsilon: 1e-9,
            max_fit_rounds: 32,
        }
    }
}

impl SolverConfig {
    pub fn with_root_mode(mut self, root_mode: RootMode) -> Self {
        self.root_mode = root_mode;
        self
    }

    pub fn with_force_cyclic(mut self, force_cyclic: bool) -> Self {
        self.force_cyclic = force_cyclic;
        self
    }

    pub fn with_fallback_epsilon(mut self, epsilon: f64) -> Self {
        self.fallback_epsilon = epsilon;
        self
    }

    pub fn with_max_fit_rounds(mut self, rounds: usize) -> Self {
        self.max_fit_rounds = rounds;
        self
    }
}
