use crate::matrix::Matrix;
use crate::polynomial::CoeffOps;

#[derive(Debug, Clone)]
pub enum LinearResult<C> {
    Unique(LinearSolution<C>),
    Infinite(LinearFamily<C>),
    Inconsistent(LinearInconsistent),
}

#[derive(Debug, Clone)]
pub struct LinearSolution<C> {
    pub values: Vec<C>,
    pub diagnostics: LinearDiagnostics<C>,
}

/// Solution set `particular + Σ tᵢ·basis[i]`.
#[derive(Debug, Clone)]
pub struct LinearFamily<C> {
    pub particular: Vec<C>,
    pub basis: Vec<Vec<C>>,
    pub diagnostics: LinearDiagnostics<C>,
}

#[derive(Debug, Clone)]
pub struct LinearInconsistent {
    pub inconsistent_row: usize,
    pub rank: usize,
}

#[derive(Debug, Clone)]
pub struct LinearDiagnostics<C> {
    pub rank: usize,
    pub pivot_rows: Vec<usize>,
    pub pivot_columns: Vec<usize>,
    pub free_columns: Vec<usize>,
    pub determinant: Option<C>,
    pub inconsistent_row: Option<usize>,
}

impl<C> Default for LinearDiagnostics<C> {
    fn default() -> Self {
        LinearDiagnostics {
            rank: 0,
            pivot_rows: Vec::new(),
            pivot_columns: Vec::new(),
            free_columns: Vec::new(),
            determinant: None,
            inconsistent_row: None,
        }
    }
}

/// Solve `coefficients · x = rhs` by Gauss–Jordan elimination.
///
/// Entries whose `pivot_weight` falls below `tolerance` times the largest
/// weight in the system count as zero; pass `0.0` for exact fields.
pub fn solve_linear<C: CoeffOps>(
    coefficients: &Matrix<C>,
    rhs: &[C],
    tolerance: f64,
) -> LinearResult<C> {
    let n_vars = coefficients.cols();
    let mut matrix = augment(coefficients, rhs);
    let scale = (0..matrix.rows())
        .flat_map(|r| matrix.row(r).iter().map(CoeffOps::pivot_weight).collect::<Vec<_>>())
        .fold(0.0, f64::max);
    let threshold = tolerance * scale;

    let mut diagnostics = LinearDiagnostics {
        determinant: (matrix.rows() == n_vars).then(C::one),
        ..LinearDiagnostics::default()
    };

    rref(&mut matrix, n_vars, threshold, &mut diagnostics);
    diagnostics.free_columns = free_columns(n_vars, &diagnostics.pivot_columns);

    if let Some(row) = diagnostics.inconsistent_row {
        return LinearResult::Inconsistent(LinearInconsistent {
            inconsistent_row: row,
            rank: diagnostics.rank,
        });
    }

    let mut particular = vec![C::zero(); n_vars];
    for (&row, &col) in diagnostics
        .pivot_rows
        .iter()
        .zip(diagnostics.pivot_columns.iter())
    {
        particular[col] = matrix.get(row, n_vars).clone();
    }

    if diagnostics.rank == n_vars {
        return LinearResult::Unique(LinearSolution {
            values: particular,
            diagnostics,
        });
    }

    let mut basis = Vec::new();
    for &free_col in &diagnostics.free_columns {
        let mut vec = vec![C::zero(); n_vars];
        vec[free_col] = C::one();
        for (&row, &pivot_col) in diagnostics
            .pivot_rows
            .iter()
            .zip(diagnostics.pivot_columns.iter())
        {
            let coeff = matrix.get(row, free_col);
            if !coeff.is_zero() {
                vec[pivot_col] = coeff.neg();
            }
        }
        basis.push(vec);
    }

    LinearResult::Infinite(LinearFamily {
        particular,
        basis,
        diagnostics,
    })
}

fn augment<C: CoeffOps>(coefficients: &Matrix<C>, rhs: &[C]) -> Matrix<C> {
    let rows = (0..coefficients.rows())
        .map(|r| {
            let mut row = coefficients.row(r).to_vec();
            row.push(rhs.get(r).cloned().unwrap_or_else(C::zero));
            row
        })
        .collect();
    Matrix::from_rows(rows)
}

fn negligible<C: CoeffOps>(value: &C, threshold: f64) -> bool {
    value.is_zero() || value.pivot_weight() <= threshold
}

fn rref<C: CoeffOps>(
    matrix: &mut Matrix<C>,
    n_vars: usize,
    threshold: f64,
    diag: &mut LinearDiagnostics<C>,
) {
    let rows = matrix.rows();
    if rows == 0 {
        diag.rank = 0;
        return;
    }
    let cols = matrix.cols();
    let mut row = 0;
    for col in 0..n_vars {
        if row >= rows {
            break;
        }

        let mut pivot_row = None;
        let mut pivot_weight = threshold;
        for r in row..rows {
            let value = matrix.get(r, col);
            if !negligible(value, threshold) && value.pivot_weight() > pivot_weight {
                pivot_weight = value.pivot_weight();
                pivot_row = Some(r);
            }
        }
        // Exact fields with non-numeric entries weigh 1; take the first nonzero.
        if pivot_row.is_none() && threshold == 0.0 {
            pivot_row = (row..rows).find(|&r| !matrix.get(r, col).is_zero());
        }

        let Some(pivot_idx) = pivot_row else {
            continue;
        };

        if pivot_idx != row {
            matrix.swap_rows(row, pivot_idx);
            if let Some(det) = diag.determinant.as_mut() {
                *det = det.neg();
            }
        }

        let pivot_value = matrix.get(row, col).clone();
        if let Some(det) = diag.determinant.as_mut() {
            *det = det.mul(&pivot_value);
        }

        for c in col..cols {
            let cell = matrix.get_mut(row, c);
            *cell = cell.div(&pivot_value);
        }

        let row_start = row * cols;
        let (before, rest) = matrix.data_mut().split_at_mut(row_start);
        let (pivot_row_slice, after) = rest.split_at_mut(cols);
        let pivot_row_ref: &[C] = &*pivot_row_slice;

        for rrow in before
            .chunks_exact_mut(cols)
            .chain(after.chunks_exact_mut(cols))
        {
            let factor = rrow[col].clone();
            if factor.is_zero() {
                continue;
            }
            for c in col..cols {
                rrow[c] = rrow[c].sub(&factor.mul(&pivot_row_ref[c]));
            }
            rrow[col] = C::zero();
        }

        diag.pivot_rows.push(row);
        diag.pivot_columns.push(col);
        row += 1;
    }

    diag.rank = diag.pivot_columns.len();
    if let Some(det) = diag.determinant.as_mut() {
        if diag.rank < n_vars {
            *det = C::zero();
        }
    }

    for r in row..rows {
        let row_slice = matrix.row(r);
        let all_zero = (0..n_vars).all(|c| negligible(&row_slice[c], threshold));
        if all_zero && !negligible(&row_slice[n_vars], threshold) {
            diag.inconsistent_row = Some(r);
            break;
        }
    }
}

fn free_columns(n_vars: usize, pivots: &[usize]) -> Vec<usize> {
    let mut is_pivot = vec![false; n_vars];
    for &p in pivots {
        is_pivot[p] = true;
    }
    (0..n_vars).filter(|&col| !is_pivot[col]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{rational, Rational};
    use num_complex::Complex64;

    fn q(n: i64) -> Rational {
        rational(n, 1)
    }

    #[test]
    fn unique_solution_with_determinant() {
        let a = Matrix::from_rows(vec![vec![q(1), q(1)], vec![q(1), q(-1)]]);
        let LinearResult::Unique(solution) = solve_linear(&a, &[q(3), q(1)], 0.0) else {
            panic!("expected a unique solution");
        };
        assert_eq!(solution.values, vec![q(2), q(1)]);
        assert_eq!(solution.diagnostics.determinant, Some(q(-2)));
    }

    #[test]
    fn dependent_rows_leave_a_family() {
        let a = Matrix::from_rows(vec![vec![q(1), q(2)], vec![q(2), q(4)]]);
        let LinearResult::Infinite(family) = solve_linear(&a, &[q(1), q(2)], 0.0) else {
            panic!("expected a family");
        };
        assert_eq!(family.diagnostics.free_columns, vec![1]);
        assert_eq!(family.basis, vec![vec![q(-2), q(1)]]);
    }

    #[test]
    fn contradiction_is_reported() {
        let a = Matrix::from_rows(vec![vec![q(1), q(1)], vec![q(1), q(1)]]);
        assert!(matches!(
            solve_linear(&a, &[q(1), q(2)], 0.0),
            LinearResult::Inconsistent(_)
        ));
    }

    #[test]
    fn numeric_noise_counts_as_dependence() {
        let c = |re: f64| Complex64::new(re, 0.0);
        let a = Matrix::from_rows(vec![vec![c(1.0), c(1.0)], vec![c(1.0), c(1.0 + 1e-15)]]);
        let result = solve_linear(&a, &[c(1.0), c(1.0)], 1e-10);
        assert!(matches!(result, LinearResult::Infinite(_)));
    }
}
