//! From programs to linear recurrence systems over monomials.

mod differential;
mod resolver;
mod system;

use std::collections::{HashSet, VecDeque};

use tracing::debug;

pub use differential::DifferentialResolver;
pub use resolver::Resolver;
pub use system::{Recurrences, Trajectory};

use crate::config::RecurrenceConfig;
use crate::error::{MomentError, Result};
use crate::multipoly::Monomial;
use crate::program::StatePoly;
use crate::ratfunc::RatFunc;

/// Source of one-step recurrences and initial values for monomials.
pub trait MomentResolver {
    /// `E[monomial]` after one more iteration, in terms of the state before it.
    fn get_recurrence(&mut self, monomial: &Monomial) -> Result<StatePoly>;

    /// `E[monomial]` before the first iteration.
    fn get_initial_value(&mut self, monomial: &Monomial) -> Result<RatFunc>;
}

/// Discover the closed set of monomials `goal` depends on, breadth first, and
/// assemble their recurrences.
pub fn get_recurrences<R>(
    resolver: &mut R,
    goal: &Monomial,
    config: &RecurrenceConfig,
) -> Result<Recurrences>
where
    R: MomentResolver + ?Sized,
{
    let mut seen: HashSet<Monomial> = HashSet::from([goal.clone()]);
    let mut queue = VecDeque::from([goal.clone()]);
    let mut entries = Vec::new();

    while let Some(monomial) = queue.pop_front() {
        let rhs = resolver.get_recurrence(&monomial)?;
        for next in rhs.monomials() {
            if next.is_one() || seen.contains(next) {
                continue;
            }
            if seen.len() >= config.max_monomials {
                return Err(MomentError::ClosureLimit {
                    limit: config.max_monomials,
                });
            }
            seen.insert(next.clone());
            queue.push_back(next.clone());
        }
        entries.push((monomial, rhs));
    }

    let initial_values = entries
        .iter()
        .map(|(monomial, _)| resolver.get_initial_value(monomial))
        .collect::<Result<Vec<_>>>()?;

    debug!(goal = %goal, monomials = entries.len(), "closure discovered");
    Recurrences::new(entries, initial_values)
}

/// Hands out identifiers that collide neither with reserved names nor with
/// each other.
#[derive(Clone, Debug, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
    counter: usize,
}

impl NameAllocator {
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameAllocator {
            taken: reserved.into_iter().map(Into::into).collect(),
            counter: 0,
        }
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        loop {
            let candidate = format!("{prefix}{}", self.counter);
            self.counter += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_skips_reserved_names() {
        let mut names = NameAllocator::new(["d_0", "d_2"]);
        assert_eq!(names.fresh("d_"), "d_1");
        assert_eq!(names.fresh("d_"), "d_3");
        assert_eq!(names.fresh("e_"), "e_4");
    }
}
