// fixpoint.rs — Saturation of a fact set under the rule table
//
// Semi-naive forward chaining: each pass combines every fact added by the
// previous pass with every known fact, in both orders. A pass that adds
// nothing ends the loop. The first pass treats the whole input as new.
//
// Preconditions: none.
// Postconditions: on success the returned set is closed under `combine` and
//   contains the input.
// Failure modes: `NonConvergent` once `max_passes` passes still add facts.
// Side effects: none.

use std::collections::BTreeSet;

use crate::constraint::{Fact, FactSet};
use crate::rules::combine;

/// Default pass cap.
pub const DEFAULT_MAX_PASSES: usize = 1024;

/// Order in which the facts of a pass are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaturateOptions {
    pub max_passes: usize,
    pub order: VisitOrder,
}

impl Default for SaturateOptions {
    fn default() -> Self {
        SaturateOptions {
            max_passes: DEFAULT_MAX_PASSES,
            order: VisitOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saturation<V> {
    pub facts: FactSet<V>,
    /// Passes run, including the last one that added nothing.
    pub passes: usize,
}

/// The pass cap was hit while facts were still being added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonConvergent {
    pub passes: usize,
    pub facts: usize,
}

fn ordered<'a, V>(facts: impl DoubleEndedIterator<Item = &'a Fact<V>>, order: VisitOrder) -> Vec<&'a Fact<V>>
where
    V: 'a,
{
    match order {
        VisitOrder::Ascending => facts.collect(),
        VisitOrder::Descending => facts.rev().collect(),
    }
}

/// Saturate `initial` under the rule table.
pub fn saturate<V: Clone + Ord>(
    initial: impl IntoIterator<Item = Fact<V>>,
    opts: &SaturateOptions,
) -> Result<Saturation<V>, NonConvergent> {
    let mut facts: FactSet<V> = initial.into_iter().collect();
    let mut delta: FactSet<V> = facts.clone();
    let mut passes = 0;

    while !delta.is_empty() {
        if passes >= opts.max_passes {
            return Err(NonConvergent {
                passes,
                facts: facts.len(),
            });
        }
        passes += 1;

        let mut produced = Vec::new();
        for new in ordered(delta.iter(), opts.order) {
            for known in ordered(facts.iter(), opts.order) {
                combine(new, known, &mut produced);
                combine(known, new, &mut produced);
            }
        }

        let fresh: BTreeSet<Fact<V>> = produced
            .into_iter()
            .filter(|f| !facts.contains(f))
            .collect();
        facts.extend(fresh.iter().cloned());
        delta = fresh;
    }

    Ok(Saturation { facts, passes })
}
