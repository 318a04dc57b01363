// project.rs — Relevance projection onto a schema interface
//
// A schema's type may only speak about its own ports. Projection keeps the
// facts whose every variable is an interface variable and drops equalities,
// which are wiring artifacts.

use std::collections::BTreeSet;

use crate::constraint::{Fact, FactSet};

pub fn is_relevant<V: Clone + Ord>(fact: &Fact<V>, interface: &BTreeSet<V>) -> bool {
    !matches!(fact, Fact::Equal { .. }) && fact.vars().into_iter().all(|v| interface.contains(v))
}

pub fn project<V: Clone + Ord>(facts: impl IntoIterator<Item = Fact<V>>, interface: &BTreeSet<V>) -> FactSet<V> {
    facts
        .into_iter()
        .filter(|f| is_relevant(f, interface))
        .collect()
}
