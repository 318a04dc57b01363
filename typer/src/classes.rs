// classes.rs — Equality classes of wired variables
//
// Wiring produces `Equal` facts in both directions for every edge. Rather
// than saturating every alias pairwise, the driver folds them into
// union-find classes, rewrites the remaining facts onto one representative
// per class (the smallest member), saturates that smaller set, and finally
// re-expresses each derived fact over the interface members of its classes,
// choosing a member separately for every occurrence of a variable. Classes
// holding two or more interface members are saturated pairwise instead.
//
// Preconditions: none.
// Postconditions: `canonical` never returns an `Equal` fact; `expand` only
//   returns facts over the members passed to `interface_members`.
// Failure modes: none.
// Side effects: none.

use std::collections::BTreeMap;

use crate::constraint::Fact;

#[derive(Debug, Clone, Default)]
pub struct EqualityClasses<V> {
    parent: BTreeMap<V, V>,
}

impl<V: Clone + Ord> EqualityClasses<V> {
    pub fn new() -> Self {
        EqualityClasses {
            parent: BTreeMap::new(),
        }
    }

    /// Classes induced by every `Equal` fact in `facts`.
    pub fn from_facts<'a>(facts: impl IntoIterator<Item = &'a Fact<V>>) -> Self
    where
        V: 'a,
    {
        let mut classes = Self::new();
        for fact in facts {
            if let Fact::Equal { lhs, rhs } = fact {
                classes.union(lhs, rhs);
            }
        }
        classes
    }

    pub fn representative(&self, v: &V) -> V {
        let mut current = v;
        while let Some(parent) = self.parent.get(current) {
            if parent == current {
                break;
            }
            current = parent;
        }
        current.clone()
    }

    /// Merge the classes of `a` and `b`; the smaller root wins.
    pub fn union(&mut self, a: &V, b: &V) {
        let ra = self.representative(a);
        let rb = self.representative(b);
        for v in [&ra, &rb] {
            self.parent.entry(v.clone()).or_insert_with(|| v.clone());
        }
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent.insert(child, root);
        }
    }

    /// `fact` rewritten onto representatives, or `None` for `Equal`.
    pub fn canonical(&self, fact: &Fact<V>) -> Option<Fact<V>> {
        match fact {
            Fact::Equal { .. } => None,
            _ => Some(fact.map_vars(|v| self.representative(v))),
        }
    }

    /// Representative → the members of `interface` in its class.
    pub fn interface_members(&self, interface: impl IntoIterator<Item = V>) -> BTreeMap<V, Vec<V>> {
        let mut members: BTreeMap<V, Vec<V>> = BTreeMap::new();
        for v in interface {
            let members_of = members.entry(self.representative(&v)).or_default();
            if !members_of.contains(&v) {
                members_of.push(v);
            }
        }
        members
    }
}

/// Every re-expression of a canonical `fact` that picks an interface member
/// for each variable occurrence independently. Empty when some occurrence's
/// class has no interface member.
pub fn expand<V: Clone + Ord>(fact: &Fact<V>, members: &BTreeMap<V, Vec<V>>) -> Vec<Fact<V>> {
    let mut choices: Vec<&[V]> = Vec::new();
    for rep in fact.vars() {
        match members.get(rep) {
            Some(m) if !m.is_empty() => choices.push(m),
            _ => return Vec::new(),
        }
    }

    // `map_vars` visits occurrences in the same order as `vars`.
    let mut out = Vec::new();
    let mut pick = vec![0usize; choices.len()];
    loop {
        let mut k = 0;
        out.push(fact.map_vars(|_| {
            let chosen = choices[k][pick[k]].clone();
            k += 1;
            chosen
        }));

        // Odometer step over the choice vectors.
        let mut k = 0;
        loop {
            if k == pick.len() {
                return out;
            }
            pick[k] += 1;
            if pick[k] < choices[k].len() {
                break;
            }
            pick[k] = 0;
            k += 1;
        }
    }
}
