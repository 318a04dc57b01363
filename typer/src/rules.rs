// rules.rs — Pairwise derivation rules
//
// `combine(f1, f2)` produces every fact derivable from the ordered pair. The
// table is positional: callers try both `(f1, f2)` and `(f2, f1)`.
//
// Preconditions: none.
// Postconditions: every produced fact mentions only variables of `f1`/`f2`
//   and dims already present in them (the universe never grows).
// Failure modes: none.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use crate::constraint::{Dim, DimSet, Fact, Inducer};

/// Append every fact derivable from `(f1, f2)` to `out`.
///
/// Facts may already be known; deduplication is the caller's job.
pub fn combine<V: Clone + Ord>(f1: &Fact<V>, f2: &Fact<V>, out: &mut Vec<Fact<V>>) {
    match (f1, f2) {
        // ── Equality rewrites ──
        (Fact::Equal { lhs: x, rhs: y }, Fact::InducedBy { induced, inducers }) => {
            if y == induced {
                out.push(Fact::InducedBy {
                    induced: x.clone(),
                    inducers: inducers.clone(),
                });
            }
            if inducers.iter().any(|i| &i.var == x) {
                out.push(Fact::InducedBy {
                    induced: induced.clone(),
                    inducers: inducers
                        .iter()
                        .map(|i| Inducer {
                            var: if &i.var == x { y.clone() } else { i.var.clone() },
                            filtered: i.filtered.clone(),
                        })
                        .collect(),
                });
            }
        }
        (Fact::Equal { lhs: x, rhs: y }, Fact::NotIn { dim, var }) if var == x => {
            out.push(Fact::not_in(dim.clone(), y.clone()));
        }
        (Fact::Equal { lhs: x, rhs: y }, Fact::InUnion { dim, vars }) if vars.contains(x) => {
            let mut vars = vars.clone();
            vars.remove(x);
            vars.insert(y.clone());
            out.push(Fact::InUnion {
                dim: dim.clone(),
                vars,
            });
        }
        (Fact::Equal { lhs: x, rhs: y }, Fact::DependsOn { dim, var, filtered }) if var == x => {
            out.push(Fact::DependsOn {
                dim: dim.clone(),
                var: y.clone(),
                filtered: filtered.clone(),
            });
        }
        (Fact::Equal { lhs: x, rhs: y }, Fact::Equal { lhs: y2, rhs: z }) if y == y2 && x != z => {
            out.push(Fact::equal(x.clone(), z.clone()));
        }

        // ── Induction ──
        (
            Fact::InducedBy {
                induced: z,
                inducers: l1,
            },
            Fact::InducedBy {
                induced: y,
                inducers: l2,
            },
        ) => {
            if y != z && l1.iter().any(|i| &i.var == y) {
                out.push(Fact::InducedBy {
                    induced: z.clone(),
                    inducers: transitive_merge(l1, y, l2),
                });
            }
            if y == z && l1 != l2 {
                out.push(Fact::InducedBy {
                    induced: z.clone(),
                    inducers: merge_inducers(l1.iter().chain(l2.iter()).cloned()),
                });
            }
        }
        (Fact::InducedBy { induced, inducers }, Fact::NotIn { dim, var }) => {
            if var == induced {
                for i in inducers.iter().filter(|i| !i.filters(dim)) {
                    out.push(Fact::not_in(dim.clone(), i.var.clone()));
                }
            }
            if !inducers.is_empty() && inducers.iter().all(|i| &i.var == var && !i.filters(dim)) {
                out.push(Fact::not_in(dim.clone(), induced.clone()));
            }
        }
        (Fact::InducedBy { induced, inducers }, Fact::InUnion { dim, vars }) => {
            let covered = |v: &V| inducers.iter().any(|i| &i.var == v && !i.filters(dim));
            if !vars.is_empty() && vars.iter().all(covered) {
                out.push(Fact::in_union(dim.clone(), [induced.clone()]));
            }
            if vars.contains(induced)
                && !inducers.is_empty()
                && inducers.iter().all(|i| !i.filters(dim))
            {
                let widened = vars
                    .iter()
                    .filter(|v| *v != induced)
                    .chain(inducers.iter().map(|i| &i.var))
                    .cloned();
                out.push(Fact::in_union(dim.clone(), widened));
            }
        }
        (
            Fact::InducedBy { induced, inducers },
            Fact::DependsOn {
                dim,
                var,
                filtered,
            },
        ) if var == induced => {
            for i in inducers {
                out.push(Fact::DependsOn {
                    dim: dim.clone(),
                    var: i.var.clone(),
                    filtered: i.filtered.union(filtered).cloned().collect(),
                });
            }
        }

        // ── Dependency pruning ──
        (
            Fact::DependsOn {
                dim,
                var,
                filtered,
            },
            Fact::NotIn { dim: excluded, var: var2 },
        ) if var == var2 && filtered.contains(excluded) => {
            let mut filtered = filtered.clone();
            filtered.remove(excluded);
            out.push(Fact::DependsOn {
                dim: dim.clone(),
                var: var.clone(),
                filtered,
            });
        }

        _ => {}
    }
}

/// Union of inducer lists, one inducer per variable whose filter is the
/// intersection of every filter that variable had.
pub fn merge_inducers<V: Clone + Ord>(inducers: impl IntoIterator<Item = Inducer<V>>) -> BTreeSet<Inducer<V>> {
    let mut by_var: BTreeMap<V, DimSet> = BTreeMap::new();
    for inducer in inducers {
        match by_var.get_mut(&inducer.var) {
            Some(filtered) => filtered.retain(|d| inducer.filtered.contains(d)),
            None => {
                by_var.insert(inducer.var, inducer.filtered);
            }
        }
    }
    by_var
        .into_iter()
        .map(|(var, filtered)| Inducer { var, filtered })
        .collect()
}

/// Replace `via` in `outer` by `via`'s own inducers.
///
/// Each `via ∖ B` in `outer` contributes `X ∖ (A ∪ B)` for every `X ∖ A` in
/// `inner`. A contributed variable that already has inducers collapses with
/// them into one inducer carrying the intersection of all their filters;
/// untouched inducers of `outer` are kept as they are.
pub fn transitive_merge<V: Clone + Ord>(
    outer: &BTreeSet<Inducer<V>>,
    via: &V,
    inner: &BTreeSet<Inducer<V>>,
) -> BTreeSet<Inducer<V>> {
    let (through, kept): (Vec<&Inducer<V>>, Vec<&Inducer<V>>) = outer.iter().partition(|i| &i.var == via);

    let mut contributed: BTreeMap<V, DimSet> = BTreeMap::new();
    for b in &through {
        for a in inner {
            let filtered: DimSet = a.filtered.union(&b.filtered).cloned().collect();
            match contributed.get_mut(&a.var) {
                Some(existing) => existing.retain(|d| filtered.contains(d)),
                None => {
                    contributed.insert(a.var.clone(), filtered);
                }
            }
        }
    }

    let mut merged = BTreeSet::new();
    for inducer in kept {
        match contributed.get_mut(&inducer.var) {
            Some(existing) => existing.retain(|d| inducer.filtered.contains(d)),
            None => {
                merged.insert(inducer.clone());
            }
        }
    }
    merged.extend(
        contributed
            .into_iter()
            .map(|(var, filtered)| Inducer { var, filtered }),
    );
    merged
}

/// First `(dim, var)` with both `NotIn(dim, var)` and `InUnion(dim, {var})`.
pub fn contradiction<'a, V: Clone + Ord>(facts: impl IntoIterator<Item = &'a Fact<V>> + Clone) -> Option<(Dim, V)>
where
    V: 'a,
{
    let excluded: BTreeSet<(&Dim, &V)> = facts
        .clone()
        .into_iter()
        .filter_map(|f| match f {
            Fact::NotIn { dim, var } => Some((dim, var)),
            _ => None,
        })
        .collect();
    facts.into_iter().find_map(|f| match f {
        Fact::InUnion { dim, vars } if vars.len() == 1 => vars
            .iter()
            .next()
            .filter(|v| excluded.contains(&(dim, *v)))
            .map(|v| (dim.clone(), v.clone())),
        _ => None,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────
