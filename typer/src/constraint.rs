// constraint.rs — The fact language of dimension-flow types
//
// Five fact variants over an abstract variable type `V`. Inside a block type
// `V` is a schema-local `DimSetVar`; inside a composite schema's working set
// it is a `Vertex`. `Fact::map` re-expresses a fact over another variable
// space and is the only way a block type gets anchored to concrete ports.
//
// Preconditions: none.
// Postconditions: `map` preserves variant, filters and the role of each field.
// Failure modes: `map` reports the first variable missing from the table.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use crate::id::Vertex;

// ── Dimensions and variables ────────────────────────────────────────────────

/// An abstract tensor dimension, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dim(Arc<str>);

impl Dim {
    pub fn new(name: &str) -> Self {
        Dim(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Dim {
    fn from(name: &str) -> Self {
        Dim::new(name)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A set of dimensions (filters, dependency exclusions).
pub type DimSet = BTreeSet<Dim>;

/// Stand-in for "the dimension set at some port" inside a block type.
///
/// Primitive types use `Named` variables; an inferred composite type uses
/// its own interface vertices as variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DimSetVar {
    Named(String),
    Port(Vertex),
}

impl DimSetVar {
    pub fn named(name: &str) -> Self {
        DimSetVar::Named(name.to_string())
    }
}

impl fmt::Display for DimSetVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimSetVar::Named(name) => f.write_str(name),
            DimSetVar::Port(v) => write!(f, "{}", v),
        }
    }
}

// ── Facts ───────────────────────────────────────────────────────────────────

/// One contributor to an induced dimension set: `var` minus `filtered`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inducer<V> {
    pub var: V,
    pub filtered: DimSet,
}

impl<V> Inducer<V> {
    pub fn new(var: V, filtered: impl IntoIterator<Item = Dim>) -> Self {
        Inducer {
            var,
            filtered: filtered.into_iter().collect(),
        }
    }

    pub fn unfiltered(var: V) -> Self {
        Inducer {
            var,
            filtered: DimSet::new(),
        }
    }

    pub fn filters(&self, dim: &Dim) -> bool {
        self.filtered.contains(dim)
    }
}

/// A constraint over dimension-set variables.
///
/// Set-valued fields are `BTreeSet`s so structural equality treats them as
/// unordered and duplicate-free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fact<V> {
    /// `lhs` and `rhs` denote the same dimension set. Stored directionally.
    Equal { lhs: V, rhs: V },
    /// `dim` belongs to the union of the sets of `vars`.
    InUnion { dim: Dim, vars: BTreeSet<V> },
    /// `dim` is excluded from `var`.
    NotIn { dim: Dim, var: V },
    /// `induced` is the union over `inducers` of `var ∖ filtered`.
    InducedBy {
        induced: V,
        inducers: BTreeSet<Inducer<V>>,
    },
    /// Variation along `dim` broadcasts over `var`, except `filtered`.
    DependsOn { dim: Dim, var: V, filtered: DimSet },
}

/// Which half of a block type a fact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    /// `Equal`, `InUnion`, `NotIn`.
    Direct,
    /// `InducedBy`, `DependsOn`.
    Indirect,
}

pub type FactSet<V> = BTreeSet<Fact<V>>;

/// A variable that a substitution table has no entry for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmapped<V>(pub V);

impl<V: Clone + Ord> Fact<V> {
    pub fn equal(lhs: V, rhs: V) -> Self {
        Fact::Equal { lhs, rhs }
    }

    pub fn in_union(dim: Dim, vars: impl IntoIterator<Item = V>) -> Self {
        Fact::InUnion {
            dim,
            vars: vars.into_iter().collect(),
        }
    }

    pub fn not_in(dim: Dim, var: V) -> Self {
        Fact::NotIn { dim, var }
    }

    pub fn induced_by(induced: V, inducers: impl IntoIterator<Item = Inducer<V>>) -> Self {
        Fact::InducedBy {
            induced,
            inducers: inducers.into_iter().collect(),
        }
    }

    pub fn depends_on(dim: Dim, var: V, filtered: impl IntoIterator<Item = Dim>) -> Self {
        Fact::DependsOn {
            dim,
            var,
            filtered: filtered.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> FactKind {
        match self {
            Fact::Equal { .. } | Fact::InUnion { .. } | Fact::NotIn { .. } => FactKind::Direct,
            Fact::InducedBy { .. } | Fact::DependsOn { .. } => FactKind::Indirect,
        }
    }

    /// Every variable occurrence, in field order (duplicates possible).
    pub fn vars(&self) -> Vec<&V> {
        match self {
            Fact::Equal { lhs, rhs } => vec![lhs, rhs],
            Fact::InUnion { vars, .. } => vars.iter().collect(),
            Fact::NotIn { var, .. } | Fact::DependsOn { var, .. } => vec![var],
            Fact::InducedBy { induced, inducers } => std::iter::once(induced)
                .chain(inducers.iter().map(|i| &i.var))
                .collect(),
        }
    }

    pub fn mentions(&self, var: &V) -> bool {
        self.vars().into_iter().any(|v| v == var)
    }

    /// Substitute every variable through `table`.
    pub fn map<W: Clone + Ord>(&self, table: &BTreeMap<V, W>) -> Result<Fact<W>, Unmapped<V>> {
        self.try_map_vars(|v| table.get(v).cloned().ok_or_else(|| Unmapped(v.clone())))
    }

    /// Replace every occurrence of `from` by `to`, leaving other variables.
    pub fn substitute(&self, from: &V, to: &V) -> Fact<V> {
        self.map_vars(|v| if v == from { to.clone() } else { v.clone() })
    }

    /// Total variant of `map`: every variable goes through `f`.
    pub fn map_vars<W: Clone + Ord>(&self, mut f: impl FnMut(&V) -> W) -> Fact<W> {
        let result: Result<Fact<W>, Infallible> = self.try_map_vars(|v| Ok(f(v)));
        match result {
            Ok(fact) => fact,
            Err(never) => match never {},
        }
    }

    fn try_map_vars<W, E>(&self, mut f: impl FnMut(&V) -> Result<W, E>) -> Result<Fact<W>, E>
    where
        W: Clone + Ord,
    {
        Ok(match self {
            Fact::Equal { lhs, rhs } => Fact::Equal {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
            },
            Fact::InUnion { dim, vars } => Fact::InUnion {
                dim: dim.clone(),
                vars: vars.iter().map(&mut f).collect::<Result<_, _>>()?,
            },
            Fact::NotIn { dim, var } => Fact::NotIn {
                dim: dim.clone(),
                var: f(var)?,
            },
            Fact::InducedBy { induced, inducers } => Fact::InducedBy {
                induced: f(induced)?,
                inducers: inducers
                    .iter()
                    .map(|i| {
                        Ok(Inducer {
                            var: f(&i.var)?,
                            filtered: i.filtered.clone(),
                        })
                    })
                    .collect::<Result<_, E>>()?,
            },
            Fact::DependsOn { dim, var, filtered } => Fact::DependsOn {
                dim: dim.clone(),
                var: f(var)?,
                filtered: filtered.clone(),
            },
        })
    }

    /// One short line, naming variables through `name`.
    pub fn render(&self, name: impl Fn(&V) -> String) -> String {
        match self {
            Fact::Equal { lhs, rhs } => format!("{} == {}", name(lhs), name(rhs)),
            Fact::InUnion { dim, vars } => {
                let vars: Vec<String> = vars.iter().map(&name).collect();
                format!("{} in {{{}}}", dim, vars.join(", "))
            }
            Fact::NotIn { dim, var } => format!("{} notin {}", dim, name(var)),
            Fact::InducedBy { induced, inducers } => {
                let parts: Vec<String> = inducers
                    .iter()
                    .map(|i| with_filter(name(&i.var), &i.filtered))
                    .collect();
                format!("{} <== [{}]", name(induced), parts.join(", "))
            }
            Fact::DependsOn { dim, var, filtered } => {
                format!("{} -> {}", dim, with_filter(name(var), filtered))
            }
        }
    }
}

fn with_filter(var: String, filtered: &DimSet) -> String {
    if filtered.is_empty() {
        var
    } else {
        let dims: Vec<&str> = filtered.iter().map(Dim::name).collect();
        format!("{} \\ {{{}}}", var, dims.join(", "))
    }
}

impl<V: Clone + Ord + fmt::Display> fmt::Display for Fact<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|v| v.to_string()))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(name: &str) -> Dim {
        Dim::new(name)
    }

    fn n(name: &str) -> DimSetVar {
        DimSetVar::named(name)
    }

    #[test]
    fn kinds_partition_variants() {
        assert_eq!(Fact::equal(1, 2).kind(), FactKind::Direct);
        assert_eq!(Fact::in_union(d("a"), [1]).kind(), FactKind::Direct);
        assert_eq!(Fact::not_in(d("a"), 1).kind(), FactKind::Direct);
        assert_eq!(
            Fact::induced_by(1, [Inducer::unfiltered(2)]).kind(),
            FactKind::Indirect
        );
        assert_eq!(Fact::depends_on(d("a"), 1, []).kind(), FactKind::Indirect);
    }

    #[test]
    fn map_replaces_every_occurrence() {
        let fact = Fact::induced_by(
            n("d_out"),
            [Inducer::new(n("d_in"), [d("fresh0")])],
        );
        let table: BTreeMap<DimSetVar, Vertex> =
            [(n("d_in"), Vertex(4)), (n("d_out"), Vertex(5))]
                .into_iter()
                .collect();
        assert_eq!(
            fact.map(&table),
            Ok(Fact::induced_by(
                Vertex(5),
                [Inducer::new(Vertex(4), [d("fresh0")])]
            ))
        );
    }

    #[test]
    fn map_reports_missing_variable() {
        let fact = Fact::in_union(d("a"), [n("x"), n("y")]);
        let table: BTreeMap<DimSetVar, Vertex> = [(n("x"), Vertex(0))].into_iter().collect();
        assert_eq!(fact.map(&table), Err(Unmapped(n("y"))));
    }

    #[test]
    fn map_can_merge_set_members() {
        let fact = Fact::in_union(d("a"), [1u32, 2]);
        let table: BTreeMap<u32, u32> = [(1, 9), (2, 9)].into_iter().collect();
        assert_eq!(fact.map(&table), Ok(Fact::in_union(d("a"), [9])));
    }

    #[test]
    fn inducers_are_unordered_but_filters_distinguish() {
        let a = Fact::induced_by(0, [Inducer::unfiltered(1), Inducer::new(2, [d("x")])]);
        let b = Fact::induced_by(0, [Inducer::new(2, [d("x")]), Inducer::unfiltered(1)]);
        assert_eq!(a, b);

        let two = Fact::induced_by(0, [Inducer::unfiltered(1), Inducer::new(1, [d("x")])]);
        match two {
            Fact::InducedBy { inducers, .. } => assert_eq!(inducers.len(), 2),
            _ => unreachable!(),
        }
    }

    #[test]
    fn substitute_touches_only_target() {
        let fact = Fact::induced_by(1, [Inducer::unfiltered(1), Inducer::unfiltered(2)]);
        assert_eq!(
            fact.substitute(&1, &3),
            Fact::induced_by(3, [Inducer::unfiltered(3), Inducer::unfiltered(2)])
        );
    }

    #[test]
    fn vars_lists_inducers_after_induced() {
        let fact = Fact::induced_by(7, [Inducer::unfiltered(3), Inducer::unfiltered(5)]);
        assert_eq!(fact.vars(), vec![&7, &3, &5]);
        assert!(fact.mentions(&5));
        assert!(!fact.mentions(&4));
    }

    #[test]
    fn render_one_line_per_variant() {
        let name = |v: &DimSetVar| v.to_string();
        assert_eq!(Fact::equal(n("x"), n("y")).render(name), "x == y");
        assert_eq!(
            Fact::in_union(d("f"), [n("x"), n("y")]).render(name),
            "f in {x, y}"
        );
        assert_eq!(Fact::not_in(d("f"), n("x")).render(name), "f notin x");
        assert_eq!(
            Fact::induced_by(n("y"), [Inducer::new(n("x"), [d("f"), d("g")])]).render(name),
            "y <== [x \\ {f, g}]"
        );
        assert_eq!(Fact::depends_on(d("f"), n("x"), []).render(name), "f -> x");
        assert_eq!(
            Fact::depends_on(d("f"), Vertex(3), [d("g")]).to_string(),
            "f -> v3 \\ {g}"
        );
    }
}
