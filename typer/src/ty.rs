// ty.rs — Block types and the typing cache
//
// A `BlockTy` is a schema's type: ordered input/output variables plus the
// facts over them, split into direct (`Equal`, `InUnion`, `NotIn`) and
// indirect (`InducedBy`, `DependsOn`) sets. The variable order is the
// positional correspondence to the schema's ports used during substitution.
//
// Preconditions: none.
// Postconditions: every constructed `BlockTy` is closed over its own
//   variables and each fact sits in the set matching its kind.
// Failure modes: `MalformedBlockType`, `ArityMismatch`, `SchemaAlreadyTyped`.
// Side effects: none.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::constraint::{DimSetVar, Fact, FactKind, FactSet};
use crate::diag::InferError;
use crate::id::SchemaId;
use crate::schema::Program;

// ── Block type ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTy {
    in_vars: Vec<DimSetVar>,
    out_vars: Vec<DimSetVar>,
    direct: FactSet<DimSetVar>,
    indirect: FactSet<DimSetVar>,
}

impl BlockTy {
    /// Build a type from explicit direct/indirect sets, checking both
    /// invariants.
    pub fn new(
        in_vars: Vec<DimSetVar>,
        out_vars: Vec<DimSetVar>,
        direct: impl IntoIterator<Item = Fact<DimSetVar>>,
        indirect: impl IntoIterator<Item = Fact<DimSetVar>>,
    ) -> Result<Self, InferError> {
        let ty = BlockTy {
            in_vars,
            out_vars,
            direct: direct.into_iter().collect(),
            indirect: indirect.into_iter().collect(),
        };
        ty.validate()?;
        Ok(ty)
    }

    /// Build a type from one fact set, partitioning by kind.
    pub fn from_facts(
        in_vars: Vec<DimSetVar>,
        out_vars: Vec<DimSetVar>,
        facts: impl IntoIterator<Item = Fact<DimSetVar>>,
    ) -> Result<Self, InferError> {
        let (direct, indirect): (Vec<_>, Vec<_>) = facts
            .into_iter()
            .partition(|f| f.kind() == FactKind::Direct);
        Self::new(in_vars, out_vars, direct, indirect)
    }

    /// Construction for builders whose facts are closed by construction.
    pub(crate) fn assemble(
        in_vars: Vec<DimSetVar>,
        out_vars: Vec<DimSetVar>,
        direct: Vec<Fact<DimSetVar>>,
        indirect: Vec<Fact<DimSetVar>>,
    ) -> Self {
        let ty = BlockTy {
            in_vars,
            out_vars,
            direct: direct.into_iter().collect(),
            indirect: indirect.into_iter().collect(),
        };
        debug_assert!(ty.validate().is_ok(), "malformed built-in type");
        ty
    }

    fn validate(&self) -> Result<(), InferError> {
        let known: BTreeSet<&DimSetVar> = self.in_vars.iter().chain(&self.out_vars).collect();
        if known.len() != self.in_vars.len() + self.out_vars.len() {
            return Err(InferError::MalformedBlockType {
                reason: "a variable appears twice in the interface".to_string(),
            });
        }
        for (facts, kind) in [
            (&self.direct, FactKind::Direct),
            (&self.indirect, FactKind::Indirect),
        ] {
            for fact in facts {
                if fact.kind() != kind {
                    return Err(InferError::MalformedBlockType {
                        reason: format!("'{}' is in the wrong category", fact),
                    });
                }
                if let Some(var) = fact.vars().into_iter().find(|v| !known.contains(v)) {
                    return Err(InferError::MalformedBlockType {
                        reason: format!("'{}' mentions non-interface variable {}", fact, var),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn in_vars(&self) -> &[DimSetVar] {
        &self.in_vars
    }

    pub fn out_vars(&self) -> &[DimSetVar] {
        &self.out_vars
    }

    pub fn direct(&self) -> &FactSet<DimSetVar> {
        &self.direct
    }

    pub fn indirect(&self) -> &FactSet<DimSetVar> {
        &self.indirect
    }

    /// Direct facts followed by indirect facts.
    pub fn facts(&self) -> impl Iterator<Item = &Fact<DimSetVar>> {
        self.direct.iter().chain(self.indirect.iter())
    }

    pub fn contains(&self, fact: &Fact<DimSetVar>) -> bool {
        self.direct.contains(fact) || self.indirect.contains(fact)
    }

    /// Display adapter naming variables through the program's vertex table.
    pub fn display<'a>(&'a self, program: &'a Program) -> TyDisplay<'a> {
        TyDisplay { ty: self, program }
    }
}

/// Multi-line rendering of a block type:
///
/// ```text
/// (X0) -> (Y0)
///   direct:
///     fresh0 in {Y0}
///   indirect:
///     Y0 <== [X0 \ {fresh0}]
/// ```
///
/// Fact lines are sorted so the output does not depend on allocation order.
pub struct TyDisplay<'a> {
    ty: &'a BlockTy,
    program: &'a Program,
}

impl fmt::Display for TyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |vars: &[DimSetVar]| -> String {
            vars.iter()
                .map(|v| self.program.var_name(v))
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(f, "({}) -> ({})", names(&self.ty.in_vars), names(&self.ty.out_vars))?;
        for (title, facts) in [("direct", &self.ty.direct), ("indirect", &self.ty.indirect)] {
            if facts.is_empty() {
                continue;
            }
            writeln!(f, "  {}:", title)?;
            let mut lines: Vec<String> = facts.iter().map(|x| self.program.fact_line(x)).collect();
            lines.sort();
            for line in lines {
                writeln!(f, "    {}", line)?;
            }
        }
        Ok(())
    }
}

// ── Typing cache ────────────────────────────────────────────────────────────

/// Memoized schema types for one inference run. Write-once per schema.
#[derive(Debug, Clone, Default)]
pub struct Typing {
    types: HashMap<SchemaId, Arc<BlockTy>>,
}

impl Typing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the type of a (usually primitive) schema before inference.
    ///
    /// The type's variable lists must match the schema's port counts.
    pub fn seed(&mut self, program: &Program, schema: SchemaId, ty: BlockTy) -> Result<Arc<BlockTy>, InferError> {
        let sc = program
            .get_schema(schema)
            .ok_or(InferError::UnknownSchema { id: schema.0 })?;
        let expected = (sc.in_vertices.len(), sc.out_vertices.len());
        let found = (ty.in_vars.len(), ty.out_vars.len());
        if expected != found {
            return Err(InferError::ArityMismatch {
                schema: sc.name.clone(),
                expected,
                found,
            });
        }
        self.insert(program, schema, ty)
    }

    pub(crate) fn insert(&mut self, program: &Program, schema: SchemaId, ty: BlockTy) -> Result<Arc<BlockTy>, InferError> {
        if self.types.contains_key(&schema) {
            return Err(InferError::SchemaAlreadyTyped {
                schema: program.schema(schema).name.clone(),
            });
        }
        let ty = Arc::new(ty);
        self.types.insert(schema, Arc::clone(&ty));
        Ok(ty)
    }

    pub fn get(&self, schema: SchemaId) -> Option<&Arc<BlockTy>> {
        self.types.get(&schema)
    }

    pub fn contains(&self, schema: SchemaId) -> bool {
        self.types.contains_key(&schema)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
