// infer.rs — Composition driver
//
// Derives a schema's type from the types of its immediate children plus its
// wiring, recursing into children and memoizing every result in a `Typing`.
//
// Per composite schema:
//   1. infer each child block's schema (cached after the first visit)
//   2. substitute the child type onto the block's parent-scoped ports
//   3. fold wiring equalities into classes and canonicalize the facts, or
//      keep them when two interface ports share a class
//   4. saturate, check for contradictions
//   5. re-express onto interface ports, project, assemble and cache
//
// Preconditions: primitive schemas reachable from the root are seeded.
// Postconditions: on success `typing` holds a type for the root and every
//   composite below it; the returned `Arc` is the cached one.
// Failure modes: every `InferError` variant except `ArityMismatch` and
//   `MalformedBlockType` of foreign seeds (checked at `Typing::seed`).
// Side effects: one `eprintln!` line per inferred schema under `verbose`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::classes::{expand, EqualityClasses};
use crate::constraint::{DimSetVar, Fact, Unmapped};
use crate::diag::InferError;
use crate::fixpoint::{saturate, SaturateOptions, Saturation, VisitOrder, DEFAULT_MAX_PASSES};
use crate::id::{SchemaId, Vertex};
use crate::project::project;
use crate::rules::contradiction;
use crate::schema::{Block, BlockSchema, Program};
use crate::ty::{BlockTy, Typing};

// ── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferOptions {
    /// Saturation pass cap per schema.
    pub max_passes: usize,
    pub visit_order: VisitOrder,
    /// Fail with `InconsistentConstraints` when a dim is both required in
    /// and excluded from the same variable.
    pub check_consistency: bool,
    pub verbose: bool,
}

impl Default for InferOptions {
    fn default() -> Self {
        InferOptions {
            max_passes: DEFAULT_MAX_PASSES,
            visit_order: VisitOrder::Ascending,
            check_consistency: true,
            verbose: false,
        }
    }
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Type of `schema`, inferring and caching it (and its children) if needed.
pub fn infer(program: &Program, schema: SchemaId, typing: &mut Typing) -> Result<Arc<BlockTy>, InferError> {
    infer_with_options(program, schema, typing, &InferOptions::default())
}

pub fn infer_with_options(
    program: &Program,
    schema: SchemaId,
    typing: &mut Typing,
    opts: &InferOptions,
) -> Result<Arc<BlockTy>, InferError> {
    let mut driver = Driver {
        program,
        typing,
        opts,
        active: Vec::new(),
    };
    driver.infer(schema)
}

// ── Driver ──────────────────────────────────────────────────────────────────

struct Driver<'a> {
    program: &'a Program,
    typing: &'a mut Typing,
    opts: &'a InferOptions,
    /// Schemas whose inference is in progress, outermost first.
    active: Vec<SchemaId>,
}

impl<'a> Driver<'a> {
    fn infer(&mut self, id: SchemaId) -> Result<Arc<BlockTy>, InferError> {
        if let Some(ty) = self.typing.get(id) {
            return Ok(Arc::clone(ty));
        }
        let program = self.program;
        let schema = program
            .get_schema(id)
            .ok_or(InferError::UnknownSchema { id: id.0 })?;

        if let Some(pos) = self.active.iter().position(|s| *s == id) {
            let cycle = self.active[pos..]
                .iter()
                .map(|s| program.schema(*s).name.clone())
                .chain(std::iter::once(schema.name.clone()))
                .collect();
            return Err(InferError::CyclicSchemaDependency { cycle });
        }
        if schema.is_primitive() {
            return Err(InferError::UnseededPrimitiveSchema {
                schema: schema.name.clone(),
            });
        }

        self.active.push(id);
        let result = self.infer_composite(schema);
        self.active.pop();
        result
    }

    fn infer_composite(&mut self, schema: &'a BlockSchema) -> Result<Arc<BlockTy>, InferError> {
        let start = Instant::now();
        let program = self.program;

        let mut working: Vec<Fact<Vertex>> = Vec::new();
        for block in &schema.children {
            let child_ty = self.infer(block.schema)?;
            let child = program.schema(block.schema);
            working.extend(embed(program, schema, child, block, &child_ty)?);
        }
        for (source, destination) in schema.edge_pairs() {
            working.push(Fact::equal(source, destination));
            working.push(Fact::equal(destination, source));
        }

        let interface = schema.interface_set();
        let classes = EqualityClasses::from_facts(&working);
        let members = classes.interface_members(schema.interface());

        // Ports wired to each other cannot share one representative without
        // losing their cross combinations: keep the equalities and saturate
        // the working set as it is.
        let aliased = members.values().any(|m| m.len() > 1);
        let (saturation, relevant) = if aliased {
            let saturation = self.saturate_checked(schema, working)?;
            let relevant = project(saturation.facts.iter().cloned(), &interface);
            (saturation, relevant)
        } else {
            let canonical = working.iter().filter_map(|f| classes.canonical(f)).collect();
            let saturation = self.saturate_checked(schema, canonical)?;
            let relevant = project(
                saturation.facts.iter().flat_map(|f| expand(f, &members)),
                &interface,
            );
            (saturation, relevant)
        };

        let port = |v: &Vertex| DimSetVar::Port(*v);
        let ty = BlockTy::from_facts(
            schema.in_vertices.iter().map(port).collect(),
            schema.out_vertices.iter().map(port).collect(),
            relevant.iter().map(|f| f.map_vars(port)),
        )?;

        if self.opts.verbose {
            eprintln!(
                "dimflow: inferred '{}' ({}): {} facts, {} passes, {} relevant, {:.1}ms",
                schema.name,
                if aliased { "pairwise" } else { "classes" },
                saturation.facts.len(),
                saturation.passes,
                relevant.len(),
                start.elapsed().as_secs_f64() * 1000.0
            );
        }

        self.typing.insert(program, schema.id, ty)
    }

    /// Saturate `facts` and, unless disabled, reject contradictions.
    fn saturate_checked(&self, schema: &BlockSchema, facts: Vec<Fact<Vertex>>) -> Result<Saturation<Vertex>, InferError> {
        let saturation = saturate(
            facts,
            &SaturateOptions {
                max_passes: self.opts.max_passes,
                order: self.opts.visit_order,
            },
        )
        .map_err(|e| InferError::NonConvergentFixpoint {
            schema: schema.name.clone(),
            passes: e.passes,
            facts: e.facts,
        })?;

        if self.opts.check_consistency {
            if let Some((dim, var)) = contradiction(&saturation.facts) {
                return Err(InferError::InconsistentConstraints {
                    schema: schema.name.clone(),
                    dim: dim.name().to_string(),
                    var: self.program.vertex_name(var),
                });
            }
        }
        Ok(saturation)
    }
}

/// Child type facts re-expressed over the parent-scoped ports of `block`.
///
/// Child variable *i* maps to `port_mapping[child.in_vertices[i]]`, and
/// likewise for outputs.
fn embed(
    program: &Program,
    parent: &BlockSchema,
    child: &BlockSchema,
    block: &Block,
    ty: &BlockTy,
) -> Result<Vec<Fact<Vertex>>, InferError> {
    let positional = ty
        .in_vars()
        .iter()
        .zip(&child.in_vertices)
        .chain(ty.out_vars().iter().zip(&child.out_vertices));
    let mut table: BTreeMap<DimSetVar, Vertex> = BTreeMap::new();
    for (var, port) in positional {
        if let Some(v) = block.port_mapping.get(port) {
            table.insert(var.clone(), *v);
        }
    }

    ty.facts()
        .map(|fact| {
            fact.map(&table).map_err(|Unmapped(var)| InferError::UnmappedVariable {
                schema: parent.name.clone(),
                child: child.name.clone(),
                var: program.var_name(&var),
                fact: program.fact_line(fact),
            })
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────
