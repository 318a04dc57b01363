// primitive.rs — Built-in block types
//
// Types for the primitive operations a front-end seeds before inference.
// Variables are named: `d_in` / `d_out` for unary blocks, `d_in_<i>` for the
// inputs of a union.
//
// Preconditions: none.
// Postconditions: every returned `BlockTy` has the arity `Primitive::arity`
//   reports and mentions only its own variables.
// Failure modes: none.
// Side effects: none.

use crate::constraint::{Dim, DimSetVar, Fact, Inducer};
use crate::ty::BlockTy;

/// Parameters identifying a primitive block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    /// Output gains a dimension the input does not have.
    AddDim(Dim),
    /// Output loses a dimension the input has.
    RemoveDim(Dim),
    /// Output carries the union of `n` inputs' dimensions.
    Union(usize),
    /// Output carries exactly the input's dimensions.
    Identity,
}

impl Primitive {
    /// `(inputs, outputs)` port counts.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Primitive::Union(n) => (*n, 1),
            Primitive::AddDim(_) | Primitive::RemoveDim(_) | Primitive::Identity => (1, 1),
        }
    }

    pub fn ty(&self) -> BlockTy {
        match self {
            Primitive::AddDim(dim) => fresh_dim_type(dim.clone()),
            Primitive::RemoveDim(dim) => remove_dim_type(dim.clone()),
            Primitive::Union(n) => union_type(*n),
            Primitive::Identity => identity_type(),
        }
    }
}

fn d_in() -> DimSetVar {
    DimSetVar::named("d_in")
}

fn d_out() -> DimSetVar {
    DimSetVar::named("d_out")
}

/// Introduce `dim`: present at the output, absent at the input, varying
/// with the input, and the output otherwise carries the input's dims.
pub fn fresh_dim_type(dim: Dim) -> BlockTy {
    BlockTy::assemble(
        vec![d_in()],
        vec![d_out()],
        vec![
            Fact::in_union(dim.clone(), [d_out()]),
            Fact::not_in(dim.clone(), d_in()),
        ],
        vec![
            Fact::depends_on(dim.clone(), d_in(), []),
            Fact::induced_by(d_out(), [Inducer::new(d_in(), [dim])]),
        ],
    )
}

/// Remove `dim`: present at the input, absent at the output.
pub fn remove_dim_type(dim: Dim) -> BlockTy {
    BlockTy::assemble(
        vec![d_in()],
        vec![d_out()],
        vec![
            Fact::in_union(dim.clone(), [d_in()]),
            Fact::not_in(dim.clone(), d_out()),
        ],
        vec![Fact::induced_by(d_out(), [Inducer::new(d_in(), [dim])])],
    )
}

/// Broadcasting union of `inputs` inputs into one output.
pub fn union_type(inputs: usize) -> BlockTy {
    let ins: Vec<DimSetVar> = (0..inputs)
        .map(|i| DimSetVar::Named(format!("d_in_{}", i)))
        .collect();
    let indirect = if ins.is_empty() {
        Vec::new()
    } else {
        vec![Fact::induced_by(
            d_out(),
            ins.iter().cloned().map(Inducer::unfiltered),
        )]
    };
    BlockTy::assemble(ins, vec![d_out()], Vec::new(), indirect)
}

/// Pass-through block.
pub fn identity_type() -> BlockTy {
    BlockTy::assemble(
        vec![d_in()],
        vec![d_out()],
        vec![Fact::equal(d_in(), d_out()), Fact::equal(d_out(), d_in())],
        Vec::new(),
    )
}
