// dimflow — Dimension-flow type inference
//
// Library root. Leaves first: identities, the fact language, block model,
// rule table and saturation, projection, the composition driver, then the
// loader, emitters and pipeline used by the CLI.

pub mod classes;
pub mod constraint;
pub mod diag;
pub mod dot;
pub mod fixpoint;
pub mod id;
pub mod infer;
pub mod loader;
pub mod pipeline;
pub mod primitive;
pub mod project;
pub mod rules;
pub mod schema;
pub mod ty;

pub use constraint::{Dim, DimSetVar, Fact, Inducer};
pub use diag::InferError;
pub use infer::{infer, infer_with_options, InferOptions};
pub use schema::Program;
pub use ty::{BlockTy, Typing};
