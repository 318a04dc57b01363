// diag.rs — Error taxonomy and diagnostic rendering
//
// Every failure of an inference run is an `InferError`. None are recoverable
// locally: the current `infer` call aborts and the error travels to the
// caller carrying the schema and the offending fact/variable by name.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    pub const E0100: DiagCode = DiagCode("E0100"); // unmapped variable
    pub const E0101: DiagCode = DiagCode("E0101"); // cyclic schema dependency
    pub const E0102: DiagCode = DiagCode("E0102"); // unseeded primitive schema
    pub const E0103: DiagCode = DiagCode("E0103"); // non-convergent fixpoint
    pub const E0104: DiagCode = DiagCode("E0104"); // inconsistent constraints
    pub const E0105: DiagCode = DiagCode("E0105"); // arity mismatch
    pub const E0106: DiagCode = DiagCode("E0106"); // malformed block type
    pub const E0107: DiagCode = DiagCode("E0107"); // schema already typed
    pub const E0108: DiagCode = DiagCode("E0108"); // unknown schema
}

// ── Inference errors ─────────────────────────────────────────────────────

/// Fatal errors of an inference run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferError {
    /// A child's fact mentions a variable the substitution table lacks.
    UnmappedVariable {
        schema: String,
        child: String,
        var: String,
        fact: String,
    },
    /// The composition graph reaches a schema from itself. `cycle` starts
    /// and ends with the re-entered schema.
    CyclicSchemaDependency { cycle: Vec<String> },
    /// A schema with no children and no edges was not seeded with a type.
    UnseededPrimitiveSchema { schema: String },
    /// Saturation exceeded the pass cap.
    NonConvergentFixpoint {
        schema: String,
        passes: usize,
        facts: usize,
    },
    /// Saturation derived both `dim ∈ var` and `dim ∉ var`.
    InconsistentConstraints {
        schema: String,
        dim: String,
        var: String,
    },
    /// A seeded type's variable lists do not match the schema's ports.
    ArityMismatch {
        schema: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// A block type breaks the closed-world or category invariant.
    MalformedBlockType { reason: String },
    /// The typing already holds a type for this schema.
    SchemaAlreadyTyped { schema: String },
    /// A schema handle that does not belong to the program.
    UnknownSchema { id: u32 },
}

impl InferError {
    pub fn code(&self) -> DiagCode {
        match self {
            InferError::UnmappedVariable { .. } => codes::E0100,
            InferError::CyclicSchemaDependency { .. } => codes::E0101,
            InferError::UnseededPrimitiveSchema { .. } => codes::E0102,
            InferError::NonConvergentFixpoint { .. } => codes::E0103,
            InferError::InconsistentConstraints { .. } => codes::E0104,
            InferError::ArityMismatch { .. } => codes::E0105,
            InferError::MalformedBlockType { .. } => codes::E0106,
            InferError::SchemaAlreadyTyped { .. } => codes::E0107,
            InferError::UnknownSchema { .. } => codes::E0108,
        }
    }

    /// Remediation hint, when one exists.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            InferError::UnmappedVariable { .. } => {
                Some("the block's port mapping must cover every port of its schema")
            }
            InferError::CyclicSchemaDependency { .. } => {
                Some("a schema cannot contain an instance of itself")
            }
            InferError::UnseededPrimitiveSchema { .. } => {
                Some("seed primitive schemas with a type before running inference")
            }
            InferError::NonConvergentFixpoint { .. } => {
                Some("raise the pass cap; if it still fails the rule table is at fault")
            }
            InferError::InconsistentConstraints { .. } => {
                Some("pass --allow-inconsistent to keep the derived facts anyway")
            }
            _ => None,
        }
    }
}

impl fmt::Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferError::UnmappedVariable {
                schema,
                child,
                var,
                fact,
            } => write!(
                f,
                "in '{}': variable '{}' of child '{}' has no port (fact: {})",
                schema, var, child, fact
            ),
            InferError::CyclicSchemaDependency { cycle } => {
                write!(f, "cyclic schema dependency: {}", cycle.join(" -> "))
            }
            InferError::UnseededPrimitiveSchema { schema } => {
                write!(f, "primitive schema '{}' has no type", schema)
            }
            InferError::NonConvergentFixpoint {
                schema,
                passes,
                facts,
            } => write!(
                f,
                "in '{}': no fixpoint after {} passes ({} facts)",
                schema, passes, facts
            ),
            InferError::InconsistentConstraints { schema, dim, var } => write!(
                f,
                "in '{}': dimension '{}' is both required in and excluded from {}",
                schema, dim, var
            ),
            InferError::ArityMismatch {
                schema,
                expected,
                found,
            } => write!(
                f,
                "type for '{}' has {} inputs / {} outputs, schema has {} / {}",
                schema, found.0, found.1, expected.0, expected.1
            ),
            InferError::MalformedBlockType { reason } => {
                write!(f, "malformed block type: {}", reason)
            }
            InferError::SchemaAlreadyTyped { schema } => {
                write!(f, "schema '{}' already has a type", schema)
            }
            InferError::UnknownSchema { id } => write!(f, "unknown schema s{}", id),
        }
    }
}

impl std::error::Error for InferError {}

// ── Rendering ────────────────────────────────────────────────────────────

/// Render an error the way the CLI prints it: `error[E0101]: ...` plus an
/// optional hint line.
pub fn render(err: &InferError) -> String {
    let mut out = format!("error[{}]: {}", err.code(), err);
    if let Some(hint) = err.hint() {
        out.push_str("\n  hint: ");
        out.push_str(hint);
    }
    out
}
