// pipeline.rs — Whole-program inference, reports and provenance
//
// Runs the composition driver over a set of root schemas in order, renders
// the typing report and computes build provenance for `--emit build-info`.
//
// Preconditions: `typing` holds the primitive seeds of `program`.
// Postconditions: on success every root (and everything below it) is typed.
// Failure modes: the first `InferError` of any root aborts the run.
// Side effects: verbose timing lines on stderr.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::diag::InferError;
use crate::id::SchemaId;
use crate::infer::{infer_with_options, InferOptions};
use crate::schema::Program;
use crate::ty::{BlockTy, Typing};

// ── Inference over many roots ───────────────────────────────────────────────

/// Infer every schema in `roots`, in order, sharing one typing.
pub fn infer_all(
    program: &Program,
    roots: &[SchemaId],
    typing: &mut Typing,
    opts: &InferOptions,
) -> Result<Vec<(SchemaId, Arc<BlockTy>)>, InferError> {
    let start = Instant::now();
    let mut typed = Vec::with_capacity(roots.len());
    for &root in roots {
        typed.push((root, infer_with_options(program, root, typing, opts)?));
    }
    if opts.verbose {
        eprintln!(
            "dimflow: infer complete, {} schemas typed, {:.1}ms",
            typing.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    Ok(typed)
}

/// Every schema of `program`, in declaration order.
pub fn all_schemas(program: &Program) -> Vec<SchemaId> {
    program.schemas().map(|s| s.id).collect()
}

/// One section per typed schema of `roots`:
///
/// ```text
/// schema main (X0) -> (Y0)
///   direct:
///     fresh0 in {Y0}
/// ```
pub fn typing_report(program: &Program, typing: &Typing, roots: &[SchemaId]) -> String {
    let mut out = String::new();
    for &root in roots {
        let Some(ty) = typing.get(root) else {
            continue;
        };
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(
            out,
            "schema {} {}",
            program.schema(root).name,
            ty.display(program)
        );
    }
    out
}

// ── Provenance ──────────────────────────────────────────────────────────────

/// Provenance metadata for `--emit build-info`.
///
/// `source_hash`: SHA-256 of the raw program description text.
/// `typing_fingerprint`: SHA-256 of the typing report of every schema.
/// `engine_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub typing_fingerprint: [u8; 32],
    pub schemas: usize,
    pub engine_version: &'static str,
}

#[derive(Serialize)]
struct BuildInfo<'a> {
    source_hash: String,
    typing_fingerprint: String,
    schemas: usize,
    engine_version: &'a str,
}

impl Provenance {
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    pub fn typing_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.typing_fingerprint)
    }

    /// Pretty JSON, newline-terminated.
    pub fn to_json(&self) -> String {
        let info = BuildInfo {
            source_hash: self.source_hash_hex(),
            typing_fingerprint: self.typing_fingerprint_hex(),
            schemas: self.schemas,
            engine_version: self.engine_version,
        };
        let mut json = serde_json::to_string_pretty(&info).unwrap_or_default();
        json.push('\n');
        json
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute provenance from the source text and a fully inferred typing.
pub fn compute_provenance(source: &str, program: &Program, typing: &Typing) -> Provenance {
    let roots = all_schemas(program);
    Provenance {
        source_hash: sha256(source),
        typing_fingerprint: sha256(&typing_report(program, typing, &roots)),
        schemas: roots.len(),
        engine_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_str;

    const PROGRAM: &str = r#"{
        "dims": [[0, "fresh0"]],
        "dimSetVars": [[0, "X0"], [1, "Y0"], [2, "x"], [3, "y"], [4, "a"], [5, "b"]],
        "schemata": [
            { "id": 0, "name": "builtin add fresh0",
              "interface": { "inVertices": [2], "outVertices": [3] },
              "primitive": { "kind": "addDim", "dim": 0 } },
            { "id": 1, "name": "main",
              "interface": { "inVertices": [0], "outVertices": [1] },
              "blocks": [ { "schemaId": 0, "interfaceMapping": [[2, 4], [3, 5]] } ],
              "edges": [[0, 4], [5, 1]] }
        ]
    }"#;

    #[test]
    fn infer_all_types_every_root() {
        let mut loaded = load_str(PROGRAM).unwrap();
        let roots = all_schemas(&loaded.program);
        let typed = infer_all(&loaded.program, &roots, &mut loaded.typing, &InferOptions::default()).unwrap();
        assert_eq!(typed.len(), 2);
        assert_eq!(loaded.typing.len(), 2);
    }

    #[test]
    fn report_lists_schemas_in_order() {
        let mut loaded = load_str(PROGRAM).unwrap();
        let roots = all_schemas(&loaded.program);
        infer_all(&loaded.program, &roots, &mut loaded.typing, &InferOptions::default()).unwrap();
        let report = typing_report(&loaded.program, &loaded.typing, &roots);
        let headers: Vec<&str> = report.lines().filter(|l| l.starts_with("schema ")).collect();
        assert_eq!(
            headers,
            vec!["schema builtin add fresh0 (d_in) -> (d_out)", "schema main (X0) -> (Y0)"]
        );
    }

    #[test]
    fn provenance_hash_is_stable() {
        let mut loaded = load_str(PROGRAM).unwrap();
        let roots = all_schemas(&loaded.program);
        infer_all(&loaded.program, &roots, &mut loaded.typing, &InferOptions::default()).unwrap();
        let a = compute_provenance(PROGRAM, &loaded.program, &loaded.typing);
        let b = compute_provenance(PROGRAM, &loaded.program, &loaded.typing);
        assert_eq!(a.source_hash_hex(), b.source_hash_hex());
        assert_eq!(a.source_hash_hex().len(), 64);
        assert_eq!(a.schemas, 2);

        let other = compute_provenance("{}", &loaded.program, &loaded.typing);
        assert_ne!(a.source_hash, other.source_hash);
        assert_eq!(a.typing_fingerprint, other.typing_fingerprint);
    }

    #[test]
    fn build_info_is_json() {
        let mut loaded = load_str(PROGRAM).unwrap();
        let roots = all_schemas(&loaded.program);
        infer_all(&loaded.program, &roots, &mut loaded.typing, &InferOptions::default()).unwrap();
        let json = compute_provenance(PROGRAM, &loaded.program, &loaded.typing).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["schemas"], 2);
        assert_eq!(value["engine_version"], env!("CARGO_PKG_VERSION"));
    }
}
