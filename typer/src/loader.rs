// loader.rs — JSON program descriptions
//
// Reads the program description a front-end emits (name tables plus
// schemata with interfaces, block index mappings and edges) into a
// `Program`, and seeds a `Typing` for every schema carrying a primitive
// descriptor.
//
// Preconditions: none.
// Postconditions: schemas are allocated in file order; every block's port
//   mapping covers its child's interface; every descriptor-carrying schema
//   is seeded.
// Failure modes: `LoadError` (I/O, JSON syntax, dangling ids, duplicate
//   schema ids, incomplete block mappings, primitive arity, primitives
//   that also carry blocks or edges).
// Side effects: reads the input file (`load_file` only).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::constraint::Dim;
use crate::diag::InferError;
use crate::id::{SchemaId, Vertex};
use crate::primitive::Primitive;
use crate::schema::{Block, PortRole, Program};
use crate::ty::Typing;

// ── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgramDto {
    #[serde(default)]
    dims: Vec<(u32, String)>,
    dim_set_vars: Vec<(u32, String)>,
    schemata: Vec<SchemaDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDto {
    id: u32,
    name: String,
    interface: InterfaceDto,
    #[serde(default)]
    blocks: Vec<BlockDto>,
    #[serde(default)]
    edges: Vec<(u32, u32)>,
    #[serde(default)]
    primitive: Option<PrimitiveDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InterfaceDto {
    in_vertices: Vec<u32>,
    out_vertices: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockDto {
    schema_id: u32,
    interface_mapping: Vec<(u32, u32)>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum PrimitiveDto {
    AddDim { dim: u32 },
    RemoveDim { dim: u32 },
    Union { inputs: usize },
    Identity,
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum LoadError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    JsonError {
        source: serde_json::Error,
    },
    UnknownDim {
        schema: String,
        id: u32,
    },
    UnknownVertex {
        schema: String,
        id: u32,
    },
    UnknownSchema {
        schema: String,
        id: u32,
    },
    DuplicateSchema {
        id: u32,
    },
    IncompleteMapping {
        schema: String,
        child: String,
        vertex: u32,
    },
    PrimitiveArity {
        schema: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    WiredPrimitive {
        schema: String,
    },
    Seed {
        source: InferError,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::IoError { path, source } => write!(f, "{}: {}", path.display(), source),
            LoadError::JsonError { source } => write!(f, "invalid program description: {}", source),
            LoadError::UnknownDim { schema, id } => {
                write!(f, "in '{}': unknown dim id {}", schema, id)
            }
            LoadError::UnknownVertex { schema, id } => {
                write!(f, "in '{}': vertex id {} has no name", schema, id)
            }
            LoadError::UnknownSchema { schema, id } => {
                write!(f, "in '{}': block refers to unknown schema id {}", schema, id)
            }
            LoadError::DuplicateSchema { id } => write!(f, "schema id {} is declared twice", id),
            LoadError::IncompleteMapping {
                schema,
                child,
                vertex,
            } => write!(
                f,
                "in '{}': block of '{}' does not map interface vertex {}",
                schema, child, vertex
            ),
            LoadError::PrimitiveArity {
                schema,
                expected,
                found,
            } => write!(
                f,
                "primitive '{}' needs {} inputs / {} outputs, interface has {} / {}",
                schema, expected.0, expected.1, found.0, found.1
            ),
            LoadError::WiredPrimitive { schema } => {
                write!(f, "primitive '{}' must not contain blocks or edges", schema)
            }
            LoadError::Seed { source } => write!(f, "{}", source),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::IoError { source, .. } => Some(source),
            LoadError::JsonError { source } => Some(source),
            LoadError::Seed { source } => Some(source),
            _ => None,
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────────────

/// A program ready for inference.
#[derive(Debug)]
pub struct Loaded {
    pub program: Program,
    pub typing: Typing,
}

pub fn load_file(path: &Path) -> Result<Loaded, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_str(&text)
}

pub fn load_str(text: &str) -> Result<Loaded, LoadError> {
    let dto: ProgramDto = serde_json::from_str(text).map_err(|e| LoadError::JsonError { source: e })?;
    build(dto)
}

/// Per-schema view of JSON vertex ids.
struct Scope {
    vertices: HashMap<u32, Vertex>,
}

struct Builder<'a> {
    program: Program,
    dims: HashMap<u32, &'a str>,
    vertex_names: HashMap<u32, &'a str>,
    schema_ids: HashMap<u32, SchemaId>,
    scopes: Vec<Scope>,
}

impl<'a> Builder<'a> {
    fn vertex_name(&self, schema: &str, id: u32) -> Result<&'a str, LoadError> {
        self.vertex_names
            .get(&id)
            .copied()
            .ok_or_else(|| LoadError::UnknownVertex {
                schema: schema.to_string(),
                id,
            })
    }

    /// The parent-scoped vertex for `id`, allocated on first use.
    fn scoped_vertex(&mut self, scope: usize, schema: &str, id: u32, role: PortRole) -> Result<Vertex, LoadError> {
        if let Some(v) = self.scopes[scope].vertices.get(&id) {
            return Ok(*v);
        }
        let name = self.vertex_name(schema, id)?;
        let v = self.program.alloc_vertex(role, name);
        self.scopes[scope].vertices.insert(id, v);
        Ok(v)
    }

    fn dim(&self, schema: &str, id: u32) -> Result<Dim, LoadError> {
        self.dims
            .get(&id)
            .map(|name| Dim::new(name))
            .ok_or_else(|| LoadError::UnknownDim {
                schema: schema.to_string(),
                id,
            })
    }
}

fn build(dto: ProgramDto) -> Result<Loaded, LoadError> {
    let mut b = Builder {
        program: Program::new(),
        dims: dto.dims.iter().map(|(id, n)| (*id, n.as_str())).collect(),
        vertex_names: dto.dim_set_vars.iter().map(|(id, n)| (*id, n.as_str())).collect(),
        schema_ids: HashMap::new(),
        scopes: Vec::new(),
    };

    // Pass 1: interfaces, so blocks may refer to schemas declared later.
    for s in &dto.schemata {
        if b.schema_ids.contains_key(&s.id) {
            return Err(LoadError::DuplicateSchema { id: s.id });
        }
        let scope = b.scopes.len();
        b.scopes.push(Scope {
            vertices: HashMap::new(),
        });
        let mut ports = |ids: &[u32], role: PortRole| -> Result<Vec<Vertex>, LoadError> {
            ids.iter()
                .map(|id| b.scoped_vertex(scope, &s.name, *id, role))
                .collect()
        };
        let ins = ports(&s.interface.in_vertices, PortRole::Input)?;
        let outs = ports(&s.interface.out_vertices, PortRole::Output)?;
        let id = b.program.add_schema_with(s.name.clone(), ins, outs);
        b.schema_ids.insert(s.id, id);
    }

    // Pass 2: blocks, wiring and primitive seeds.
    let mut typing = Typing::new();
    for (scope, s) in dto.schemata.iter().enumerate() {
        let parent = b.schema_ids[&s.id];
        if s.primitive.is_some() && !(s.blocks.is_empty() && s.edges.is_empty()) {
            return Err(LoadError::WiredPrimitive {
                schema: s.name.clone(),
            });
        }
        for block in &s.blocks {
            let child = *b
                .schema_ids
                .get(&block.schema_id)
                .ok_or_else(|| LoadError::UnknownSchema {
                    schema: s.name.clone(),
                    id: block.schema_id,
                })?;
            let child_scope = child.0 as usize;
            let child_dto = &dto.schemata[child_scope];
            let given: BTreeMap<u32, u32> = block.interface_mapping.iter().copied().collect();

            let mut port_mapping = BTreeMap::new();
            let interface = child_dto
                .interface
                .in_vertices
                .iter()
                .map(|id| (*id, PortRole::Input))
                .chain(child_dto.interface.out_vertices.iter().map(|id| (*id, PortRole::Output)));
            for (child_id, role) in interface {
                let parent_id = *given.get(&child_id).ok_or_else(|| LoadError::IncompleteMapping {
                    schema: s.name.clone(),
                    child: child_dto.name.clone(),
                    vertex: child_id,
                })?;
                let child_port = b.scopes[child_scope].vertices[&child_id];
                let parent_port = b.scoped_vertex(scope, &s.name, parent_id, role)?;
                port_mapping.insert(child_port, parent_port);
            }
            b.program.add_block(
                parent,
                Block {
                    schema: child,
                    port_mapping,
                },
            );
        }

        for (src, dst) in &s.edges {
            let src = b.scoped_vertex(scope, &s.name, *src, PortRole::Output)?;
            let dst = b.scoped_vertex(scope, &s.name, *dst, PortRole::Input)?;
            b.program.connect(parent, src, dst);
        }

        if let Some(desc) = &s.primitive {
            let primitive = match desc {
                PrimitiveDto::AddDim { dim } => Primitive::AddDim(b.dim(&s.name, *dim)?),
                PrimitiveDto::RemoveDim { dim } => Primitive::RemoveDim(b.dim(&s.name, *dim)?),
                PrimitiveDto::Union { inputs } => Primitive::Union(*inputs),
                PrimitiveDto::Identity => Primitive::Identity,
            };
            let found = (s.interface.in_vertices.len(), s.interface.out_vertices.len());
            if primitive.arity() != found {
                return Err(LoadError::PrimitiveArity {
                    schema: s.name.clone(),
                    expected: primitive.arity(),
                    found,
                });
            }
            typing
                .seed(&b.program, parent, primitive.ty())
                .map_err(|e| LoadError::Seed { source: e })?;
        }
    }

    Ok(Loaded {
        program: b.program,
        typing,
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"{
        "dims": [[0, "fresh0"]],
        "dimSetVars": [[0, "X0"], [1, "Y0"], [2, "x"], [3, "y"], [4, "a"], [5, "b"]],
        "schemata": [
            { "id": 7, "name": "main",
              "interface": { "inVertices": [0], "outVertices": [1] },
              "blocks": [ { "schemaId": 3, "interfaceMapping": [[2, 4], [3, 5]] } ],
              "edges": [[0, 4], [5, 1]] },
            { "id": 3, "name": "builtin add fresh0",
              "interface": { "inVertices": [2], "outVertices": [3] },
              "primitive": { "kind": "addDim", "dim": 0 } }
        ]
    }"#;

    #[test]
    fn loads_forward_references_and_seeds() {
        let loaded = load_str(CHAIN).unwrap();
        let p = &loaded.program;
        let main = p.schema_by_name("main").unwrap();
        let add = p.schema_by_name("builtin add fresh0").unwrap();
        assert_eq!(main.children.len(), 1);
        assert_eq!(main.children[0].schema, add.id);
        assert_eq!(main.edge_pairs().count(), 2);
        assert!(loaded.typing.contains(add.id));
        assert!(!loaded.typing.contains(main.id));
        assert_eq!(p.vertex_name(main.in_vertices[0]), "X0");
    }

    #[test]
    fn rejects_incomplete_mapping() {
        let text = CHAIN.replace("[[2, 4], [3, 5]]", "[[2, 4]]");
        assert!(matches!(
            load_str(&text),
            Err(LoadError::IncompleteMapping { vertex: 3, .. })
        ));
    }

    #[test]
    fn rejects_dangling_ids() {
        let text = CHAIN.replace("\"schemaId\": 3", "\"schemaId\": 9");
        assert!(matches!(load_str(&text), Err(LoadError::UnknownSchema { id: 9, .. })));

        let text = CHAIN.replace("\"dim\": 0", "\"dim\": 5");
        assert!(matches!(load_str(&text), Err(LoadError::UnknownDim { id: 5, .. })));

        let text = CHAIN.replace("[5, \"b\"]", "[6, \"b\"]");
        assert!(matches!(load_str(&text), Err(LoadError::UnknownVertex { id: 5, .. })));
    }

    #[test]
    fn rejects_wrong_primitive_arity() {
        let text = CHAIN.replace(
            "{ \"kind\": \"addDim\", \"dim\": 0 }",
            "{ \"kind\": \"union\", \"inputs\": 2 }",
        );
        assert!(matches!(
            load_str(&text),
            Err(LoadError::PrimitiveArity { expected: (2, 1), found: (1, 1), .. })
        ));
    }

    #[test]
    fn rejects_wired_primitive() {
        let text = CHAIN.replace(
            "\"primitive\": { \"kind\": \"addDim\", \"dim\": 0 }",
            "\"primitive\": { \"kind\": \"addDim\", \"dim\": 0 }, \"edges\": [[2, 3]]",
        );
        let err = load_str(&text).unwrap_err();
        assert!(matches!(&err, LoadError::WiredPrimitive { schema } if schema == "builtin add fresh0"));
        assert_eq!(
            err.to_string(),
            "primitive 'builtin add fresh0' must not contain blocks or edges"
        );
    }

    #[test]
    fn reports_json_syntax() {
        let err = load_str("{ not json").unwrap_err();
        assert!(matches!(err, LoadError::JsonError { .. }));
        assert!(err.to_string().starts_with("invalid program description"));
    }
}
