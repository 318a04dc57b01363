// schema.rs — Block schemas, block instances and the build session
//
// A `Program` is one build session: it owns the id allocator, the vertex
// arena (display name + role per port) and every schema. Schemas are built
// up front (interface first, then child blocks and wiring) and are not
// touched by inference.
//
// Preconditions: handles passed in belong to this program.
// Postconditions: every block's port mapping covers its schema's ports.
// Failure modes: none (malformed wiring surfaces during inference).
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use crate::constraint::{DimSetVar, Fact};
use crate::id::{IdAllocator, SchemaId, Vertex};

// ── Vertices ────────────────────────────────────────────────────────────────

/// Display-only role of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub struct VertexInfo {
    pub name: String,
    pub role: PortRole,
}

// ── Schemas and blocks ──────────────────────────────────────────────────────

/// An instantiation of a schema inside an enclosing schema.
///
/// `port_mapping` sends each of the child schema's interface vertices to a
/// vertex scoped to the parent.
#[derive(Debug, Clone)]
pub struct Block {
    pub schema: SchemaId,
    pub port_mapping: BTreeMap<Vertex, Vertex>,
}

/// Parent-scoped ports of a freshly instantiated block, in the child
/// schema's port order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ports {
    pub inputs: Vec<Vertex>,
    pub outputs: Vec<Vertex>,
}

/// Reusable shape plus internal wiring of child block instances.
#[derive(Debug, Clone)]
pub struct BlockSchema {
    pub id: SchemaId,
    pub name: String,
    pub in_vertices: Vec<Vertex>,
    pub out_vertices: Vec<Vertex>,
    pub children: Vec<Block>,
    pub edges: BTreeMap<Vertex, Vec<Vertex>>,
}

impl BlockSchema {
    /// No children and no wiring: the type must be supplied from outside.
    pub fn is_primitive(&self) -> bool {
        self.children.is_empty() && self.edges.is_empty()
    }

    /// Inputs followed by outputs.
    pub fn interface(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.in_vertices
            .iter()
            .chain(self.out_vertices.iter())
            .copied()
    }

    pub fn interface_set(&self) -> BTreeSet<Vertex> {
        self.interface().collect()
    }

    /// All wiring edges as `(source, destination)` pairs.
    pub fn edge_pairs(&self) -> impl Iterator<Item = (Vertex, Vertex)> + '_ {
        self.edges
            .iter()
            .flat_map(|(src, dsts)| dsts.iter().map(move |dst| (*src, *dst)))
    }
}

// ── Build session ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Program {
    ids: IdAllocator,
    vertices: Vec<VertexInfo>,
    schemas: Vec<BlockSchema>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_vertex(&mut self, role: PortRole, name: impl Into<String>) -> Vertex {
        let v = self.ids.alloc_vertex();
        self.vertices.push(VertexInfo {
            name: name.into(),
            role,
        });
        v
    }

    /// Create a schema with fresh interface vertices and no children.
    pub fn add_schema(&mut self, name: impl Into<String>, inputs: &[&str], outputs: &[&str]) -> SchemaId {
        let in_vertices = inputs
            .iter()
            .map(|n| self.alloc_vertex(PortRole::Input, *n))
            .collect();
        let out_vertices = outputs
            .iter()
            .map(|n| self.alloc_vertex(PortRole::Output, *n))
            .collect();
        self.add_schema_with(name, in_vertices, out_vertices)
    }

    /// Create a schema over already-allocated interface vertices.
    pub fn add_schema_with(
        &mut self,
        name: impl Into<String>,
        in_vertices: Vec<Vertex>,
        out_vertices: Vec<Vertex>,
    ) -> SchemaId {
        let id = self.ids.alloc_schema();
        self.schemas.push(BlockSchema {
            id,
            name: name.into(),
            in_vertices,
            out_vertices,
            children: Vec::new(),
            edges: BTreeMap::new(),
        });
        id
    }

    /// Add a block of `child` inside `parent`, allocating a fresh
    /// parent-scoped vertex for each of the child's ports.
    pub fn instantiate(&mut self, parent: SchemaId, child: SchemaId) -> Ports {
        let (child_name, child_in, child_out) = {
            let c = &self.schemas[child.0 as usize];
            (c.name.clone(), c.in_vertices.clone(), c.out_vertices.clone())
        };
        let ordinal = self.schemas[parent.0 as usize].children.len();
        let mut port_mapping = BTreeMap::new();
        let mut fresh = |program: &mut Program, ports: &[Vertex], role: PortRole| -> Vec<Vertex> {
            ports
                .iter()
                .map(|&port| {
                    let name = format!("{}#{}.{}", child_name, ordinal, program.vertex(port).name);
                    let v = program.alloc_vertex(role, name);
                    port_mapping.insert(port, v);
                    v
                })
                .collect()
        };
        let inputs = fresh(self, &child_in, PortRole::Input);
        let outputs = fresh(self, &child_out, PortRole::Output);
        self.add_block(
            parent,
            Block {
                schema: child,
                port_mapping,
            },
        );
        Ports { inputs, outputs }
    }

    /// Add a block with an explicit port mapping.
    pub fn add_block(&mut self, parent: SchemaId, block: Block) {
        self.schemas[parent.0 as usize].children.push(block);
    }

    /// Wire `source` to `destination` inside `parent`.
    pub fn connect(&mut self, parent: SchemaId, source: Vertex, destination: Vertex) {
        self.schemas[parent.0 as usize]
            .edges
            .entry(source)
            .or_default()
            .push(destination);
    }

    pub fn schema(&self, id: SchemaId) -> &BlockSchema {
        &self.schemas[id.0 as usize]
    }

    pub fn get_schema(&self, id: SchemaId) -> Option<&BlockSchema> {
        self.schemas.get(id.0 as usize)
    }

    pub fn schema_by_name(&self, name: &str) -> Option<&BlockSchema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &BlockSchema> {
        self.schemas.iter()
    }

    pub fn vertex(&self, v: Vertex) -> &VertexInfo {
        &self.vertices[v.0 as usize]
    }

    /// Display name of a vertex; unknown handles print as `v<N>`.
    pub fn vertex_name(&self, v: Vertex) -> String {
        match self.vertices.get(v.0 as usize) {
            Some(info) => info.name.clone(),
            None => v.to_string(),
        }
    }

    /// Display name of a type variable.
    pub fn var_name(&self, var: &DimSetVar) -> String {
        match var {
            DimSetVar::Named(name) => name.clone(),
            DimSetVar::Port(v) => self.vertex_name(*v),
        }
    }

    /// Render a typed fact on one line with port names.
    pub fn fact_line(&self, fact: &Fact<DimSetVar>) -> String {
        fact.render(|v| self.var_name(v))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
