// id.rs — Identity handles for ports and schemas
//
// Vertices (ports) and schemas are compared by identity only. Both are plain
// indices into the arena owned by one build session (`schema::Program`), so
// two sessions never share counters and tests cannot observe each other's
// allocation order.

use std::fmt;

/// A port: one tensor value at a block's input or output boundary.
///
/// Two vertices with the same display name are still distinct unless they
/// are the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vertex(pub u32);

/// Identity of a block schema within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub u32);

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Allocator for session-scoped handles. Produces monotonically increasing
/// IDs in allocation order, ensuring deterministic assignment.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_vertex: u32,
    next_schema: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_vertex(&mut self) -> Vertex {
        let id = Vertex(self.next_vertex);
        self.next_vertex += 1;
        id
    }

    pub fn alloc_schema(&mut self) -> SchemaId {
        let id = SchemaId(self.next_schema);
        self.next_schema += 1;
        id
    }
}
