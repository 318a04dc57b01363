// dot.rs — Graphviz DOT output for block schemas
//
// Renders schemas as nested clusters: one cluster per schema or block
// instance, interface ports as nodes, wiring as solid edges. Below the
// expansion depth a block's internals are hidden and invisible in→out
// edges keep its ports stacked. Primitive blocks draw dashed in→out edges.
// When a typing is supplied, port labels list the dims the schema's type
// places at (`+d`) or excludes from (`-d`) that port.
//
// Preconditions: `roots` belong to `program`.
// Postconditions: returns DOT text; node names are unique per call.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::constraint::{DimSetVar, Fact};
use crate::id::{SchemaId, Vertex};
use crate::schema::{BlockSchema, Program};
use crate::ty::Typing;

/// Emit `roots` (each as a top-level cluster) as a Graphviz DOT string,
/// expanding nested blocks `depth` levels deep.
pub fn emit_dot(program: &Program, roots: &[SchemaId], depth: usize, typing: Option<&Typing>) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph G {{").unwrap();
    writeln!(buf, "    rankdir=TB;").unwrap();
    writeln!(buf, "    fontname=\"Courier New\";").unwrap();
    writeln!(buf, "    node [shape=box, fontname=\"Courier New\"];").unwrap();
    writeln!(buf, "    edge [headport=n, tailport=s];").unwrap();

    let mut emitter = Emitter {
        program,
        typing,
        next_id: 0,
        buf,
    };
    for root in roots {
        emitter.schema(program.schema(*root), depth, &BTreeMap::new(), 1);
    }
    let mut buf = emitter.buf;
    writeln!(buf, "}}").unwrap();
    buf
}

struct Emitter<'a> {
    program: &'a Program,
    typing: Option<&'a Typing>,
    next_id: u32,
    buf: String,
}

impl<'a> Emitter<'a> {
    fn fresh(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Write one cluster. `outer` names the schema's interface ports as the
    /// enclosing cluster already knows them.
    fn schema(&mut self, schema: &'a BlockSchema, depth: usize, outer: &BTreeMap<Vertex, String>, level: usize) {
        let program = self.program;
        let indent = "    ".repeat(level);
        let cluster = self.fresh();

        let mut names: BTreeMap<Vertex, String> = BTreeMap::new();
        let mut local: Vec<Vertex> = schema.interface().collect();
        for block in &schema.children {
            local.extend(block.port_mapping.values().copied());
        }
        for (s, d) in schema.edge_pairs() {
            local.push(s);
            local.push(d);
        }
        for v in local {
            if names.contains_key(&v) {
                continue;
            }
            let name = match outer.get(&v) {
                Some(name) => name.clone(),
                None => format!("V_{}", self.fresh()),
            };
            names.insert(v, name);
        }

        let title = schema.name.strip_prefix("builtin ").unwrap_or(&schema.name);
        writeln!(self.buf, "{indent}subgraph cluster_{cluster} {{").unwrap();
        writeln!(self.buf, "{indent}    label=\"{}\";", escape(title)).unwrap();
        writeln!(self.buf, "{indent}    labeljust=l;").unwrap();

        let marks = self.dim_marks(schema);
        for v in schema.interface() {
            let mut label = program.vertex_name(v);
            if let Some(m) = marks.get(&v) {
                label = format!("{} [{}]", label, m.join(", "));
            }
            writeln!(self.buf, "{indent}    {} [label=\"{}\"];", names[&v], escape(&label)).unwrap();
        }

        let mut drawn: BTreeSet<(Vertex, Vertex)> = BTreeSet::new();
        if schema.is_primitive() {
            for &i in &schema.in_vertices {
                for &o in &schema.out_vertices {
                    writeln!(self.buf, "{indent}    {} -> {} [style=dashed];", names[&i], names[&o]).unwrap();
                    drawn.insert((i, o));
                }
            }
        }

        if depth > 0 {
            for block in &schema.children {
                let child = program.schema(block.schema);
                let inner: BTreeMap<Vertex, String> = block
                    .port_mapping
                    .iter()
                    .map(|(port, v)| (*port, names[v].clone()))
                    .collect();
                self.schema(child, depth - 1, &inner, level + 1);
            }
            for (s, d) in schema.edge_pairs() {
                writeln!(self.buf, "{indent}    {} -> {};", names[&s], names[&d]).unwrap();
            }
        } else {
            for &i in &schema.in_vertices {
                for &o in &schema.out_vertices {
                    if !drawn.contains(&(i, o)) {
                        writeln!(
                            self.buf,
                            "{indent}    {} -> {} [style=invis, weight=0];",
                            names[&i], names[&o]
                        )
                        .unwrap();
                    }
                }
            }
        }

        writeln!(self.buf, "{indent}}}").unwrap();
    }

    /// `+d` / `-d` marks per interface port, from the schema's type.
    fn dim_marks(&self, schema: &BlockSchema) -> BTreeMap<Vertex, Vec<String>> {
        let mut marks: BTreeMap<Vertex, Vec<String>> = BTreeMap::new();
        let Some(ty) = self.typing.and_then(|t| t.get(schema.id)) else {
            return marks;
        };
        // Named variables of a seeded type sit at the schema's ports by position.
        let ports: BTreeMap<&DimSetVar, Vertex> = ty
            .in_vars()
            .iter()
            .zip(&schema.in_vertices)
            .chain(ty.out_vars().iter().zip(&schema.out_vertices))
            .map(|(var, v)| (var, *v))
            .collect();
        for fact in ty.direct() {
            let (mark, var) = match fact {
                Fact::InUnion { dim, vars } if vars.len() == 1 => match vars.iter().next() {
                    Some(var) => (format!("+{}", dim), var),
                    None => continue,
                },
                Fact::NotIn { dim, var } => (format!("-{}", dim), var),
                _ => continue,
            };
            if let Some(v) = ports.get(var) {
                marks.entry(*v).or_default().push(mark);
            }
        }
        marks
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Tests ───────────────────────────────────────────────────────────────────
