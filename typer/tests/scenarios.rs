// End-to-end inference scenarios over programmatically built schemas.
//
// A: a seeded primitive alone
// B: two chained fresh-dim blocks
// C: two chained removals
// D: union, two parallel removals, second union
// plus memoization, cycle and seeding failures.

use std::sync::Arc;

use dimflow::primitive::{fresh_dim_type, identity_type, remove_dim_type, union_type};
use dimflow::schema::Ports;
use dimflow::{infer, BlockTy, Dim, DimSetVar, Fact, InferError, Inducer, Program, Typing};
use dimflow::id::{SchemaId, Vertex};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn d(name: &str) -> Dim {
    Dim::new(name)
}

fn port(v: Vertex) -> DimSetVar {
    DimSetVar::Port(v)
}

fn io(p: &Program, s: SchemaId) -> (Vec<Vertex>, Vec<Vertex>) {
    let sc = p.schema(s);
    (sc.in_vertices.clone(), sc.out_vertices.clone())
}

/// Wire `X0 -> first ... last -> Y0` through a chain of unary blocks.
fn chain(p: &mut Program, main: SchemaId, blocks: &[Ports]) {
    let (ins, outs) = io(p, main);
    p.connect(main, ins[0], blocks[0].inputs[0]);
    for pair in blocks.windows(2) {
        p.connect(main, pair[0].outputs[0], pair[1].inputs[0]);
    }
    p.connect(main, blocks[blocks.len() - 1].outputs[0], outs[0]);
}

struct Built {
    program: Program,
    typing: Typing,
    main: SchemaId,
    x0: Vertex,
    y0: Vertex,
}

fn scenario_b() -> Built {
    let mut p = Program::new();
    let add0 = p.add_schema("builtin add fresh0", &["x"], &["y"]);
    let add1 = p.add_schema("builtin add fresh1", &["x"], &["y"]);
    let main = p.add_schema("main", &["X0"], &["Y0"]);
    let b0 = p.instantiate(main, add0);
    let b1 = p.instantiate(main, add1);
    chain(&mut p, main, &[b0, b1]);

    let mut typing = Typing::new();
    typing.seed(&p, add0, fresh_dim_type(d("fresh0"))).unwrap();
    typing.seed(&p, add1, fresh_dim_type(d("fresh1"))).unwrap();
    let (ins, outs) = io(&p, main);
    Built {
        program: p,
        typing,
        main,
        x0: ins[0],
        y0: outs[0],
    }
}

fn scenario_c() -> Built {
    let mut p = Program::new();
    let rm0 = p.add_schema("builtin remove fresh0", &["x"], &["y"]);
    let rm1 = p.add_schema("builtin remove fresh1", &["x"], &["y"]);
    let main = p.add_schema("main", &["X0"], &["Y0"]);
    let b0 = p.instantiate(main, rm0);
    let b1 = p.instantiate(main, rm1);
    chain(&mut p, main, &[b0, b1]);

    let mut typing = Typing::new();
    typing.seed(&p, rm0, remove_dim_type(d("fresh0"))).unwrap();
    typing.seed(&p, rm1, remove_dim_type(d("fresh1"))).unwrap();
    let (ins, outs) = io(&p, main);
    Built {
        program: p,
        typing,
        main,
        x0: ins[0],
        y0: outs[0],
    }
}

// ── Scenario A ──────────────────────────────────────────────────────────────

#[test]
fn scenario_a_primitive_returns_seeded_type() {
    let mut p = Program::new();
    let add = p.add_schema("builtin add fresh0", &["X0"], &["Y0"]);
    let mut typing = Typing::new();
    let seeded = typing.seed(&p, add, fresh_dim_type(d("fresh0"))).unwrap();

    let ty = infer(&p, add, &mut typing).unwrap();
    assert!(Arc::ptr_eq(&seeded, &ty));
    assert_eq!(*ty, fresh_dim_type(d("fresh0")));
}

// ── Scenario B ──────────────────────────────────────────────────────────────

#[test]
fn scenario_b_chained_fresh_dims() {
    let Built {
        program,
        mut typing,
        main,
        x0,
        y0,
    } = scenario_b();
    let ty = infer(&program, main, &mut typing).unwrap();
    let (x, y) = (port(x0), port(y0));

    for fact in [
        Fact::in_union(d("fresh0"), [y.clone()]),
        Fact::in_union(d("fresh1"), [y.clone()]),
        Fact::not_in(d("fresh0"), x.clone()),
        Fact::not_in(d("fresh1"), x.clone()),
        Fact::depends_on(d("fresh0"), x.clone(), []),
        Fact::depends_on(d("fresh1"), x.clone(), []),
    ] {
        assert!(ty.contains(&fact), "missing {}", program.fact_line(&fact));
    }

    let inductions: Vec<&Fact<DimSetVar>> = ty
        .indirect()
        .iter()
        .filter(|f| matches!(f, Fact::InducedBy { .. }))
        .collect();
    assert_eq!(
        inductions,
        vec![&Fact::induced_by(y, [Inducer::new(x, [d("fresh0"), d("fresh1")])])]
    );
}

#[test]
fn scenario_b_type_is_closed_over_interface() {
    let Built {
        program,
        mut typing,
        main,
        x0,
        y0,
    } = scenario_b();
    let ty = infer(&program, main, &mut typing).unwrap();
    for fact in ty.facts() {
        for var in fact.vars() {
            assert!(
                *var == port(x0) || *var == port(y0),
                "{} leaks an internal port",
                program.fact_line(fact)
            );
        }
        assert!(!matches!(fact, Fact::Equal { .. }));
    }
}

// ── Scenario C ──────────────────────────────────────────────────────────────

#[test]
fn scenario_c_chained_removals() {
    let Built {
        program,
        mut typing,
        main,
        x0,
        y0,
    } = scenario_c();
    let ty = infer(&program, main, &mut typing).unwrap();
    let (x, y) = (port(x0), port(y0));

    assert!(ty.contains(&Fact::not_in(d("fresh0"), y.clone())));
    assert!(ty.contains(&Fact::not_in(d("fresh1"), y.clone())));
    assert!(ty.contains(&Fact::in_union(d("fresh0"), [x.clone()])));
    assert!(ty.contains(&Fact::in_union(d("fresh1"), [x.clone()])));
    assert!(ty.contains(&Fact::induced_by(
        y.clone(),
        [Inducer::new(x, [d("fresh0"), d("fresh1")])]
    )));

    for fact in ty.direct() {
        if let Fact::InUnion { vars, .. } = fact {
            assert!(!vars.contains(&y), "unexpected {}", program.fact_line(fact));
        }
    }
}

// ── Scenario D ──────────────────────────────────────────────────────────────

#[test]
fn scenario_d_parallel_removals_between_unions() {
    let mut p = Program::new();
    let join = p.add_schema("builtin union", &["a", "b"], &["c"]);
    let rm0 = p.add_schema("builtin remove fresh0", &["x"], &["y"]);
    let rm1 = p.add_schema("builtin remove fresh1", &["x"], &["y"]);
    let main = p.add_schema("main", &["X0", "X1"], &["Y0"]);

    let u1 = p.instantiate(main, join);
    let r0 = p.instantiate(main, rm0);
    let r1 = p.instantiate(main, rm1);
    let u2 = p.instantiate(main, join);
    let (ins, outs) = io(&p, main);
    p.connect(main, ins[0], u1.inputs[0]);
    p.connect(main, ins[1], u1.inputs[1]);
    p.connect(main, u1.outputs[0], r0.inputs[0]);
    p.connect(main, u1.outputs[0], r1.inputs[0]);
    p.connect(main, r0.outputs[0], u2.inputs[0]);
    p.connect(main, r1.outputs[0], u2.inputs[1]);
    p.connect(main, u2.outputs[0], outs[0]);

    let mut typing = Typing::new();
    typing.seed(&p, join, union_type(2)).unwrap();
    typing.seed(&p, rm0, remove_dim_type(d("fresh0"))).unwrap();
    typing.seed(&p, rm1, remove_dim_type(d("fresh1"))).unwrap();

    let ty = infer(&p, main, &mut typing).unwrap();
    let (x0, x1, y) = (port(ins[0]), port(ins[1]), port(outs[0]));

    // Each removal only requires its dim somewhere in the inputs.
    assert!(ty.contains(&Fact::in_union(d("fresh0"), [x0.clone(), x1.clone()])));
    assert!(ty.contains(&Fact::in_union(d("fresh1"), [x0.clone(), x1.clone()])));
    // The parallel paths restore each other's dim at the output.
    assert!(ty.contains(&Fact::induced_by(
        y.clone(),
        [Inducer::unfiltered(x0), Inducer::unfiltered(x1)]
    )));
    assert!(ty.contains(&Fact::in_union(d("fresh0"), [y.clone()])));
    assert!(ty.contains(&Fact::in_union(d("fresh1"), [y.clone()])));
    assert!(!ty.contains(&Fact::not_in(d("fresh0"), y.clone())));
    assert!(!ty.contains(&Fact::not_in(d("fresh1"), y)));
}

// ── Memoization ─────────────────────────────────────────────────────────────

/// `outer(X0) -> (Y0)` wrapping one instance of scenario B's `main`.
fn wrap(p: &mut Program, inner: SchemaId) -> SchemaId {
    let outer = p.add_schema("outer", &["X0"], &["Y0"]);
    let b = p.instantiate(outer, inner);
    chain(p, outer, &[b]);
    outer
}

#[test]
fn memoized_result_is_the_same_value() {
    let Built {
        mut program,
        mut typing,
        main,
        ..
    } = scenario_b();
    let outer = wrap(&mut program, main);
    let first = infer(&program, outer, &mut typing).unwrap();
    let inner = Arc::clone(typing.get(main).unwrap());
    assert!(Arc::ptr_eq(&inner, &infer(&program, main, &mut typing).unwrap()));
    assert!(Arc::ptr_eq(&first, &infer(&program, outer, &mut typing).unwrap()));
}

#[test]
fn preseeded_child_gives_same_parent_type() {
    let Built {
        mut program,
        typing,
        main,
        ..
    } = scenario_b();
    let outer = wrap(&mut program, main);

    let mut recursive = typing.clone();
    let via_recursion = infer(&program, outer, &mut recursive).unwrap();

    let mut seeded = typing.clone();
    let inner_ty: BlockTy = (**recursive.get(main).unwrap()).clone();
    seeded.seed(&program, main, inner_ty).unwrap();
    let via_seed = infer(&program, outer, &mut seeded).unwrap();

    assert_eq!(*via_recursion, *via_seed);
}

#[test]
fn shared_child_schema_is_inferred_once() {
    let mut p = Program::new();
    let id = p.add_schema("builtin id", &["x"], &["y"]);
    let wrap = p.add_schema("wrap", &["x"], &["y"]);
    let inner = p.instantiate(wrap, id);
    chain(&mut p, wrap, &[inner]);
    let outer = p.add_schema("outer", &["X0"], &["Y0"]);
    let a = p.instantiate(outer, wrap);
    let b = p.instantiate(outer, wrap);
    chain(&mut p, outer, &[a, b]);

    let mut typing = Typing::new();
    typing.seed(&p, id, identity_type()).unwrap();
    infer(&p, outer, &mut typing).unwrap();
    // The seed, `wrap`, `outer`.
    assert_eq!(typing.len(), 3);
}

// ── Failures ────────────────────────────────────────────────────────────────

#[test]
fn composition_cycle_is_reported_with_path() {
    let mut p = Program::new();
    let a = p.add_schema("a", &["x"], &["y"]);
    let b = p.add_schema("b", &["x"], &["y"]);
    let c = p.add_schema("c", &["x"], &["y"]);
    p.instantiate(a, b);
    p.instantiate(b, c);
    p.instantiate(c, b);

    let err = infer(&p, a, &mut Typing::new()).unwrap_err();
    assert_eq!(
        err,
        InferError::CyclicSchemaDependency {
            cycle: vec!["b".into(), "c".into(), "b".into()]
        }
    );
    assert_eq!(err.to_string(), "cyclic schema dependency: b -> c -> b");
}

#[test]
fn missing_seed_names_the_primitive() {
    let Built { program, main, .. } = scenario_b();
    let mut partial = Typing::new();
    let add0 = program.schema_by_name("builtin add fresh0").unwrap().id;
    partial
        .seed(&program, add0, fresh_dim_type(d("fresh0")))
        .unwrap();
    let err = infer(&program, main, &mut partial).unwrap_err();
    assert_eq!(
        err,
        InferError::UnseededPrimitiveSchema {
            schema: "builtin add fresh1".into()
        }
    );
    assert!(!partial.contains(main));
}
