//! End-to-end tests for parameter folding, width inference, dynamic
//! bit-select expansion, constant functions, and assertion lowering.

use veld_ast::{AstArena, AstKind};
use veld_conformance::*;
use veld_source::Span;

#[test]
fn parameter_folds_to_sized_constant() {
    // parameter [7:0] P = 3 + 5;
    let session = Session::new();
    let mut arena = AstArena::new();
    let three = int_const(&mut arena, 3);
    let five = int_const(&mut arena, 5);
    let sum = arena.with_children(AstKind::Add, Span::DUMMY, vec![three, five]);
    let p = param_decl(&session, &mut arena, "P", Some((7, 0)), sum);
    let top = module(&session, &mut arena, "top", vec![p]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok, "diagnostics: {:?}", outcome.diagnostics);

    let value = arena[p].children[0];
    assert_eq!(arena[value].kind, AstKind::Constant);
    assert_eq!(arena[value].bits.width(), 8);
    assert_eq!(arena[value].bits.to_u64(), Some(8));

    let declared_range = arena[p].children[1];
    assert!(arena[declared_range].range_valid);
    assert_eq!(arena[declared_range].range_left, 7);
    assert_eq!(arena[declared_range].range_right, 0);
}

#[test]
fn localparam_clamps_wide_initializer() {
    // localparam [3:0] N = 16'd300; (truncates to 4 bits)
    let session = Session::new();
    let mut arena = AstArena::new();
    let wide = sized_const(&mut arena, 300, 16);
    let n = param_decl(&session, &mut arena, "N", Some((3, 0)), wide);
    arena[n].kind = AstKind::LocalParam;
    let top = module(&session, &mut arena, "top", vec![n]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok);
    let value = arena[n].children[0];
    assert_eq!(arena[value].bits.width(), 4);
    assert_eq!(arena[value].bits.to_u64(), Some(300 % 16));
}

#[test]
fn clog2_folds_in_parameter_position() {
    // parameter A = $clog2(256);
    let session = Session::new();
    let mut arena = AstArena::new();
    let arg = int_const(&mut arena, 256);
    let call = arena.with_children(AstKind::FCall, Span::DUMMY, vec![arg]);
    arena[call].name = Some(session.id("$clog2"));
    let a = param_decl(&session, &mut arena, "A", None, call);
    let top = module(&session, &mut arena, "top", vec![a]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok, "diagnostics: {:?}", outcome.diagnostics);
    let value = arena[a].children[0];
    assert_eq!(arena[value].kind, AstKind::Constant);
    assert_eq!(arena[value].integer, 8);
}

#[test]
fn dynamic_bit_select_lvalue_becomes_case() {
    // reg [3:0] r; wire [1:0] sel; always @* r[sel] = 1'b1;
    let session = Session::new();
    let mut arena = AstArena::new();
    let r = reg_decl(&session, &mut arena, "r", Some((3, 0)));
    let sel = wire_decl(&session, &mut arena, "sel", Some((1, 0)));

    let sel_ref = ident(&session, &mut arena, "sel");
    let lhs = select(&session, &mut arena, "r", sel_ref);
    let one = sized_const(&mut arena, 1, 1);
    let write = assign(&mut arena, AstKind::AssignEq, lhs, one);
    let proc = always_star(&mut arena, vec![write]);
    let top = module(&session, &mut arena, "top", vec![r, sel, proc]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok, "diagnostics: {:?}", outcome.diagnostics);

    let block = arena[proc].children[0];
    assert_eq!(arena[block].children.len(), 1);
    let case_node = arena[block].children[0];
    assert_eq!(arena[case_node].kind, AstKind::Case);
    // selector plus one arm per bit of r
    assert_eq!(arena[case_node].children.len(), 5);

    for (i, &arm) in arena[case_node].children[1..].iter().enumerate() {
        assert_eq!(arena[arm].kind, AstKind::Cond);
        let match_value = arena[arm].children[0];
        assert_eq!(arena[match_value].integer, i as i64);
        let body = arena[arm].children[1];
        let bit_write = arena[body].children[0];
        assert_eq!(arena[bit_write].kind, AstKind::AssignEq);
        let bit_lhs = arena[bit_write].children[0];
        let bit_range = arena[bit_lhs].children[0];
        assert!(arena[bit_range].range_valid);
        assert_eq!(arena[bit_range].range_left, i as i64);
        assert_eq!(arena[bit_range].range_right, i as i64);
    }
}

/// Builds `function [31:0] f; input [31:0] x; f = x * x; endfunction`.
fn square_function(session: &Session, arena: &mut AstArena) -> veld_ast::NodeId {
    let f = session.id("f");
    let x = session.id("x");

    let result_var = wire_decl(session, arena, "f", Some((31, 0)));
    let input_var = wire_decl(session, arena, "x", Some((31, 0)));
    arena[input_var].is_input = true;

    let xa = arena.ident(x, Span::DUMMY);
    let xb = arena.ident(x, Span::DUMMY);
    let product = arena.with_children(AstKind::Mul, Span::DUMMY, vec![xa, xb]);
    let lhs = arena.ident(f, Span::DUMMY);
    let store = arena.with_children(AstKind::AssignEq, Span::DUMMY, vec![lhs, product]);
    let body = arena.with_children(AstKind::Block, Span::DUMMY, vec![store]);

    let func = arena.with_children(
        AstKind::Function,
        Span::DUMMY,
        vec![result_var, input_var, body],
    );
    arena[func].name = Some(f);
    func
}

#[test]
fn constant_function_call_folds_parameter() {
    // parameter Q = f(5); with f(x) = x * x
    let session = Session::new();
    let mut arena = AstArena::new();
    let func = square_function(&session, &mut arena);

    let arg = int_const(&mut arena, 5);
    let call = arena.with_children(AstKind::FCall, Span::DUMMY, vec![arg]);
    arena[call].name = Some(session.id("f"));
    let q = param_decl(&session, &mut arena, "Q", None, call);
    let top = module(&session, &mut arena, "top", vec![func, q]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok, "diagnostics: {:?}", outcome.diagnostics);

    let value = arena[q].children[0];
    assert_eq!(arena[value].kind, AstKind::Constant);
    assert_eq!(arena[value].bits.to_i64(false), Some(25));
}

#[test]
fn function_call_in_process_is_inlined() {
    // reg [31:0] y; wire [31:0] a; always @* y = f(a);
    let session = Session::new();
    let mut arena = AstArena::new();
    let func = square_function(&session, &mut arena);
    let y = reg_decl(&session, &mut arena, "y", Some((31, 0)));
    let a = wire_decl(&session, &mut arena, "a", Some((31, 0)));

    let arg = ident(&session, &mut arena, "a");
    let call = arena.with_children(AstKind::FCall, Span::DUMMY, vec![arg]);
    arena[call].name = Some(session.id("f"));
    let lhs = ident(&session, &mut arena, "y");
    let store = assign(&mut arena, AstKind::AssignEq, lhs, call);
    let proc = always_star(&mut arena, vec![store]);
    let top = module(&session, &mut arena, "top", vec![func, y, a, proc]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok, "diagnostics: {:?}", outcome.diagnostics);

    // the call site is now an identifier naming the inlined result wire
    assert_eq!(arena[call].kind, AstKind::Identifier);
    let result_name = session
        .interner
        .resolve(arena[call].name.unwrap())
        .to_string();
    assert!(result_name.starts_with("$func$f$"));
    assert!(result_name.ends_with("$f"));

    // the block gained the argument assignment and the inlined body
    let block = arena[proc].children[0];
    assert!(arena[block].children.len() >= 3);

    // the renamed function wires were lifted into the module
    let wire_names = decl_names(&session, &arena, top, AstKind::Wire);
    assert!(wire_names.iter().any(|n| n.starts_with("$func$f$")));
    assert_eq!(count_kind(&arena, top, AstKind::FCall), 0);
}

#[test]
fn assertion_in_process_is_lowered() {
    // always @(posedge clk) assert(a);
    let session = Session::new();
    let mut arena = AstArena::new();
    let clk = wire_decl(&session, &mut arena, "clk", None);
    let a = wire_decl(&session, &mut arena, "a", None);

    let cond = ident(&session, &mut arena, "a");
    let assertion = arena.with_children(AstKind::Assert, Span::DUMMY, vec![cond]);
    let proc = always_posedge(&session, &mut arena, "clk", vec![assertion]);
    let top = module(&session, &mut arena, "top", vec![clk, a, proc]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok, "diagnostics: {:?}", outcome.diagnostics);

    // the process body starts with the x/0 defaults, followed by the
    // lowered assertion site
    let block = arena[proc].children[1];
    assert_eq!(arena[block].children.len(), 2);
    let defaults = arena[block].children[0];
    assert_eq!(arena[defaults].kind, AstKind::Block);
    assert_eq!(arena[defaults].children.len(), 2);
    let site = arena[block].children[1];
    assert_eq!(arena[site].kind, AstKind::Block);
    let check_assign = arena[site].children[0];
    let reduced = arena[check_assign].children[1];
    assert_eq!(arena[reduced].kind, AstKind::ReduceBool);
    let enable_assign = arena[site].children[1];
    assert_eq!(arena[arena[enable_assign].children[1]].integer, 1);

    // a module-level assert(CHECK, EN) cell was added
    let module_asserts: Vec<_> = arena[top]
        .children
        .iter()
        .filter(|&&c| arena[c].kind == AstKind::Assert)
        .collect();
    assert_eq!(module_asserts.len(), 1);
    assert_eq!(arena[*module_asserts[0]].children.len(), 2);

    // with its CHECK/EN wires and the enable-reset initial
    let wire_names = decl_names(&session, &arena, top, AstKind::Wire);
    assert!(wire_names.iter().any(|n| n.ends_with("_CHECK")));
    assert!(wire_names.iter().any(|n| n.ends_with("_EN")));
    assert_eq!(count_kind(&arena, top, AstKind::Initial), 1);
}

#[test]
fn elaboration_is_idempotent() {
    let session = Session::new();
    let mut arena = AstArena::new();
    let data = wire_decl(&session, &mut arena, "data", Some((7, 0)));
    let lhs = ident(&session, &mut arena, "data");
    let rhs = sized_const(&mut arena, 3, 8);
    let cont = assign(&mut arena, AstKind::Assign, lhs, rhs);
    let top = module(&session, &mut arena, "top", vec![data, cont]);

    assert!(elaborate(&session, &mut arena, top).ok);
    let children_after_first = arena[top].children.clone();
    let nodes_after_first = arena.len();

    assert!(elaborate(&session, &mut arena, top).ok);
    assert_eq!(arena[top].children, children_after_first);
    // a second run allocates nothing new
    assert_eq!(arena.len(), nodes_after_first);
}

#[test]
fn display_stop_finish_are_dropped() {
    let session = Session::new();
    let mut arena = AstArena::new();
    let call = arena.node(AstKind::TCall, Span::DUMMY);
    arena[call].name = Some(session.id("$finish"));
    let proc = initial_block(&mut arena, vec![call]);
    let top = module(&session, &mut arena, "top", vec![proc]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok);
    let block = arena[proc].children[0];
    assert!(arena[block].children.is_empty());
}

#[test]
fn real_system_function_folds() {
    // parameter R = $sqrt(2.25);
    let session = Session::new();
    let mut arena = AstArena::new();
    let arg = arena.real_value(2.25, Span::DUMMY);
    let call = arena.with_children(AstKind::FCall, Span::DUMMY, vec![arg]);
    arena[call].name = Some(session.id("$sqrt"));
    let r = param_decl(&session, &mut arena, "R", None, call);
    let top = module(&session, &mut arena, "top", vec![r]);

    let outcome = elaborate(&session, &mut arena, top);
    assert!(outcome.ok, "diagnostics: {:?}", outcome.diagnostics);
    let value = arena[r].children[0];
    assert_eq!(arena[value].kind, AstKind::RealValue);
    assert_eq!(arena[value].real, 1.5);
}
