use arch::{Location, OpCode, Operand, Type, Value};
use cc::{
    ast::{build::*, BinaryOp, Expr, Root, Stmt, UnaryOp},
    Compiler, Error, ErrorKind,
};
use emu::{Console, Program, RuntimeError};
use std::{cell::RefCell, rc::Rc};

const TMAX: u64 = 100_000;

fn build(statements: Vec<Stmt>) -> Result<Program, Error> {
    Compiler::new().with_builtins().compile(&root(statements))
}

fn main_fn(body: Vec<Stmt>) -> Stmt {
    func("main", vec![], Type::Void, body)
}

fn run(program: &mut Program) -> Result<(), RuntimeError> {
    while program.has_next_statement() && program.steps() < TMAX {
        program.execute_next()?;
    }
    assert!(!program.has_next_statement(), "did not halt");
    Ok(())
}

/// Everything `print` / `println` wrote.
fn output(statements: Vec<Stmt>) -> String {
    let mut program = build(statements).unwrap();
    let console = Console::quiet();
    let out = console.transcript();
    console.install(&mut program);
    run(&mut program).unwrap();
    let text = out.borrow().clone();
    text
}

fn compile_error(statements: Vec<Stmt>) -> (ErrorKind, Location) {
    match build(statements) {
        Err(Error::Compiler(e)) => (e.kind, e.location),
        Err(e) => panic!("internal error: {}", e),
        Ok(_) => panic!("compiled"),
    }
}

fn println(args: Vec<Expr>) -> Stmt {
    expr(call("println", args))
}

fn int(name: &str, value: i64) -> Stmt {
    var(Type::Int, name, Some(lit(value)))
}

macro_rules! case {
    ($name:ident, [$($stmt:expr),* $(,)?] => $expect:expr) => {
        #[test]
        fn $name() {
            assert_eq!(output(vec![$($stmt),*]), $expect);
        }
    };
}

macro_rules! error {
    ($name:ident, [$($stmt:expr),* $(,)?] => $kind:expr, $at:expr) => {
        #[test]
        fn $name() {
            let (kind, at) = compile_error(vec![$($stmt),*]);
            assert_eq!(kind, $kind);
            assert_eq!(at, Location::new($at.0, $at.1));
        }
    };
}

case!(
    add_locals,
    [main_fn(vec![
        int("x", 2),
        int("y", 3),
        expr(assign(ident("x"), binary(BinaryOp::Add, ident("x"), ident("y")))),
        println(vec![ident("x"), ident("y")]),
    ])] => "5 3\n"
);

case!(
    modulo_truncates_toward_zero,
    [main_fn(vec![println(vec![binary(BinaryOp::Mod, unary(UnaryOp::Neg, lit(7_i64)), lit(3_i64))])])] => "-1\n"
);

case!(
    comparisons,
    [main_fn(vec![println(vec![
        binary(BinaryOp::Lt, lit(1_i64), lit(2_i64)),
        binary(BinaryOp::Le, lit(2_i64), lit(2_i64)),
        binary(BinaryOp::Gt, lit(3_i64), lit(4_i64)),
        binary(BinaryOp::Ge, lit(3_i64), lit(4_i64)),
        binary(BinaryOp::Eq, lit(1_i64), lit(1_i64)),
        binary(BinaryOp::Ne, lit(1_i64), lit(1_i64)),
    ])])] => "true true false false true false\n"
);

case!(
    logical_operators,
    [main_fn(vec![println(vec![
        binary(BinaryOp::And, lit(true), lit(false)),
        binary(BinaryOp::Or, lit(false), lit(true)),
        binary(BinaryOp::Or, lit(0_i64), lit(0_i64)),
        unary(UnaryOp::Not, lit(0_i64)),
    ])])] => "false true false true\n"
);

case!(
    short_circuit_skips_right_side,
    [
        int("calls", 0),
        func("bump", vec![], Type::Boolean, vec![
            expr(assign(ident("calls"), binary(BinaryOp::Add, ident("calls"), lit(1_i64)))),
            ret(Some(lit(true))),
        ]),
        main_fn(vec![
            var(Type::Boolean, "a", Some(binary(BinaryOp::And, lit(false), call("bump", vec![])))),
            var(Type::Boolean, "b", Some(binary(BinaryOp::Or, lit(true), call("bump", vec![])))),
            var(Type::Boolean, "c", Some(binary(BinaryOp::Or, lit(false), call("bump", vec![])))),
            println(vec![ident("a"), ident("b"), ident("c"), ident("calls")]),
        ]),
    ] => "false true true 1\n"
);

case!(
    string_concatenation,
    [main_fn(vec![
        var(Type::String, "s", Some(binary(BinaryOp::Add, lit("a"), lit(1_i64)))),
        println(vec![binary(BinaryOp::Add, ident("s"), lit("b"))]),
    ])] => "a1b\n"
);

case!(
    if_else_branches,
    [main_fn(vec![
        int("x", 5),
        if_else(
            binary(BinaryOp::Gt, ident("x"), lit(3_i64)),
            println(vec![lit("big")]),
            Some(println(vec![lit("small")])),
        ),
        if_else(binary(BinaryOp::Lt, ident("x"), lit(3_i64)), println(vec![lit("never")]), None),
    ])] => "big\n"
);

case!(
    while_loop_sums,
    [main_fn(vec![
        int("i", 0),
        int("s", 0),
        while_loop(
            binary(BinaryOp::Lt, ident("i"), lit(5_i64)),
            block(vec![
                expr(assign(ident("s"), binary(BinaryOp::Add, ident("s"), ident("i")))),
                expr(postfix(UnaryOp::Inc, ident("i"))),
            ]),
        ),
        println(vec![ident("s")]),
    ])] => "10\n"
);

case!(
    for_with_break_and_continue,
    [main_fn(vec![
        int("s", 0),
        for_loop(
            Some(int("i", 0)),
            Some(binary(BinaryOp::Lt, ident("i"), lit(10_i64))),
            Some(postfix(UnaryOp::Inc, ident("i"))),
            block(vec![
                if_else(binary(BinaryOp::Eq, binary(BinaryOp::Mod, ident("i"), lit(2_i64)), lit(0_i64)), cont(), None),
                if_else(binary(BinaryOp::Gt, ident("i"), lit(7_i64)), brk(), None),
                expr(assign(ident("s"), binary(BinaryOp::Add, ident("s"), ident("i")))),
            ]),
        ),
        println(vec![ident("s")]),
    ])] => "16\n"
);

case!(
    do_while_runs_once,
    [main_fn(vec![
        int("i", 10),
        do_while(expr(unary(UnaryOp::Inc, ident("i"))), binary(BinaryOp::Lt, ident("i"), lit(3_i64))),
        println(vec![ident("i")]),
    ])] => "11\n"
);

case!(
    recursive_factorial,
    [
        func("fact", vec![param(Type::Int, "n")], Type::Int, vec![
            if_else(binary(BinaryOp::Le, ident("n"), lit(1_i64)), ret(Some(lit(1_i64))), None),
            ret(Some(binary(
                BinaryOp::Mul,
                ident("n"),
                call("fact", vec![binary(BinaryOp::Sub, ident("n"), lit(1_i64))]),
            ))),
        ]),
        main_fn(vec![println(vec![call("fact", vec![lit(5_i64)])])]),
    ] => "120\n"
);

case!(
    call_before_definition,
    [
        main_fn(vec![expr(call("show", vec![lit(1_i64), lit("x")]))]),
        func("show", vec![param(Type::Int, "a"), param(Type::String, "b")], Type::Void, vec![
            println(vec![ident("a"), ident("b")]),
        ]),
    ] => "1 x\n"
);

case!(
    literal_arguments_are_converted,
    [
        func("half", vec![param(Type::Double, "v")], Type::Double, vec![
            ret(Some(binary(BinaryOp::Div, ident("v"), lit(2_i64)))),
        ]),
        main_fn(vec![println(vec![call("half", vec![lit(3_i64)])])]),
    ] => "1.5\n"
);

case!(
    arguments_take_parameter_type,
    [
        func("half", vec![param(Type::Double, "v")], Type::Double, vec![
            ret(Some(binary(BinaryOp::Div, ident("v"), lit(2_i64)))),
        ]),
        func("whole", vec![], Type::Int, vec![var(Type::Double, "d", Some(lit(2.75_f64))), ret(Some(ident("d")))]),
        main_fn(vec![
            int("n", 3),
            println(vec![call("half", vec![ident("n")]), call("half", vec![call("whole", vec![])])]),
        ]),
    ] => "1.5 1\n"
);

case!(
    local_arrays,
    [main_fn(vec![
        array(Type::Int, "a", 3),
        expr(assign(member("a", lit(0_i64)), lit(1_i64))),
        expr(assign(member("a", lit(1_i64)), binary(BinaryOp::Add, member("a", lit(0_i64)), lit(1_i64)))),
        expr(assign(member("a", lit(2_i64)), binary(BinaryOp::Mul, member("a", lit(1_i64)), lit(3_i64)))),
        expr(postfix(UnaryOp::Inc, member("a", lit(0_i64)))),
        println(vec![member("a", lit(0_i64)), member("a", lit(1_i64)), member("a", lit(2_i64))]),
    ])] => "2 2 6\n"
);

case!(
    global_variables,
    [
        var(Type::Int, "g", Some(binary(BinaryOp::Mul, lit(2_i64), lit(3_i64)))),
        array(Type::Int, "arr", 2),
        main_fn(vec![
            expr(assign(member("arr", lit(1_i64)), ident("g"))),
            println(vec![binary(BinaryOp::Add, member("arr", lit(1_i64)), ident("g"))]),
        ]),
    ] => "12\n"
);

case!(
    increment_forms,
    [main_fn(vec![
        int("i", 1),
        var(Type::Int, "a", Some(postfix(UnaryOp::Inc, ident("i")))),
        var(Type::Int, "b", Some(unary(UnaryOp::Inc, ident("i")))),
        expr(postfix(UnaryOp::Dec, ident("b"))),
        println(vec![ident("a"), ident("b"), ident("i")]),
    ])] => "1 2 3\n"
);

case!(
    double_division,
    [main_fn(vec![
        var(Type::Double, "d", Some(lit(1_i64))),
        expr(assign(ident("d"), binary(BinaryOp::Div, ident("d"), lit(2_i64)))),
        println(vec![ident("d")]),
    ])] => "0.5\n"
);

case!(
    store_keeps_int_slot,
    [main_fn(vec![
        int("x", 0),
        expr(assign(ident("x"), binary(BinaryOp::Div, lit(7_i64), lit(2.0_f64)))),
        println(vec![ident("x")]),
    ])] => "3\n"
);

case!(
    shadowing_in_block,
    [main_fn(vec![
        int("x", 1),
        block(vec![int("x", 2), println(vec![ident("x")])]),
        println(vec![ident("x")]),
    ])] => "2\n1\n"
);

case!(
    nested_declaration_is_reinitialised,
    [main_fn(vec![for_loop(
        Some(int("i", 0)),
        Some(binary(BinaryOp::Lt, ident("i"), lit(3_i64))),
        Some(postfix(UnaryOp::Inc, ident("i"))),
        block(vec![
            var(Type::Int, "t", None),
            expr(assign(ident("t"), binary(BinaryOp::Add, ident("t"), ident("i")))),
            println(vec![ident("t")]),
        ]),
    )])] => "0\n1\n2\n"
);

case!(no_main, [int("g", 1)] => "");

error!(
    redeclaration,
    [main_fn(vec![int("x", 1), var(Type::Int, "x", Some(lit(2_i64)))])] => ErrorKind::AlreadyDeclared("x".into()), (0, 0)
);
error!(
    undeclared,
    [main_fn(vec![expr(assign(ident("x"), ident("y").at(2, 9)))])] => ErrorKind::NotDeclared("x".into()), (0, 0)
);
error!(
    undeclared_right_side,
    [main_fn(vec![int("x", 0), expr(assign(ident("x"), ident("y").at(2, 9)))])] => ErrorKind::NotDeclared("y".into()), (2, 9)
);
error!(
    statement_at_top_level,
    [expr(call("println", vec![])).at(1, 1)] => ErrorKind::IllegalTopLevel, (1, 1)
);
error!(
    call_in_global_initializer,
    [
        func("f", vec![], Type::Int, vec![ret(Some(lit(1_i64)))]),
        var(Type::Int, "g", Some(call("f", vec![]).at(3, 9))),
    ] => ErrorKind::CallInGlobalInitializer, (3, 9)
);
error!(
    assign_to_literal,
    [main_fn(vec![expr(assign(lit(1_i64).at(2, 3), lit(2_i64)))])] => ErrorKind::IllegalAssignmentTarget, (2, 3)
);
error!(
    assign_to_nested_element,
    [main_fn(vec![
        array(Type::Int, "a", 4),
        expr(assign(
            Expr::MemberExpression {
                base: Box::new(member("a", lit(0_i64))),
                index: Box::new(lit(1_i64)),
                loc: Location::default(),
            }
            .at(3, 5),
            lit(2_i64),
        )),
    ])] => ErrorKind::IllegalAssignmentTarget, (3, 5)
);
error!(
    increment_nested_element,
    [main_fn(vec![
        array(Type::Int, "a", 4),
        expr(postfix(
            UnaryOp::Inc,
            Expr::MemberExpression {
                base: Box::new(member("a", ident("i"))),
                index: Box::new(lit(1_i64)),
                loc: Location::default(),
            }
            .at(4, 1),
        )),
    ])] => ErrorKind::IllegalAssignmentTarget, (4, 1)
);
error!(
    break_outside_loop,
    [main_fn(vec![brk().at(5, 1)])] => ErrorKind::BreakOutsideLoop, (5, 1)
);
error!(
    continue_outside_loop,
    [main_fn(vec![if_else(lit(true), cont().at(6, 4), None)])] => ErrorKind::ContinueOutsideLoop, (6, 4)
);
error!(
    string_into_int,
    [main_fn(vec![var(Type::Int, "x", Some(lit("s").at(1, 9)))])] => ErrorKind::TypeMismatch { expected: Type::Int, found: Type::String }, (1, 9)
);
error!(
    argument_count,
    [
        func("f", vec![param(Type::Int, "a")], Type::Void, vec![]),
        main_fn(vec![expr(call("f", vec![]).at(4, 2))]),
    ] => ErrorKind::ArgumentCount { name: "f".into(), expected: 1, found: 0 }, (4, 2)
);
error!(
    void_in_expression,
    [main_fn(vec![var(Type::Int, "x", Some(call("println", vec![]).at(2, 11)))])] => ErrorKind::VoidValue("println".into()), (2, 11)
);
error!(
    return_without_value,
    [func("f", vec![], Type::Int, vec![ret(None).at(3, 5)])] => ErrorKind::MissingReturnValue("f".into()), (3, 5)
);
error!(
    subtract_from_string,
    [main_fn(vec![println(vec![binary(BinaryOp::Sub, lit("a"), lit(1_i64)).at(2, 13)])])] => ErrorKind::InvalidOperand { op: "-".into(), ty: Type::String }, (2, 13)
);
error!(
    main_with_parameters,
    [func("main", vec![param(Type::Int, "argc")], Type::Void, vec![]).at(1, 1)] => ErrorKind::MainParameters, (1, 1)
);

#[test]
fn compiler_errors_are_not_internal() {
    let Err(err) = build(vec![main_fn(vec![brk()])]) else {
        panic!("compiled");
    };
    assert!(!err.is_internal());
    assert_eq!(err.location(), Some(Location::default()));
}

#[test]
fn locals_visible_while_stepping() {
    let mut program = build(vec![main_fn(vec![
        int("x", 2),
        int("y", 3),
        expr(assign(ident("x"), binary(BinaryOp::Add, ident("x"), ident("y")))),
    ])])
    .unwrap();
    let mut seen = None;
    while program.has_next_statement() {
        let at_ret = program.instructions()[program.pc()].op == OpCode::RET;
        if at_ret && program.function_at(program.pc()) == Some("main") {
            seen = Some(program.locals());
        }
        program.execute_next().unwrap();
    }
    let locals = seen.unwrap();
    assert_eq!(locals.get("x"), Some(&Value::Int(5)));
    assert_eq!(locals.get("y"), Some(&Value::Int(3)));
}

#[test]
fn literal_assignment_is_one_move() {
    let program = build(vec![main_fn(vec![int("x", 0), expr(assign(ident("x"), lit(5_i64)))])]).unwrap();
    let moves: Vec<_> = program
        .instructions()
        .iter()
        .filter(|inst| inst.src == Some(Operand::Imm(Value::Int(5))))
        .collect();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].op, OpCode::MOV);
    assert!(matches!(moves[0].dest, Some(Operand::Ptr(_))));
}

#[test]
fn frame_layout() {
    let image = Compiler::new()
        .compile_image(&root(vec![func(
            "f",
            vec![param(Type::Int, "a"), param(Type::Double, "b"), param(Type::String, "c")],
            Type::Void,
            vec![int("x", 0), array(Type::Int, "buf", 4), int("y", 0)],
        )]))
        .unwrap();
    let frame = &image.symbols.code["f"].frame;
    let offset = |name: &str| frame[name].offset;
    assert_eq!(offset("a"), -1);
    assert_eq!(offset("b"), -2);
    assert_eq!(offset("c"), -3);
    assert_eq!(offset("x"), 1);
    assert_eq!(offset("buf"), 2);
    assert_eq!(offset("y"), 6);
    assert_eq!(frame["buf"].length, Some(4));
}

#[test]
fn program_layout() {
    let program = build(vec![
        func("helper", vec![], Type::Void, vec![]),
        main_fn(vec![expr(call("helper", vec![]))]),
    ])
    .unwrap();
    let insts = program.instructions();
    assert!(insts.iter().flat_map(|inst| inst.operands()).all(|op| !op.is_pending()));

    let main = &program.symbols().code["main"];
    assert_eq!(insts[0].op, OpCode::CALL);
    assert_eq!(insts[0].dest, Some(Operand::Imm(Value::Int(main.addr as i64))));
    assert_eq!(insts[1].op, OpCode::JMP);
    assert_eq!(insts[1].dest, Some(Operand::Imm(Value::Int(insts.len() as i64))));

    // Each function ends with a return
    for entry in program.symbols().code.values() {
        assert_eq!(insts[entry.addr + entry.size - 1].op, OpCode::RET);
    }
}

#[test]
fn globals_are_laid_out_in_order() {
    let program = build(vec![
        int("a", 1),
        array(Type::Double, "b", 2),
        var(Type::String, "c", Some(binary(BinaryOp::Add, lit("n="), ident("a")))),
    ])
    .unwrap();
    assert_eq!(
        program.globals(),
        &[Value::Int(1), Value::Double(0.0), Value::Double(0.0), Value::from("n=1")]
    );
    assert_eq!(program.global("c"), Some(&Value::from("n=1")));
}

#[test]
fn unregistered_extern_is_a_runtime_error() {
    let mut program = Compiler::new()
        .declare_extern("beep", &[Type::Int], Type::Void)
        .compile(&root(vec![main_fn(vec![expr(call("beep", vec![lit(1_i64)]))])]))
        .unwrap();
    let err = loop {
        let pc = program.pc();
        if let Err(e) = program.execute_next() {
            assert_eq!(program.pc(), pc);
            break e;
        }
    };
    assert_eq!(err, RuntimeError::UnregisteredExternal("beep".into()));
    assert_eq!(program.instructions()[program.pc()].op, OpCode::CALL);
}

#[test]
fn extern_receives_arguments_in_order() {
    let mut program = Compiler::new()
        .declare_extern("clamp", &[Type::Int, Type::Int], Type::Int)
        .with_builtins()
        .compile(&root(vec![main_fn(vec![println(vec![call("clamp", vec![lit(9_i64), lit(4_i64)])])])]))
        .unwrap();
    program.register_external_function("clamp", |args| {
        match (args[0].as_int(), args[1].as_int()) {
            (Some(v), Some(max)) => Value::Int(v.min(max)),
            _ => Value::Int(-1),
        }
    });
    let console = Console::quiet();
    let out = console.transcript();
    console.install(&mut program);
    run(&mut program).unwrap();
    assert_eq!(out.borrow().as_str(), "4\n");
}

fn with_host(name: &str, ret: Type, host: fn(&[Value]) -> Value, body: Vec<Stmt>) -> (Program, Rc<RefCell<String>>) {
    let mut program = Compiler::new()
        .declare_extern(name, &[], ret)
        .with_builtins()
        .compile(&root(vec![main_fn(body)]))
        .unwrap();
    program.register_external_function(name, host);
    let console = Console::quiet();
    let out = console.transcript();
    console.install(&mut program);
    (program, out)
}

#[test]
fn extern_result_takes_declared_type() {
    let (mut program, out) = with_host("half", Type::Int, |_| Value::Double(2.5), vec![
        var(Type::Double, "d", Some(call("half", vec![]))),
        println(vec![call("half", vec![]), ident("d")]),
    ]);
    run(&mut program).unwrap();
    assert_eq!(out.borrow().as_str(), "2 2\n");
    assert_eq!(program.global("cast:int"), Some(&Value::Int(2)));
}

#[test]
fn extern_result_of_wrong_kind() {
    let (mut program, out) = with_host("sensor", Type::Int, |_| Value::from("idle"), vec![println(vec![call("sensor", vec![])])]);
    let err = loop {
        let pc = program.pc();
        if let Err(e) = program.execute_next() {
            assert_eq!(program.pc(), pc);
            break e;
        }
    };
    assert!(matches!(err, RuntimeError::Type(_)));
    assert!(!err.is_internal());
    assert_eq!(program.instructions()[program.pc() - 1].op, OpCode::CALL);
    assert_eq!(out.borrow().as_str(), "");
}

#[test]
fn runtime_index_out_of_bounds() {
    let mut program = build(vec![
        array(Type::Int, "a", 2),
        main_fn(vec![int("i", 5), expr(assign(member("a", ident("i")), lit(1_i64)))]),
    ])
    .unwrap();
    let err = run(&mut program).unwrap_err();
    assert!(matches!(err, RuntimeError::OutOfBounds(..)));
    assert!(!err.is_internal());
}

#[test]
fn demo_ast_file() {
    let root = Root::from_yaml(include_str!("../../demos/count.ast.yaml")).unwrap();
    let mut program = Compiler::new().with_builtins().compile(&root).unwrap();
    let console = Console::quiet();
    let out = console.transcript();
    console.install(&mut program);
    run(&mut program).unwrap();
    assert_eq!(out.borrow().as_str(), "total 14\n");
    assert_eq!(program.global("total"), Some(&Value::Int(14)));
}

#[test]
fn ast_survives_yaml() {
    let root = root(vec![main_fn(vec![
        var(Type::Double, "d", Some(lit(1.5_f64))),
        println(vec![unary(UnaryOp::Neg, ident("d")), lit("s"), lit(true)]),
    ])]);
    let text = root.to_yaml().unwrap();
    assert!(text.contains("FunctionDeclaration:"), "{}", text);
    assert_eq!(Root::from_yaml(&text).unwrap(), root);
}

#[test]
fn add_locals_lowering() {
    let program = build(vec![main_fn(vec![
        int("x", 2),
        int("y", 3),
        expr(assign(ident("x"), binary(BinaryOp::Add, ident("x"), ident("y")))),
    ])])
    .unwrap();
    let main = &program.symbols().code["main"];
    let body = &program.instructions()[main.addr..main.addr + main.size];
    use OpCode::*;
    let ops: Vec<OpCode> = body.iter().map(|inst| inst.op).collect();
    assert_eq!(ops, vec![PUSH, PUSH, PUSH, PUSH, POP, POP, ADD, PUSH, POP, MOV, RET]);
    assert_eq!(body[0].dest, Some(Operand::Imm(Value::Int(2))));
    assert_eq!(body[1].dest, Some(Operand::Imm(Value::Int(3))));
    assert_eq!(body[2].dest.as_ref().map(ToString::to_string), Some("EBP+1".to_string()));
    assert_eq!(body[3].dest.as_ref().map(ToString::to_string), Some("EBP+2".to_string()));
    assert_eq!(body[9].dest.as_ref().map(ToString::to_string), Some("EBP+1".to_string()));
    assert_eq!(body[9].src, Some(Operand::Reg(arch::Reg::R0)));
}
