use std::rc::Rc;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::compiler::ops::BinaryOp;
use crate::compiler::pog::driver::{generate, generate_in_session, CancelToken, PogSession};
use crate::compiler::pog::obligation::{POType, ProofObligationList};
use crate::compiler::srcloc::Srcloc;
use crate::compiler::typedtree::{Definition, Expr, Module, Stmt};
use crate::compiler::types::Type;

use crate::tests::util::{
    assign, assign_at, block, environment, for_loop, int, loc, module, nat, natop, operation,
    opts, run_module, var,
};

fn divide_by(name: &str) -> Rc<Expr> {
    natop(BinaryOp::Div, int(100), nat(name))
}

fn two_operations() -> Vec<Rc<Definition>> {
    vec![
        operation(
            "first",
            Type::Void,
            block(vec![
                assign("x", divide_by("a")),
                assign("y", divide_by("b")),
            ]),
            None,
            None,
            vec![],
        ),
        operation(
            "second",
            Type::Void,
            assign("z", divide_by("c")),
            None,
            None,
            vec![],
        ),
    ]
}

#[test]
fn test_obligations_numbered_in_order() {
    let pos = run_module(two_operations());
    let numbers: Vec<usize> = pos.iter().map(|po| po.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    let names: Vec<String> = pos.iter().map(|po| po.name.clone()).collect();
    assert_eq!(
        names,
        vec!["first".to_string(), "first".to_string(), "second".to_string()]
    );
    assert!(pos.iter().all(|po| po.kind == POType::NonZero));
}

#[test]
fn test_display_of_list() {
    let pos = run_module(vec![two_operations()[1].clone()]);
    assert_eq!(
        pos.to_string(),
        "Proof Obligation 1: (Unproved)\nsecond: non-zero obligation @ test.vdm(1):1\nc <> 0\n\n"
    );
}

#[test]
fn test_cancelled_run_is_incomplete() {
    let m = module(two_operations());
    let (env, _) = environment(&m);
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = generate(opts(), &env, &m, &cancel).expect("generates");
    assert!(!result.complete);
    assert!(result.obligations.is_empty());

    let result = generate(opts(), &env, &m, &CancelToken::new()).expect("generates");
    assert!(result.complete);
    assert_eq!(result.obligations.len(), 3);
}

#[test]
fn test_cancel_token_is_shared() {
    let cancel = CancelToken::new();
    let copy = cancel.clone();
    assert!(!copy.is_cancelled());
    cancel.cancel();
    assert!(copy.is_cancelled());
}

#[test]
fn test_one_run_per_session() {
    let session = PogSession::new();
    let start = Srcloc::start("test.vdm");
    {
        let _ticket = session.begin(&start).expect("free");
        assert!(session.is_running());
        assert!(session.begin(&start).is_err());

        let m = module(two_operations());
        let (env, _) = environment(&m);
        let busy = generate_in_session(&session, opts(), &env, &m, &CancelToken::new());
        assert!(busy.is_err());
    }
    assert!(!session.is_running());

    let m = module(two_operations());
    let (env, _) = environment(&m);
    let result = generate_in_session(&session, opts(), &env, &m, &CancelToken::new())
        .expect("generates");
    assert_eq!(result.obligations.len(), 3);
    assert!(!session.is_running());
}

#[test]
fn test_structured_value_matches_text() {
    let pos = run_module(two_operations());
    for po in pos.iter() {
        assert_eq!(po.value.to_string(), po.formula);
    }
}

#[test]
fn test_select_by_number_and_name() {
    let pos = run_module(two_operations());
    assert_eq!(pos.select(&[], &[]).expect("selects").len(), 3);

    let picked = pos.select(&[2], &[]).expect("selects");
    assert_eq!(picked.len(), 1);
    assert_eq!(picked.get(0).map(|po| po.number), Some(2));

    let picked = pos.select(&[], &["sec.*".to_string()]).expect("selects");
    assert_eq!(picked.len(), 1);
    assert_eq!(picked.get(0).map(|po| po.name.clone()), Some("second".to_string()));

    // Patterns match whole names.
    assert!(pos.select(&[], &["sec".to_string()]).expect("selects").is_empty());

    let picked = pos.select(&[3], &["first".to_string()]).expect("selects");
    assert_eq!(picked.len(), 3);
}

#[test]
fn test_select_bad_pattern() {
    let pos = run_module(two_operations());
    let err = pos.select(&[], &["(".to_string()]).err().expect("fails");
    assert!(err.1.starts_with("bad name pattern ("));
}

#[test]
fn test_json_shape() {
    let pos = run_module(vec![two_operations()[1].clone()]);
    let json = pos.to_json();
    assert_eq!(
        json,
        json!([{
            "id": 1,
            "kind": "non-zero",
            "name": "second",
            "location": { "file": "test.vdm", "line": 1, "col": 1 },
            "source": "c <> 0",
            "message": null
        }])
    );
}

#[test]
fn test_messages_in_json() {
    let pos = run_module(vec![operation(
        "looping",
        Type::Void,
        for_loop(2, "i", 1, 3, Some(natop(BinaryOp::Greater, nat("i"), int(0))), assign("x", int(1))),
        None,
        None,
        vec![],
    )]);
    let json = pos.to_json();
    assert_eq!(json[0]["message"], json!("check initial for-loop"));
    assert_eq!(json[2]["message"], json!("check after for-loop"));
}

const VARS: &[&str] = &["a", "b", "c"];

fn random_expr(rng: &mut ChaCha8Rng, depth: usize) -> Rc<Expr> {
    if depth == 0 || rng.gen_range(0..4) == 0 {
        return if rng.gen() {
            int(rng.gen_range(0..3))
        } else {
            nat(VARS[rng.gen_range(0..VARS.len())])
        };
    }
    let ops = [
        BinaryOp::Plus,
        BinaryOp::Times,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Minus,
    ];
    let op = ops[rng.gen_range(0..ops.len())];
    natop(op, random_expr(rng, depth - 1), random_expr(rng, depth - 1))
}

fn random_stmt(rng: &mut ChaCha8Rng, depth: usize, line: usize) -> Rc<Stmt> {
    let target = VARS[rng.gen_range(0..VARS.len())];
    let choice = if depth == 0 { 0 } else { rng.gen_range(0..4) };
    match choice {
        1 => Rc::new(Stmt::If(
            loc(line, 3),
            var("p", Type::Bool),
            random_stmt(rng, depth - 1, line + 1),
            vec![],
            Some(random_stmt(rng, depth - 1, line + 2)),
        )),
        2 => for_loop(
            line,
            "i",
            1,
            rng.gen_range(1..5),
            None,
            random_stmt(rng, depth - 1, line + 1),
        ),
        3 => block(
            (0..rng.gen_range(1..4))
                .map(|i| random_stmt(rng, depth - 1, line + i))
                .collect(),
        ),
        _ => assign_at(line, target, Type::Nat, random_expr(rng, 3), Type::Nat),
    }
}

fn random_module(rng: &mut ChaCha8Rng) -> Module {
    let definitions = (0..3)
        .map(|i| {
            operation(
                &format!("op{}", i),
                Type::Void,
                random_stmt(rng, 2, 1),
                None,
                None,
                vec![],
            )
        })
        .collect();
    module(definitions)
}

fn generate_all(m: &Module) -> ProofObligationList {
    let (env, _) = environment(m);
    let limited = opts().set_max_alternatives(100_000);
    generate(limited, &env, m, &CancelToken::new())
        .expect("generates")
        .obligations
}

#[test]
fn test_generation_is_deterministic() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x706f67);
    for _ in 0..10 {
        let m = random_module(&mut rng);
        let first = generate_all(&m);
        let second = generate_all(&m);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.formula, b.formula);
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.free_variables, b.free_variables);
            assert_eq!(a.value.to_string(), a.formula);
        }
        for (i, po) in first.iter().enumerate() {
            assert_eq!(po.number, i + 1);
        }
    }
}
