use std::rc::Rc;

use crate::compiler::ops::BinaryOp;
use crate::compiler::pog::obligation::POType;
use crate::compiler::typedtree::{
    Definition, Expr, ImplicitFunctionData, Pattern, TypeDefData, ValueData,
};
use crate::compiler::types::Type;

use crate::tests::util::{boolean, formulas, function, int, loc, nat, natop, run_module, var};

/// g(n: nat) r: nat, with an optional body and precondition.
fn implicit(body: Option<Rc<Expr>>, pre: Option<Rc<Expr>>) -> Rc<Definition> {
    Rc::new(Definition::ImplicitFunction(ImplicitFunctionData {
        loc: loc(1, 1),
        name: "g".to_string(),
        type_params: vec![],
        params: vec![(Pattern::identifier(&loc(1, 3), "n"), Type::Nat)],
        result: ("r".to_string(), Type::Nat),
        body,
        pre,
        post: natop(BinaryOp::Greater, nat("r"), nat("n")),
        measure: None,
    }))
}

#[test]
fn test_implicit_function_must_be_satisfiable() {
    let pos = run_module(vec![implicit(None, None)]);
    assert_eq!(pos.len(), 1);
    let po = pos.get(0).expect("one obligation");
    assert_eq!(po.kind, POType::FuncSatisfiability);
    assert_eq!(po.name, "g");
    assert_eq!(
        po.formula,
        indoc! {"
            forall n : nat &
              exists r : nat &
                r > n"}
    );
}

#[test]
fn test_satisfiability_assumes_precondition() {
    let pre = natop(BinaryOp::Greater, nat("n"), int(0));
    assert_eq!(
        formulas(&run_module(vec![implicit(None, Some(pre))])),
        vec![indoc! {"
            forall n : nat &
              n > 0 =>
                exists r : nat &
                  r > n"}
        .to_string()]
    );
}

#[test]
fn test_implicit_body_meets_postcondition() {
    let body = natop(BinaryOp::Plus, nat("n"), int(1));
    let pos = run_module(vec![implicit(Some(body), None)]);
    assert_eq!(pos.of_kind(POType::FuncPostCondition).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec![indoc! {"
            forall n : nat &
              let r = n + 1 in
                r > n"}
        .to_string()]
    );
}

#[test]
fn test_explicit_postcondition_applies_to_body() {
    let mut f = function("f", &["n"], Type::Nat, natop(BinaryOp::Plus, nat("n"), int(1)), Type::Nat);
    f.post = Some(boolean(true));
    let pos = run_module(vec![Rc::new(Definition::ExplicitFunction(f))]);
    assert_eq!(pos.of_kind(POType::FuncPostCondition).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec!["forall n : nat &\n  post_f(n, n + 1)".to_string()]
    );
}

fn head_function(pre: Option<Rc<Expr>>) -> Rc<Definition> {
    // f([a]) == a
    let seq = Type::seq_of(Type::Nat);
    let mut f = function("f", &[], Type::Nat, nat("a"), Type::Nat);
    f.fn_type = Type::total_function(vec![seq], Type::Nat);
    f.params = vec![Pattern::SeqEnum(
        loc(1, 3),
        vec![Pattern::identifier(&loc(1, 4), "a")],
    )];
    f.pre = pre;
    Rc::new(Definition::ExplicitFunction(f))
}

#[test]
fn test_refutable_parameter_pattern() {
    let pos = run_module(vec![head_function(None)]);
    assert_eq!(pos.of_kind(POType::ParameterPatterns).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec![indoc! {"
            forall arg : seq of nat &
              exists [a] : seq of nat &
                [a] = arg"}
        .to_string()]
    );
}

#[test]
fn test_parameter_pattern_under_precondition() {
    let pos = run_module(vec![head_function(Some(boolean(true)))]);
    assert_eq!(
        formulas(&pos),
        vec!["forall arg : seq of nat &\n  pre_f(arg) => (exists [a] : seq of nat & [a] = arg)".to_string()]
    );
}

#[test]
fn test_identifier_parameters_always_match() {
    let f = function("f", &["n"], Type::Nat, nat("n"), Type::Nat);
    assert!(run_module(vec![Rc::new(Definition::ExplicitFunction(f))]).is_empty());
}

#[test]
fn test_type_invariant_must_be_satisfiable() {
    // Pos = nat inv t == 10 div t > 0
    let inv = natop(
        BinaryOp::Greater,
        natop(BinaryOp::Div, int(10), nat("t")),
        int(0),
    );
    let pos_type = Rc::new(Definition::Type(TypeDefData {
        loc: loc(1, 1),
        name: "Pos".to_string(),
        ty: Type::Nat,
        invariant: Some((Pattern::identifier(&loc(1, 15), "t"), inv)),
    }));
    let pos = run_module(vec![pos_type]);
    let kinds: Vec<POType> = pos.iter().map(|po| po.kind).collect();
    assert_eq!(kinds, vec![POType::TypeInvSatisfiability, POType::NonZero]);
    assert_eq!(
        formulas(&pos),
        vec![
            "exists t : nat &\n  10 div t > 0".to_string(),
            "forall t : nat &\n  t <> 0".to_string(),
        ]
    );
}

fn value(pattern: Pattern) -> Rc<Definition> {
    let seq = Type::seq_of(Type::Nat);
    Rc::new(Definition::Value(ValueData {
        loc: loc(1, 1),
        pattern,
        ty: None,
        value: var("s", seq.clone()),
        value_type: seq,
    }))
}

#[test]
fn test_value_pattern_must_match() {
    let pair = Pattern::SeqEnum(
        loc(1, 1),
        vec![
            Pattern::identifier(&loc(1, 2), "a"),
            Pattern::identifier(&loc(1, 5), "b"),
        ],
    );
    let pos = run_module(vec![value(pair)]);
    assert_eq!(pos.of_kind(POType::ValueBinding).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec!["exists [a, b] : seq of nat &\n  [a, b] = s".to_string()]
    );

    assert!(run_module(vec![value(Pattern::identifier(&loc(1, 1), "v"))]).is_empty());
}
