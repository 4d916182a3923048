use std::rc::Rc;

use crate::compiler::ops::{BinaryOp, UnaryOp};
use crate::compiler::pog::obligation::POType;
use crate::compiler::typedtree::{
    ApplyData, Bind, CasesData, Definition, Expr, Literal, LocalDef, Pattern, Quantifier,
};
use crate::compiler::types::Type;

use crate::tests::util::{
    binop, boolean, call, expression_pos, formulas, function, int, loc, maplet_map, nat, natop,
    unop, var,
};

fn nat_map() -> Type {
    Type::map_of(Type::Nat, Type::Nat)
}

#[test]
fn test_map_union_compatible() {
    let e = binop(
        BinaryOp::MapUnion,
        maplet_map(1, 2),
        nat_map(),
        maplet_map(3, 4),
        nat_map(),
    );
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.len(), 1);
    assert_eq!(pos.of_kind(POType::MapCompatible).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec![indoc! {"
            forall ldom in set dom {1 |-> 2}, rdom in set dom {3 |-> 4} &
              ldom = rdom => {1 |-> 2}(ldom) = {3 |-> 4}(rdom)"}
        .to_string()]
    );
}

#[test]
fn test_generated_names_avoid_program_variables() {
    let e = binop(
        BinaryOp::MapUnion,
        var("ldom", nat_map()),
        nat_map(),
        maplet_map(3, 4),
        nat_map(),
    );
    let pos = expression_pos(vec![], &e);
    assert_eq!(
        formulas(&pos),
        vec![indoc! {"
            forall ldom1 in set dom ldom, rdom in set dom {3 |-> 4} &
              ldom1 = rdom => ldom(ldom1) = {3 |-> 4}(rdom)"}
        .to_string()]
    );
    let po = pos.get(0).expect("one obligation");
    assert_eq!(po.free_variables, vec!["ldom1".to_string(), "rdom".to_string()]);
    assert_eq!(po.reasons_about, vec!["ldom".to_string()]);
}

#[test]
fn test_division_by_literal_needs_nothing() {
    let e = natop(BinaryOp::Divide, nat("x"), int(2));
    assert!(expression_pos(vec![], &e).is_empty());
}

#[test]
fn test_division_by_zero_literal_is_checked() {
    let e = natop(BinaryOp::Mod, nat("x"), int(0));
    assert_eq!(formulas(&expression_pos(vec![], &e)), vec!["0 <> 0".to_string()]);
}

#[test]
fn test_conjunction_guards_right_operand() {
    let e = natop(
        BinaryOp::And,
        natop(BinaryOp::NotEquals, nat("y"), int(0)),
        natop(
            BinaryOp::Greater,
            natop(BinaryOp::Divide, int(1), nat("y")),
            int(0),
        ),
    );
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.of_kind(POType::NonZero).len(), 1);
    assert_eq!(formulas(&pos), vec!["y <> 0 =>\n  y <> 0".to_string()]);
    assert_eq!(pos.get(0).map(|po| po.reasons_about.clone()), Some(vec!["y".to_string()]));
}

#[test]
fn test_disjunction_guards_with_negation() {
    let e = natop(
        BinaryOp::Or,
        natop(BinaryOp::Equals, nat("y"), int(0)),
        natop(BinaryOp::Div, nat("x"), nat("y")),
    );
    assert_eq!(
        formulas(&expression_pos(vec![], &e)),
        vec!["not y = 0 =>\n  y <> 0".to_string()]
    );
}

#[test]
fn test_head_of_possibly_empty_sequence() {
    let s = var("s", Type::seq_of(Type::Nat));
    let pos = expression_pos(vec![], &unop(UnaryOp::Hd, s, Type::seq_of(Type::Nat)));
    assert_eq!(pos.of_kind(POType::NonEmptySeq).len(), 1);
    assert_eq!(formulas(&pos), vec!["s <> []".to_string()]);

    let s1_type = Type::Seq1(Rc::new(Type::Nat));
    let s1 = var("s", s1_type.clone());
    assert!(expression_pos(vec![], &unop(UnaryOp::Hd, s1, s1_type)).is_empty());
}

#[test]
fn test_distributed_intersection_of_possibly_empty_set() {
    let ty = Type::set_of(Type::set_of(Type::Nat));
    let ss = var("ss", ty.clone());
    assert_eq!(
        formulas(&expression_pos(vec![], &unop(UnaryOp::Dinter, ss, ty))),
        vec!["ss <> {}".to_string()]
    );
}

#[test]
fn test_map_and_sequence_application() {
    let m = Rc::new(Expr::Apply(ApplyData {
        loc: loc(2, 3),
        root: var("m", nat_map()),
        args: vec![nat("k")],
        root_type: nat_map(),
        arg_types: vec![Type::Nat],
        cycles: vec![],
    }));
    let pos = expression_pos(vec![], &m);
    assert_eq!(pos.of_kind(POType::MapApply).len(), 1);
    assert_eq!(formulas(&pos), vec!["k in set dom m".to_string()]);
    assert_eq!(pos.get(0).map(|po| po.location.clone()), Some(loc(2, 3)));

    let seq = Type::seq_of(Type::Nat);
    let s = call("s", seq, vec![int(3)], vec![Type::Nat]);
    assert_eq!(
        formulas(&expression_pos(vec![], &s)),
        vec!["3 in set inds s".to_string()]
    );
}

#[test]
fn test_function_precondition_on_application() {
    let mut f = function("f", &["a"], Type::Nat, nat("a"), Type::Nat);
    f.pre = Some(natop(BinaryOp::Greater, nat("a"), int(0)));
    let fn_type = f.fn_type.clone();
    let defs = vec![Rc::new(Definition::ExplicitFunction(f))];

    let e = call("f", fn_type, vec![nat("x")], vec![Type::Nat]);
    let pos = expression_pos(defs, &e);
    assert_eq!(pos.of_kind(POType::FuncApply).len(), 1);
    assert_eq!(formulas(&pos), vec!["pre_f(x)".to_string()]);
}

#[test]
fn test_unknown_partial_function_uses_pre_operator() {
    let g_type = Type::partial_function(vec![Type::Nat], Type::Nat);
    let e = call("g", g_type, vec![int(1)], vec![Type::Nat]);
    assert_eq!(
        formulas(&expression_pos(vec![], &e)),
        vec!["pre_(g, 1)".to_string()]
    );
}

#[test]
fn test_argument_subtype() {
    let f = function("f", &["a"], Type::Nat, nat("a"), Type::Nat);
    let fn_type = f.fn_type.clone();
    let defs = vec![Rc::new(Definition::ExplicitFunction(f))];
    let e = call("f", fn_type, vec![var("i", Type::Int)], vec![Type::Int]);
    let pos = expression_pos(defs, &e);
    assert_eq!(pos.of_kind(POType::Subtype).len(), 1);
    assert_eq!(formulas(&pos), vec!["i >= 0".to_string()]);
}

#[test]
fn test_let_definition_subtype() {
    let e = Rc::new(Expr::Let(
        loc(1, 1),
        vec![LocalDef {
            loc: loc(1, 5),
            pattern: Pattern::identifier(&loc(1, 5), "x"),
            ty: Type::Nat1,
            value: nat("y"),
            value_type: Type::Nat,
        }],
        natop(BinaryOp::Div, int(10), nat("x")),
    ));
    let pos = expression_pos(vec![], &e);
    assert_eq!(
        formulas(&pos),
        vec!["y > 0".to_string(), "let x = y in\n  x <> 0".to_string()]
    );
}

#[test]
fn test_if_expression_arms_see_their_guards() {
    let e = Rc::new(Expr::If(
        loc(1, 1),
        var("b", Type::Bool),
        int(1),
        vec![(var("c", Type::Bool), natop(BinaryOp::Div, int(1), nat("x")))],
        natop(BinaryOp::Div, int(1), nat("y")),
    ));
    assert_eq!(
        formulas(&expression_pos(vec![], &e)),
        vec![
            "not b and c =>\n  x <> 0".to_string(),
            "not b and not c =>\n  y <> 0".to_string(),
        ]
    );
}

#[test]
fn test_quantifier_body_is_bound() {
    let s = var("s", Type::set_of(Type::Nat));
    let e = Rc::new(Expr::Quantified(
        loc(1, 1),
        Quantifier::Forall,
        vec![Bind::Set(Pattern::identifier(&loc(1, 8), "x"), s)],
        natop(
            BinaryOp::Greater,
            natop(BinaryOp::Divide, int(1), nat("x")),
            int(0),
        ),
    ));
    assert_eq!(
        formulas(&expression_pos(vec![], &e)),
        vec!["forall x in set s &\n  x <> 0".to_string()]
    );
}

#[test]
fn test_let_be_needs_a_witness() {
    let s = var("s", Type::set_of(Type::Nat));
    let e = Rc::new(Expr::LetBe(
        loc(1, 1),
        Bind::Set(Pattern::identifier(&loc(1, 8), "x"), s),
        Some(natop(BinaryOp::Greater, nat("x"), int(2))),
        nat("x"),
    ));
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.of_kind(POType::LetBeExists).len(), 1);
    assert_eq!(formulas(&pos), vec!["exists x in set s &\n  x > 2".to_string()]);
}

#[test]
fn test_nested_bool_literal_is_plain() {
    assert!(expression_pos(vec![], &boolean(true)).is_empty());
}

fn iterate(left: Rc<Expr>, ltype: Type) -> Rc<Expr> {
    binop(BinaryOp::StarStar, left, ltype, nat("k"), Type::Nat)
}

#[test]
fn test_map_iteration_needs_closed_map() {
    let pos = expression_pos(vec![], &iterate(var("m", nat_map()), nat_map()));
    assert_eq!(pos.of_kind(POType::MapIteration).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec!["k = 0 or k = 1 or rng m subset dom m".to_string()]
    );
}

#[test]
fn test_partial_function_iteration() {
    let h_type = Type::partial_function(vec![Type::Nat], Type::Nat);
    let pos = expression_pos(vec![], &iterate(var("h", h_type.clone()), h_type));
    assert_eq!(pos.of_kind(POType::FuncIteration).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec!["k > 1 => (forall arg : nat & pre_(h, arg) => pre_(h, h(arg)))".to_string()]
    );
}

#[test]
fn test_named_function_iteration_uses_precondition() {
    let mut f = function("f", &["a"], Type::Nat, nat("a"), Type::Nat);
    f.pre = Some(natop(BinaryOp::Greater, nat("a"), int(0)));
    let fn_type = f.fn_type.clone();
    let defs = vec![Rc::new(Definition::ExplicitFunction(f))];
    assert_eq!(
        formulas(&expression_pos(defs, &iterate(var("f", fn_type.clone()), fn_type))),
        vec!["k > 1 => (forall arg : nat & pre_f(arg) => pre_f(f(arg)))".to_string()]
    );

    let total = function("t", &["a"], Type::Nat, nat("a"), Type::Nat);
    let t_type = total.fn_type.clone();
    let defs = vec![Rc::new(Definition::ExplicitFunction(total))];
    assert!(expression_pos(defs, &iterate(var("t", t_type.clone()), t_type)).is_empty());
}

#[test]
fn test_iteration_of_function_or_map_checks_both() {
    let either = Type::Union(vec![
        nat_map(),
        Type::partial_function(vec![Type::Nat], Type::Nat),
    ]);
    let pos = expression_pos(vec![], &iterate(var("u", either.clone()), either));
    let kinds: Vec<POType> = pos.iter().map(|po| po.kind).collect();
    assert_eq!(kinds, vec![POType::FuncIteration, POType::MapIteration]);
}

#[test]
fn test_merge_needs_compatible_maps() {
    let maps = Type::set_of(nat_map());
    let e = unop(UnaryOp::Merge, var("ms", maps.clone()), maps);
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.of_kind(POType::MapSetOfCompatible).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec![indoc! {"
            forall m1 in set ms, m2 in set ms &
              forall d1 in set dom m1, d2 in set dom m2 &
                d1 = d2 => m1(d1) = m2(d2)"}
        .to_string()]
    );
}

#[test]
fn test_map_comprehension_maplets_are_compatible() {
    let s = var("s", Type::set_of(Type::Nat));
    let e = Rc::new(Expr::MapComp(
        loc(1, 1),
        nat("x"),
        int(1),
        vec![Bind::Set(Pattern::identifier(&loc(1, 12), "x"), s)],
        None,
    ));
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.of_kind(POType::MapSetOfCompatible).len(), 1);
    assert_eq!(
        formulas(&pos),
        vec![indoc! {"
            forall m1 in set {{x |-> 1} | x in set s}, m2 in set {{x |-> 1} | x in set s} &
              forall d1 in set dom m1, d2 in set dom m2 &
                d1 = d2 => m1(d1) = m2(d2)"}
        .to_string()]
    );
}

#[test]
fn test_map_composition_range_within_domain() {
    let e = binop(BinaryOp::Comp, var("f", nat_map()), nat_map(), var("g", nat_map()), nat_map());
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.of_kind(POType::MapCompose).len(), 1);
    assert_eq!(formulas(&pos), vec!["rng g subset dom f".to_string()]);
}

#[test]
fn test_map_inverse_needs_injective_map() {
    let e = unop(UnaryOp::Inverse, var("m", nat_map()), nat_map());
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.of_kind(POType::MapInverse).len(), 1);
    assert_eq!(formulas(&pos), vec!["is_(m, inmap nat to nat)".to_string()]);
}

#[test]
fn test_sequence_modification_within_indices() {
    let seq = Type::seq_of(Type::Nat);
    let e = binop(BinaryOp::PlusPlus, var("s", seq.clone()), seq, var("m", nat_map()), nat_map());
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.of_kind(POType::SeqModification).len(), 1);
    assert_eq!(formulas(&pos), vec!["dom m subset inds s".to_string()]);
}

#[test]
fn test_let_pattern_must_match_value() {
    let seq = Type::seq_of(Type::Nat);
    let pattern = Pattern::SeqEnum(loc(1, 5), vec![Pattern::identifier(&loc(1, 6), "a")]);
    let e = Rc::new(Expr::Let(
        loc(1, 1),
        vec![LocalDef {
            loc: loc(1, 5),
            pattern,
            ty: seq.clone(),
            value: var("s", seq.clone()),
            value_type: seq,
        }],
        nat("a"),
    ));
    let pos = expression_pos(vec![], &e);
    assert_eq!(pos.of_kind(POType::ValueBinding).len(), 1);
    assert_eq!(formulas(&pos), vec!["exists [a] : seq of nat &\n  [a] = s".to_string()]);
}

#[test]
fn test_cases_expression_arms_exclude_earlier_matches() {
    let literal = |n: i64| Pattern::Literal(loc(1, 1), Literal::Int(n.into()));
    let divide = |d: &str| natop(BinaryOp::Div, int(10), nat(d));
    let e = Rc::new(Expr::Cases(CasesData {
        loc: loc(1, 1),
        subject: nat("x"),
        subject_type: Type::Nat,
        alternatives: vec![(literal(1), divide("a")), (literal(2), divide("b"))],
        others: Some(divide("c")),
    }));
    assert_eq!(
        formulas(&expression_pos(vec![], &e)),
        vec![
            "x = 1 =>\n  a <> 0".to_string(),
            "not x = 1 and x = 2 =>\n  b <> 0".to_string(),
            "not (x = 1 or x = 2) =>\n  c <> 0".to_string(),
        ]
    );
}
