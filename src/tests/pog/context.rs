use std::collections::BTreeSet;
use std::rc::Rc;

use crate::compiler::ops::BinaryOp;
use crate::compiler::pog::context::{AmbiguityData, POContext, POContextStack};
use crate::compiler::pog::formula::{FBind, Formula};
use crate::compiler::types::Type;

use crate::tests::util::{int, loc, nat, natop};

fn positive(name: &str) -> Rc<Formula> {
    Formula::expr(&natop(BinaryOp::Greater, nat(name), int(0)))
}

fn alt(choice: usize, index: usize, guard: &str, frames: Vec<POContext>) -> POContext {
    POContext::AltBranch {
        choice,
        index,
        guard: Formula::name(guard),
        frames: frames.into_iter().map(Rc::new).collect(),
    }
}

fn names(vs: &[&str]) -> BTreeSet<String> {
    vs.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_render_indents_governed_lines() {
    let mut ctxt = POContextStack::new();
    ctxt.push(POContext::forall(vec![FBind::Type("x".to_string(), Type::Nat)]));
    ctxt.push(POContext::implies(positive("x")));
    ctxt.push(POContext::let_expr("y", &nat("x")));
    assert_eq!(
        ctxt.render(),
        vec![
            "forall x : nat &".to_string(),
            "  x > 0 =>".to_string(),
            "    let y = x in".to_string(),
        ]
    );
}

#[test]
fn test_scope_and_comments_do_not_indent() {
    let mut ctxt = POContextStack::new();
    ctxt.push_scope();
    ctxt.push(POContext::ResolvedAmbiguity {
        vars: names(&["x"]),
        loc: loc(4, 7),
    });
    ctxt.push(POContext::implies(positive("x")));
    assert_eq!(
        ctxt.render(),
        vec![
            "-- Resolved ambiguity {x} at 4:7".to_string(),
            "x > 0 =>".to_string(),
        ]
    );
    assert_eq!(ctxt.wrap(positive("y")).to_string(), "-- Resolved ambiguity {x} at 4:7\nx > 0 =>\n  y > 0");
}

#[test]
fn test_pop_to_marker() {
    let mut ctxt = POContextStack::new();
    ctxt.push(POContext::implies(positive("a")));
    let marker = ctxt.push_scope();
    ctxt.push(POContext::implies(positive("b")));
    ctxt.push(POContext::implies(positive("c")));
    assert_eq!(ctxt.depth(), 4);
    assert_eq!(ctxt.frames_above(marker).len(), 3);
    ctxt.pop_to(marker);
    assert_eq!(ctxt.depth(), 1);
    assert_eq!(ctxt.render(), vec!["a > 0 =>".to_string()]);
}

#[test]
fn test_clone_is_independent() {
    let mut ctxt = POContextStack::new();
    ctxt.push(POContext::implies(positive("a")));
    let mut copy = ctxt.clone();
    copy.push(POContext::implies(positive("b")));
    assert_eq!(ctxt.depth(), 1);
    assert_eq!(copy.depth(), 2);
}

#[test]
fn test_expand_without_choices_is_identity() {
    let mut ctxt = POContextStack::new();
    ctxt.push(POContext::forall(vec![FBind::Type("x".to_string(), Type::Nat)]));
    ctxt.push(POContext::implies(positive("x")));
    let expanded = ctxt.expand();
    assert_eq!(expanded.len(), 1);
    assert_eq!(expanded[0].frames(), ctxt.frames());
    assert_eq!(expanded[0].render(), ctxt.render());
}

#[test]
fn test_expand_alternative_groups_multiply() {
    let mut ctxt = POContextStack::new();
    ctxt.push(alt(1, 0, "p", vec![]));
    ctxt.push(alt(1, 1, "not p", vec![]));
    assert_eq!(ctxt.expand().len(), 2);

    ctxt.push(alt(2, 0, "q", vec![]));
    ctxt.push(alt(2, 1, "r", vec![]));
    ctxt.push(alt(2, 2, "s", vec![]));
    let expanded = ctxt.expand();
    assert_eq!(expanded.len(), 6);
    assert_eq!(
        expanded[0].render(),
        vec!["p =>".to_string(), "  q =>".to_string()]
    );
    assert_eq!(
        expanded[5].render(),
        vec!["not p =>".to_string(), "  s =>".to_string()]
    );
}

#[test]
fn test_expand_nested_alternatives() {
    let inner = vec![alt(2, 0, "q", vec![]), alt(2, 1, "not q", vec![])];
    let mut ctxt = POContextStack::new();
    ctxt.push(alt(1, 0, "p", inner));
    ctxt.push(alt(1, 1, "not p", vec![]));
    let rendered: Vec<Vec<String>> = ctxt.expand().iter().map(|a| a.render()).collect();
    assert_eq!(
        rendered,
        vec![
            vec!["p =>".to_string(), "  q =>".to_string()],
            vec!["p =>".to_string(), "  not q =>".to_string()],
            vec!["not p =>".to_string()],
        ]
    );
}

#[test]
fn test_ambiguous_update_expands_to_rebinding() {
    let mut ctxt = POContextStack::new();
    ctxt.push(POContext::AmbiguousUpdate(AmbiguityData {
        description: "for loop".to_string(),
        vars: vec![("x".to_string(), Type::Nat)],
        loc: loc(3, 5),
    }));
    assert_eq!(
        ctxt.render(),
        vec!["-- Ambiguous for loop updates {x} at 3:5".to_string()]
    );
    let expanded = ctxt.expand();
    assert_eq!(expanded.len(), 1);
    assert_eq!(
        expanded[0].render(),
        vec![
            "-- Ambiguous for loop updates {x} at 3:5".to_string(),
            "forall x : nat &".to_string(),
        ]
    );
    assert_eq!(ctxt.unresolved_ambiguities().len(), 1);
}

#[test]
fn test_resolutions_inside_alternatives_are_seen() {
    let mut ctxt = POContextStack::new();
    ctxt.push(POContext::ResolvedAmbiguity {
        vars: names(&["a"]),
        loc: loc(1, 1),
    });
    ctxt.push(alt(
        1,
        0,
        "p",
        vec![POContext::ResolvedAmbiguity {
            vars: names(&["b"]),
            loc: loc(2, 1),
        }],
    ));
    assert_eq!(ctxt.resolved_variables(), names(&["a", "b"]));
}

#[test]
fn test_update_names() {
    let mut ctxt = POContextStack::new();
    ctxt.push(POContext::Let {
        pattern: "x".to_string(),
        value: Formula::int(1),
        update: true,
    });
    ctxt.push(POContext::let_expr("y", &int(2)));
    assert_eq!(ctxt.update_names(), names(&["x"]));
}
