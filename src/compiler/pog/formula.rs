use std::collections::BTreeSet;
use std::fmt::Display;
use std::rc::Rc;

use serde::Serialize;

use crate::compiler::ops::{
    binary_text, unary_text, BinaryOp, UnaryOp, PREC_ATOM, PREC_BINDER, PREC_IMPLIES,
};
use crate::compiler::printer::expr_text;
use crate::compiler::typedtree::{Expr, Quantifier};
use crate::compiler::types::Type;
use crate::util::Number;

/// A binding in a generated quantifier.  Patterns are kept as printed text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FBind {
    Set(String, Rc<Formula>),
    Seq(String, Rc<Formula>),
    Type(String, Type),
}

/// One line of context in front of a condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Binder {
    Quantifier(Quantifier, Vec<FBind>, Option<Rc<Formula>>),
    Let(Vec<(String, Rc<Formula>)>),
    Implies(Rc<Formula>),
    Comment(String),
}

/// The structured value of an obligation.  Program expressions appear as
/// leaves so that the variables an obligation reasons about can be read back
/// out of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Formula {
    Expr(Rc<Expr>),
    Name(String),
    Bool(bool),
    Int(Number),
    Unary(UnaryOp, Rc<Formula>),
    Binary(BinaryOp, Rc<Formula>, Rc<Formula>),
    Apply(Rc<Formula>, Vec<Rc<Formula>>),
    Field(Rc<Formula>, String),
    TupleSelect(Rc<Formula>, usize),
    Tuple(Vec<Rc<Formula>>),
    Record(String, Vec<Rc<Formula>>),
    SetEnum(Vec<Rc<Formula>>),
    SeqEnum(Vec<Rc<Formula>>),
    SetRange(Rc<Formula>, Rc<Formula>),
    MapEnum(Vec<(Rc<Formula>, Rc<Formula>)>),
    Mu(Rc<Formula>, Vec<(String, Rc<Formula>)>),
    Is(Rc<Formula>, Type),
    Pre(Rc<Formula>, Vec<Rc<Formula>>),
    If(Vec<(Rc<Formula>, Rc<Formula>)>, Rc<Formula>),
    Scoped(Binder, Rc<Formula>),
}

fn joined(items: &[Rc<Formula>]) -> String {
    items
        .iter()
        .map(|f| f.text().1)
        .collect::<Vec<String>>()
        .join(", ")
}

fn atom(f: &Formula) -> String {
    let (prec, text) = f.text();
    if prec < PREC_ATOM {
        format!("({})", text)
    } else {
        text
    }
}

impl Display for FBind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            FBind::Set(p, s) => write!(formatter, "{} in set {}", p, s.text().1),
            FBind::Seq(p, s) => write!(formatter, "{} in seq {}", p, s.text().1),
            FBind::Type(p, t) => write!(formatter, "{} : {}", p, t),
        }
    }
}

impl Binder {
    /// The binder as printed on its own line in front of what it governs.
    pub fn line(&self) -> String {
        match self {
            Binder::Quantifier(q, binds, guard) => {
                let binds_text: Vec<String> = binds.iter().map(|b| b.to_string()).collect();
                match guard {
                    Some(g) => format!(
                        "{} {} & {} =>",
                        q.keyword(),
                        binds_text.join(", "),
                        implies_operand(g)
                    ),
                    None => format!("{} {} &", q.keyword(), binds_text.join(", ")),
                }
            }
            Binder::Let(defs) => {
                let defs_text: Vec<String> = defs
                    .iter()
                    .map(|(p, v)| format!("{} = {}", p, v.text().1))
                    .collect();
                format!("let {} in", defs_text.join(", "))
            }
            Binder::Implies(a) => format!("{} =>", implies_operand(a)),
            Binder::Comment(c) => c.clone(),
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Binder::Comment(_))
    }
}

fn implies_operand(f: &Formula) -> String {
    let (prec, text) = f.text();
    if prec <= PREC_IMPLIES {
        format!("({})", text)
    } else {
        text
    }
}

/// Lay binders out one per line, each governed line indented two spaces
/// further than the binder that governs it.  Returns the lines and the
/// indentation for whatever follows.
pub fn binder_lines(binders: &[Binder]) -> (Vec<String>, usize) {
    let mut lines = Vec::new();
    let mut indent = 0;
    for b in binders.iter() {
        lines.push(format!("{}{}", " ".repeat(indent), b.line()));
        if !b.is_comment() {
            indent += 2;
        }
    }
    (lines, indent)
}

impl Formula {
    pub fn expr(e: &Rc<Expr>) -> Rc<Formula> {
        Rc::new(Formula::Expr(e.clone()))
    }

    pub fn name(n: &str) -> Rc<Formula> {
        Rc::new(Formula::Name(n.to_string()))
    }

    pub fn int(n: i64) -> Rc<Formula> {
        Rc::new(Formula::Int(n.into()))
    }

    pub fn binary(op: BinaryOp, l: Rc<Formula>, r: Rc<Formula>) -> Rc<Formula> {
        Rc::new(Formula::Binary(op, l, r))
    }

    pub fn not(f: Rc<Formula>) -> Rc<Formula> {
        Rc::new(Formula::Unary(UnaryOp::Not, f))
    }

    pub fn unary(op: UnaryOp, f: Rc<Formula>) -> Rc<Formula> {
        Rc::new(Formula::Unary(op, f))
    }

    pub fn call(name: &str, args: Vec<Rc<Formula>>) -> Rc<Formula> {
        Rc::new(Formula::Apply(Formula::name(name), args))
    }

    pub fn implies(a: Rc<Formula>, b: Rc<Formula>) -> Rc<Formula> {
        Formula::binary(BinaryOp::Implies, a, b)
    }

    /// Conjunction of the given formulas; true when there are none.
    pub fn and_all(fs: Vec<Rc<Formula>>) -> Rc<Formula> {
        fs.into_iter()
            .reduce(|a, b| Formula::binary(BinaryOp::And, a, b))
            .unwrap_or_else(|| Rc::new(Formula::Bool(true)))
    }

    /// Disjunction of the given formulas; false when there are none.
    pub fn or_all(fs: Vec<Rc<Formula>>) -> Rc<Formula> {
        fs.into_iter()
            .reduce(|a, b| Formula::binary(BinaryOp::Or, a, b))
            .unwrap_or_else(|| Rc::new(Formula::Bool(false)))
    }

    pub fn scoped(binder: Binder, body: Rc<Formula>) -> Rc<Formula> {
        Rc::new(Formula::Scoped(binder, body))
    }

    /// Print inline, returning the binding strength of the outer construct.
    pub fn text(&self) -> (usize, String) {
        match self {
            Formula::Expr(e) => expr_text(e),
            Formula::Name(n) => (PREC_ATOM, n.clone()),
            Formula::Bool(b) => (PREC_ATOM, b.to_string()),
            Formula::Int(n) => (PREC_ATOM, n.to_string()),
            Formula::Unary(op, f) => (op.precedence(), unary_text(op, f.text())),
            Formula::Binary(op, l, r) => (op.precedence(), binary_text(op, l.text(), r.text())),
            Formula::Apply(f, args) => (PREC_ATOM, format!("{}({})", atom(f), joined(args))),
            Formula::Field(f, n) => (PREC_ATOM, format!("{}.{}", atom(f), n)),
            Formula::TupleSelect(f, n) => (PREC_ATOM, format!("{}.#{}", atom(f), n)),
            Formula::Tuple(fs) => (PREC_ATOM, format!("mk_({})", joined(fs))),
            Formula::Record(n, fs) => (PREC_ATOM, format!("mk_{}({})", n, joined(fs))),
            Formula::SetEnum(fs) => (PREC_ATOM, format!("{{{}}}", joined(fs))),
            Formula::SeqEnum(fs) => (PREC_ATOM, format!("[{}]", joined(fs))),
            Formula::SetRange(a, b) => (
                PREC_ATOM,
                format!("{{{}, ..., {}}}", a.text().1, b.text().1),
            ),
            Formula::MapEnum(maplets) => {
                if maplets.is_empty() {
                    return (PREC_ATOM, "{|->}".to_string());
                }
                let items: Vec<String> = maplets
                    .iter()
                    .map(|(k, v)| format!("{} |-> {}", k.text().1, v.text().1))
                    .collect();
                (PREC_ATOM, format!("{{{}}}", items.join(", ")))
            }
            Formula::Mu(r, mods) => {
                let items: Vec<String> = mods
                    .iter()
                    .map(|(f, v)| format!("{} |-> {}", f, v.text().1))
                    .collect();
                (
                    PREC_ATOM,
                    format!("mu({}, {})", r.text().1, items.join(", ")),
                )
            }
            Formula::Is(f, t) => (PREC_ATOM, format!("is_({}, {})", f.text().1, t)),
            Formula::Pre(f, args) => {
                let mut all = vec![f.clone()];
                all.append(&mut args.clone());
                (PREC_ATOM, format!("pre_({})", joined(&all)))
            }
            Formula::If(arms, otherwise) => {
                let mut text = String::new();
                for (i, (c, t)) in arms.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { " elseif" };
                    text = format!("{}{} {} then {}", text, keyword, c.text().1, t.text().1);
                }
                (
                    PREC_BINDER,
                    format!("{} else {}", text, otherwise.text().1),
                )
            }
            Formula::Scoped(Binder::Comment(_), body) => body.text(),
            Formula::Scoped(Binder::Implies(a), body) => (
                PREC_IMPLIES,
                binary_text(&BinaryOp::Implies, a.text(), body.text()),
            ),
            Formula::Scoped(b, body) => {
                let line = b.line();
                (PREC_BINDER, format!("{} {}", line, body.text().1))
            }
        }
    }

    /// The chain of binders at the top of this formula and the condition
    /// they govern.
    pub fn split(&self) -> (Vec<Binder>, &Formula) {
        let mut binders = Vec::new();
        let mut here = self;
        while let Formula::Scoped(b, body) = here {
            binders.push(b.clone());
            here = body.as_ref();
        }
        (binders, here)
    }

    /// Program variables mentioned by the expression leaves.
    pub fn program_variables(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        self.visit(&mut |f| {
            if let Formula::Expr(e) = f {
                result.append(&mut e.variables());
            }
        });
        result
    }

    fn visit(&self, f: &mut dyn FnMut(&Formula)) {
        f(self);
        match self {
            Formula::Expr(_) | Formula::Name(_) | Formula::Bool(_) | Formula::Int(_) => {}
            Formula::Unary(_, a)
            | Formula::Field(a, _)
            | Formula::TupleSelect(a, _)
            | Formula::Is(a, _) => a.visit(f),
            Formula::Binary(_, a, b) | Formula::SetRange(a, b) => {
                a.visit(f);
                b.visit(f);
            }
            Formula::Apply(a, args) | Formula::Pre(a, args) => {
                a.visit(f);
                for x in args.iter() {
                    x.visit(f);
                }
            }
            Formula::Tuple(fs)
            | Formula::Record(_, fs)
            | Formula::SetEnum(fs)
            | Formula::SeqEnum(fs) => {
                for x in fs.iter() {
                    x.visit(f);
                }
            }
            Formula::MapEnum(maplets) => {
                for (k, v) in maplets.iter() {
                    k.visit(f);
                    v.visit(f);
                }
            }
            Formula::Mu(r, mods) => {
                r.visit(f);
                for (_, v) in mods.iter() {
                    v.visit(f);
                }
            }
            Formula::If(arms, otherwise) => {
                for (c, t) in arms.iter() {
                    c.visit(f);
                    t.visit(f);
                }
                otherwise.visit(f);
            }
            Formula::Scoped(b, body) => {
                match b {
                    Binder::Quantifier(_, binds, guard) => {
                        for bind in binds.iter() {
                            match bind {
                                FBind::Set(_, s) | FBind::Seq(_, s) => s.visit(f),
                                FBind::Type(_, _) => {}
                            }
                        }
                        if let Some(g) = guard {
                            g.visit(f);
                        }
                    }
                    Binder::Let(defs) => {
                        for (_, v) in defs.iter() {
                            v.visit(f);
                        }
                    }
                    Binder::Implies(a) => a.visit(f),
                    Binder::Comment(_) => {}
                }
                body.visit(f);
            }
        }
    }
}

impl Display for Formula {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        let (binders, condition) = self.split();
        let (mut lines, indent) = binder_lines(&binders);
        lines.push(format!("{}{}", " ".repeat(indent), condition.text().1));
        formatter.write_str(&lines.join("\n"))
    }
}
