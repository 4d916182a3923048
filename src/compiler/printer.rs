use std::fmt::Display;
use std::rc::Rc;

use crate::compiler::ops::{binary_text, unary_text, PREC_ATOM, PREC_BINDER};
use crate::compiler::typedtree::{Bind, Expr, Literal, Pattern};

fn joined<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

fn atom(e: &Expr) -> String {
    let (prec, text) = expr_text(e);
    if prec < PREC_ATOM {
        format!("({})", text)
    } else {
        text
    }
}

fn binds_text(binds: &[Bind]) -> String {
    joined(binds)
}

fn filter_text(pred: &Option<Rc<Expr>>) -> String {
    match pred {
        Some(p) => format!(" & {}", p),
        None => "".to_string(),
    }
}

/// Print an expression in concrete syntax along with the binding strength of
/// its outermost construct, so that enclosing printers can decide on
/// parentheses.
pub fn expr_text(e: &Expr) -> (usize, String) {
    match e {
        Expr::Literal(_, l) => (PREC_ATOM, l.to_string()),
        Expr::Variable(_, n, _) => (PREC_ATOM, n.clone()),
        Expr::Unary(_, op, arg, _) => (op.precedence(), unary_text(op, expr_text(arg))),
        Expr::Binary(b) => (
            b.op.precedence(),
            binary_text(&b.op, expr_text(&b.left), expr_text(&b.right)),
        ),
        Expr::Apply(a) => {
            let args: Vec<String> = a.args.iter().map(|x| x.to_string()).collect();
            (PREC_ATOM, format!("{}({})", atom(&a.root), args.join(", ")))
        }
        Expr::Field(_, r, f) => (PREC_ATOM, format!("{}.{}", atom(r), f)),
        Expr::TupleSelect(_, r, n) => (PREC_ATOM, format!("{}.#{}", atom(r), n)),
        Expr::If(_, c, t, elseifs, e) => {
            let mut text = format!("if {} then {}", c, t);
            for (ec, et) in elseifs.iter() {
                text = format!("{} elseif {} then {}", text, ec, et);
            }
            (PREC_BINDER, format!("{} else {}", text, e))
        }
        Expr::Cases(c) => {
            let mut alts: Vec<String> = c
                .alternatives
                .iter()
                .map(|(p, body)| format!("{} -> {}", p, body))
                .collect();
            if let Some(o) = &c.others {
                alts.push(format!("others -> {}", o));
            }
            (
                PREC_ATOM,
                format!("cases {}: {} end", c.subject, alts.join(", ")),
            )
        }
        Expr::Let(_, defs, body) => {
            let defs_text: Vec<String> = defs
                .iter()
                .map(|d| format!("{} = {}", d.pattern, d.value))
                .collect();
            (
                PREC_BINDER,
                format!("let {} in {}", defs_text.join(", "), body),
            )
        }
        Expr::LetBe(_, bind, st, body) => {
            let st_text = match st {
                Some(st) => format!(" be st {}", st),
                None => "".to_string(),
            };
            (PREC_BINDER, format!("let {}{} in {}", bind, st_text, body))
        }
        Expr::Quantified(_, q, binds, body) => (
            PREC_BINDER,
            format!("{} {} & {}", q.keyword(), binds_text(binds), body),
        ),
        Expr::Iota(_, bind, pred) => (PREC_BINDER, format!("iota {} & {}", bind, pred)),
        Expr::SetEnum(_, es) => (PREC_ATOM, format!("{{{}}}", joined(es))),
        Expr::SeqEnum(_, es) => (PREC_ATOM, format!("[{}]", joined(es))),
        Expr::MapEnum(_, maplets) => {
            if maplets.is_empty() {
                (PREC_ATOM, "{|->}".to_string())
            } else {
                let items: Vec<String> = maplets
                    .iter()
                    .map(|(k, v)| format!("{} |-> {}", k, v))
                    .collect();
                (PREC_ATOM, format!("{{{}}}", items.join(", ")))
            }
        }
        Expr::Tuple(_, es) => (PREC_ATOM, format!("mk_({})", joined(es))),
        Expr::Record(_, name, es) => (PREC_ATOM, format!("mk_{}({})", name, joined(es))),
        Expr::Mu(_, r, mods) => {
            let items: Vec<String> = mods
                .iter()
                .map(|(f, v)| format!("{} |-> {}", f, v))
                .collect();
            (PREC_ATOM, format!("mu({}, {})", r, items.join(", ")))
        }
        Expr::SetComp(_, elem, binds, pred) => (
            PREC_ATOM,
            format!("{{{} | {}{}}}", elem, binds_text(binds), filter_text(pred)),
        ),
        Expr::SeqComp(_, elem, bind, pred) => (
            PREC_ATOM,
            format!("[{} | {}{}]", elem, bind, filter_text(pred)),
        ),
        Expr::MapComp(_, k, v, binds, pred) => (
            PREC_ATOM,
            format!(
                "{{{} |-> {} | {}{}}}",
                k,
                v,
                binds_text(binds),
                filter_text(pred)
            ),
        ),
        Expr::Lambda(_, params, body) => {
            let params_text: Vec<String> = params
                .iter()
                .map(|(p, t)| format!("{} : {}", p, t))
                .collect();
            (
                PREC_BINDER,
                format!("lambda {} & {}", params_text.join(", "), body),
            )
        }
    }
}

impl Display for Expr {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        formatter.write_str(&expr_text(self).1)
    }
}

impl Display for Literal {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Literal::Bool(b) => write!(formatter, "{}", b),
            Literal::Int(n) => write!(formatter, "{}", n),
            Literal::Real(r) => write!(formatter, "{}", r),
            Literal::Char(c) => write!(formatter, "'{}'", c),
            Literal::Text(s) => write!(formatter, "{:?}", s),
            Literal::Quote(q) => write!(formatter, "<{}>", q),
            Literal::Nil => write!(formatter, "nil"),
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Pattern::Identifier(_, n) => write!(formatter, "{}", n),
            Pattern::Ignore(_) => write!(formatter, "-"),
            Pattern::Literal(_, l) => write!(formatter, "{}", l),
            Pattern::Tuple(_, ps) => write!(formatter, "mk_({})", joined(ps)),
            Pattern::Record(_, name, ps) => write!(formatter, "mk_{}({})", name, joined(ps)),
            Pattern::SeqEnum(_, ps) => write!(formatter, "[{}]", joined(ps)),
            Pattern::SetEnum(_, ps) => write!(formatter, "{{{}}}", joined(ps)),
            Pattern::Concat(_, l, r) => write!(formatter, "{} ^ {}", l, r),
        }
    }
}

impl Display for Bind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Bind::Set(p, s) => write!(formatter, "{} in set {}", p, s),
            Bind::Seq(p, s) => write!(formatter, "{} in seq {}", p, s),
            Bind::Type(p, t) => write!(formatter, "{} : {}", p, t),
        }
    }
}
