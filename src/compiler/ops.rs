use serde::{Deserialize, Serialize};

// Binding strength of printed constructs; larger binds tighter.
pub const PREC_BINDER: usize = 0;
pub const PREC_EQUIV: usize = 10;
pub const PREC_IMPLIES: usize = 20;
pub const PREC_OR: usize = 30;
pub const PREC_AND: usize = 40;
pub const PREC_NOT: usize = 50;
pub const PREC_RELATION: usize = 60;
pub const PREC_ADDITIVE: usize = 70;
pub const PREC_MULTIPLICATIVE: usize = 80;
pub const PREC_RESTRICT: usize = 90;
pub const PREC_UNARY: usize = 100;
pub const PREC_COMPOSE: usize = 110;
pub const PREC_ATOM: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    Abs,
    Floor,
    Card,
    Dom,
    Rng,
    Len,
    Hd,
    Tl,
    Elems,
    Inds,
    Dunion,
    Dinter,
    Power,
    Conc,
    Merge,
    Reverse,
    Inverse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Equivalent,
    Implies,
    Or,
    And,
    Equals,
    NotEquals,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    InSet,
    NotInSet,
    Subset,
    ProperSubset,
    Plus,
    Minus,
    Union,
    SetDifference,
    MapUnion,
    PlusPlus,
    Concat,
    Times,
    Divide,
    Div,
    Rem,
    Mod,
    Inter,
    DomResTo,
    DomResBy,
    RngResTo,
    RngResBy,
    Comp,
    StarStar,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "not ",
            UnaryOp::Abs => "abs ",
            UnaryOp::Floor => "floor ",
            UnaryOp::Card => "card ",
            UnaryOp::Dom => "dom ",
            UnaryOp::Rng => "rng ",
            UnaryOp::Len => "len ",
            UnaryOp::Hd => "hd ",
            UnaryOp::Tl => "tl ",
            UnaryOp::Elems => "elems ",
            UnaryOp::Inds => "inds ",
            UnaryOp::Dunion => "dunion ",
            UnaryOp::Dinter => "dinter ",
            UnaryOp::Power => "power ",
            UnaryOp::Conc => "conc ",
            UnaryOp::Merge => "merge ",
            UnaryOp::Reverse => "reverse ",
            UnaryOp::Inverse => "inverse ",
        }
    }

    pub fn precedence(&self) -> usize {
        match self {
            UnaryOp::Not => PREC_NOT,
            _ => PREC_UNARY,
        }
    }
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Equivalent => "<=>",
            BinaryOp::Implies => "=>",
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equals => "=",
            BinaryOp::NotEquals => "<>",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::InSet => "in set",
            BinaryOp::NotInSet => "not in set",
            BinaryOp::Subset => "subset",
            BinaryOp::ProperSubset => "psubset",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Union => "union",
            BinaryOp::SetDifference => "\\",
            BinaryOp::MapUnion => "munion",
            BinaryOp::PlusPlus => "++",
            BinaryOp::Concat => "^",
            BinaryOp::Times => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Mod => "mod",
            BinaryOp::Inter => "inter",
            BinaryOp::DomResTo => "<:",
            BinaryOp::DomResBy => "<-:",
            BinaryOp::RngResTo => ":>",
            BinaryOp::RngResBy => ":->",
            BinaryOp::Comp => "comp",
            BinaryOp::StarStar => "**",
        }
    }

    pub fn precedence(&self) -> usize {
        match self {
            BinaryOp::Equivalent => PREC_EQUIV,
            BinaryOp::Implies => PREC_IMPLIES,
            BinaryOp::Or => PREC_OR,
            BinaryOp::And => PREC_AND,
            BinaryOp::Equals
            | BinaryOp::NotEquals
            | BinaryOp::Less
            | BinaryOp::LessEq
            | BinaryOp::Greater
            | BinaryOp::GreaterEq
            | BinaryOp::InSet
            | BinaryOp::NotInSet
            | BinaryOp::Subset
            | BinaryOp::ProperSubset => PREC_RELATION,
            BinaryOp::Plus
            | BinaryOp::Minus
            | BinaryOp::Union
            | BinaryOp::SetDifference
            | BinaryOp::MapUnion
            | BinaryOp::PlusPlus
            | BinaryOp::Concat => PREC_ADDITIVE,
            BinaryOp::Times
            | BinaryOp::Divide
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Mod
            | BinaryOp::Inter => PREC_MULTIPLICATIVE,
            BinaryOp::DomResTo | BinaryOp::DomResBy | BinaryOp::RngResTo | BinaryOp::RngResBy => {
                PREC_RESTRICT
            }
            BinaryOp::Comp | BinaryOp::StarStar => PREC_COMPOSE,
        }
    }

    pub fn right_associative(&self) -> bool {
        matches!(self, BinaryOp::Implies | BinaryOp::StarStar)
    }

    /// Operators whose chains can be printed without inner parentheses.
    pub fn associative(&self) -> bool {
        matches!(
            self,
            BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Plus
                | BinaryOp::Times
                | BinaryOp::Union
                | BinaryOp::Inter
                | BinaryOp::MapUnion
                | BinaryOp::Concat
        )
    }
}

fn parens(add_parens: bool, s: String) -> String {
    if add_parens {
        format!("({})", s)
    } else {
        s
    }
}

/// Print a binary application, parenthesizing operands the way the
/// precedence table demands.  Shared between program expressions and
/// obligation formulas.
pub fn binary_text(op: &BinaryOp, left: (usize, String), right: (usize, String)) -> String {
    let prec = op.precedence();
    let use_left_paren = prec > left.0 || (prec == left.0 && op.right_associative());
    let use_right_paren =
        prec > right.0 || (prec == right.0 && !op.right_associative() && !op.associative());
    format!(
        "{} {} {}",
        parens(use_left_paren, left.1),
        op.symbol(),
        parens(use_right_paren, right.1)
    )
}

pub fn unary_text(op: &UnaryOp, arg: (usize, String)) -> String {
    format!(
        "{}{}",
        op.symbol(),
        parens(op.precedence() > arg.0 || arg.0 == PREC_BINDER, arg.1)
    )
}
