use std::fmt::Display;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Resolved types as the type checker leaves them on the tree.  Named types
/// keep their definition body so that predicates can look through them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Nat,
    Nat1,
    Int,
    Rat,
    Real,
    Char,
    Token,
    Quote(String),
    Seq(Rc<Type>),
    Seq1(Rc<Type>),
    Set(Rc<Type>),
    Set1(Rc<Type>),
    Map(Rc<Type>, Rc<Type>),
    InMap(Rc<Type>, Rc<Type>),
    Product(Vec<Type>),
    Union(Vec<Type>),
    Optional(Rc<Type>),
    Record {
        name: String,
        fields: Vec<(String, Type)>,
    },
    Named {
        name: String,
        ty: Rc<Type>,
        invariant: bool,
    },
    Function {
        params: Vec<Type>,
        result: Rc<Type>,
        partial: bool,
    },
    Operation {
        params: Vec<Type>,
        result: Rc<Type>,
    },
    Parameter(String),
    Void,
    Unknown,
}

fn numeric_rank(t: &Type) -> Option<usize> {
    match t {
        Type::Nat1 => Some(1),
        Type::Nat => Some(2),
        Type::Int => Some(3),
        Type::Rat => Some(4),
        Type::Real => Some(5),
        _ => None,
    }
}

fn list_text(types: &[Type], sep: &str) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<String>>()
        .join(sep)
}

impl Type {
    pub fn seq_of(t: Type) -> Type {
        Type::Seq(Rc::new(t))
    }

    pub fn set_of(t: Type) -> Type {
        Type::Set(Rc::new(t))
    }

    pub fn map_of(d: Type, r: Type) -> Type {
        Type::Map(Rc::new(d), Rc::new(r))
    }

    pub fn total_function(params: Vec<Type>, result: Type) -> Type {
        Type::Function {
            params,
            result: Rc::new(result),
            partial: false,
        }
    }

    pub fn partial_function(params: Vec<Type>, result: Type) -> Type {
        Type::Function {
            params,
            result: Rc::new(result),
            partial: true,
        }
    }

    /// Look through type names to the structure underneath.
    pub fn resolve(&self) -> &Type {
        match self {
            Type::Named { ty, .. } => ty.resolve(),
            _ => self,
        }
    }

    pub fn is_map(&self) -> bool {
        match self.resolve() {
            Type::Map(_, _) | Type::InMap(_, _) => true,
            Type::Optional(t) => t.is_map(),
            Type::Union(ts) => ts.iter().any(|t| t.is_map()),
            _ => false,
        }
    }

    pub fn is_seq(&self) -> bool {
        match self.resolve() {
            Type::Seq(_) | Type::Seq1(_) => true,
            Type::Optional(t) => t.is_seq(),
            Type::Union(ts) => ts.iter().any(|t| t.is_seq()),
            _ => false,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self.resolve(), Type::Set(_) | Type::Set1(_))
    }

    pub fn is_function(&self) -> bool {
        match self.resolve() {
            Type::Function { .. } => true,
            Type::Union(ts) => ts.iter().any(|t| t.is_function()),
            _ => false,
        }
    }

    pub fn is_operation(&self) -> bool {
        matches!(self.resolve(), Type::Operation { .. })
    }

    pub fn is_record(&self) -> bool {
        matches!(self.resolve(), Type::Record { .. })
    }

    pub fn is_numeric(&self) -> bool {
        match self.resolve() {
            Type::Union(ts) => !ts.is_empty() && ts.iter().all(|t| t.is_numeric()),
            t => numeric_rank(t).is_some(),
        }
    }

    pub fn is_product(&self) -> bool {
        matches!(self.resolve(), Type::Product(_))
    }

    pub fn product_width(&self) -> Option<usize> {
        match self.resolve() {
            Type::Product(ts) => Some(ts.len()),
            _ => None,
        }
    }

    pub fn map_types(&self) -> Option<(Type, Type)> {
        match self.resolve() {
            Type::Map(d, r) | Type::InMap(d, r) => Some((d.as_ref().clone(), r.as_ref().clone())),
            Type::Optional(t) => t.map_types(),
            Type::Union(ts) => ts.iter().find_map(|t| t.map_types()),
            _ => None,
        }
    }

    pub fn seq_element(&self) -> Option<Type> {
        match self.resolve() {
            Type::Seq(t) | Type::Seq1(t) => Some(t.as_ref().clone()),
            Type::Optional(t) => t.seq_element(),
            Type::Union(ts) => ts.iter().find_map(|t| t.seq_element()),
            _ => None,
        }
    }

    pub fn field_type(&self, field: &str) -> Option<Type> {
        match self.resolve() {
            Type::Record { fields, .. } => fields
                .iter()
                .find(|(n, _)| n == field)
                .map(|(_, t)| t.clone()),
            _ => None,
        }
    }

    /// Parameter and result types of a function or operation type.
    pub fn signature(&self) -> Option<(Vec<Type>, Type)> {
        match self.resolve() {
            Type::Function { params, result, .. } | Type::Operation { params, result } => {
                Some((params.clone(), result.as_ref().clone()))
            }
            Type::Union(ts) => ts.iter().find_map(|t| t.signature()),
            _ => None,
        }
    }

    pub fn is_partial_function(&self) -> bool {
        match self.resolve() {
            Type::Function { partial, .. } => *partial,
            Type::Union(ts) => ts.iter().any(|t| t.is_partial_function()),
            _ => false,
        }
    }

    /// Whether every value of this type is a value of other without any
    /// further check.  Unknown types are compatible with everything.
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }

        match (self, other) {
            (Type::Unknown, _) | (_, Type::Unknown) => true,
            (Type::Parameter(_), _) | (_, Type::Parameter(_)) => true,
            (Type::Union(ts), _) => ts.iter().all(|t| t.is_subtype_of(other)),
            (_, Type::Union(ts)) => ts.iter().any(|t| self.is_subtype_of(t)),
            (Type::Optional(a), Type::Optional(b)) => a.is_subtype_of(b),
            (_, Type::Optional(b)) => self.is_subtype_of(b),
            (
                Type::Named {
                    name: a,
                    invariant: true,
                    ..
                },
                Type::Named {
                    name: b,
                    invariant: true,
                    ..
                },
            ) => a == b,
            (_, Type::Named { invariant: true, .. }) => false,
            (_, Type::Named { ty, .. }) => self.is_subtype_of(ty),
            (Type::Named { ty, .. }, _) => ty.is_subtype_of(other),
            (Type::Seq1(a), Type::Seq(b))
            | (Type::Seq(a), Type::Seq(b))
            | (Type::Seq1(a), Type::Seq1(b))
            | (Type::Set1(a), Type::Set(b))
            | (Type::Set(a), Type::Set(b))
            | (Type::Set1(a), Type::Set1(b)) => a.is_subtype_of(b),
            (Type::Map(ad, ar), Type::Map(bd, br))
            | (Type::InMap(ad, ar), Type::Map(bd, br))
            | (Type::InMap(ad, ar), Type::InMap(bd, br)) => {
                ad.is_subtype_of(bd) && ar.is_subtype_of(br)
            }
            (Type::Product(a), Type::Product(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_subtype_of(y))
            }
            (Type::Record { name: a, .. }, Type::Record { name: b, .. }) => a == b,
            (a, b) => match (numeric_rank(a), numeric_rank(b)) {
                (Some(x), Some(y)) => x <= y,
                _ => false,
            },
        }
    }
}

impl Display for Type {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Type::Bool => write!(formatter, "bool"),
            Type::Nat => write!(formatter, "nat"),
            Type::Nat1 => write!(formatter, "nat1"),
            Type::Int => write!(formatter, "int"),
            Type::Rat => write!(formatter, "rat"),
            Type::Real => write!(formatter, "real"),
            Type::Char => write!(formatter, "char"),
            Type::Token => write!(formatter, "token"),
            Type::Quote(q) => write!(formatter, "<{}>", q),
            Type::Seq(t) => write!(formatter, "seq of {}", t),
            Type::Seq1(t) => write!(formatter, "seq1 of {}", t),
            Type::Set(t) => write!(formatter, "set of {}", t),
            Type::Set1(t) => write!(formatter, "set1 of {}", t),
            Type::Map(d, r) => write!(formatter, "map {} to {}", d, r),
            Type::InMap(d, r) => write!(formatter, "inmap {} to {}", d, r),
            Type::Product(ts) => write!(formatter, "({})", list_text(ts, " * ")),
            Type::Union(ts) => write!(formatter, "({})", list_text(ts, " | ")),
            Type::Optional(t) => write!(formatter, "[{}]", t),
            Type::Record { name, .. } => write!(formatter, "{}", name),
            Type::Named { name, .. } => write!(formatter, "{}", name),
            Type::Function {
                params,
                result,
                partial,
            } => {
                let params_text = if params.is_empty() {
                    "()".to_string()
                } else {
                    list_text(params, " * ")
                };
                let arrow = if *partial { "->" } else { "+>" };
                write!(formatter, "({} {} {})", params_text, arrow, result)
            }
            Type::Operation { params, result } => {
                let params_text = if params.is_empty() {
                    "()".to_string()
                } else {
                    list_text(params, " * ")
                };
                write!(formatter, "({} ==> {})", params_text, result)
            }
            Type::Parameter(p) => write!(formatter, "@{}", p),
            Type::Void => write!(formatter, "()"),
            Type::Unknown => write!(formatter, "?"),
        }
    }
}
