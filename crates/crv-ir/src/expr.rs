//! Symbolic expression language used to write constraint predicates.
//!
//! Expressions are plain trees; a solver gives them meaning when they are
//! asserted. Operators are overloaded so predicates read like ordinary
//! arithmetic:
//!
//! ```
//! use crv_ir::expr::{and, Expr};
//! use crv_ir::sort::SymbolId;
//!
//! let x = Expr::symbol(SymbolId(0));
//! let y = Expr::symbol(SymbolId(1));
//! let rule = and([x.ge(5), x.le(100), (x.clone() & 0x0f).eq(3), y.eq(x + 1)]);
//! assert_eq!(rule.to_string().starts_with("(and"), true);
//! ```
//!
//! `&`, `|`, `^` and `!` are bitwise on words and logical on booleans; the
//! solver decides which from the operand sorts.

use std::fmt;
use std::ops;

use serde::{Deserialize, Serialize};

use crate::sort::SymbolId;

/// A literal value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Const {
    Bool(bool),
    Int(i128),
    Real(f64),
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Bool(b) => write!(f, "{b}"),
            Const::Int(i) => write!(f, "{i}"),
            Const::Real(r) => write!(f, "{r:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// The operator obtained by swapping the operands.
    pub fn flip(self) -> Self {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Const(Const),
    Symbol(SymbolId),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Bits `hi..=lo` of a word, as an unsigned word of `hi - lo + 1` bits.
    Extract {
        hi: u32,
        lo: u32,
        arg: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Ite {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn symbol(id: SymbolId) -> Self {
        Expr::Symbol(id)
    }

    pub fn int(value: impl Into<i128>) -> Self {
        Expr::Const(Const::Int(value.into()))
    }

    pub fn real(value: f64) -> Self {
        Expr::Const(Const::Real(value))
    }

    pub fn bool(value: bool) -> Self {
        Expr::Const(Const::Bool(value))
    }

    pub fn as_const(&self) -> Option<Const> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self {
            Expr::Symbol(id) => Some(*id),
            _ => None,
        }
    }

    fn compare(&self, op: CmpOp, rhs: impl Into<Expr>) -> Expr {
        Expr::Compare {
            op,
            lhs: Box::new(self.clone()),
            rhs: Box::new(rhs.into()),
        }
    }

    pub fn eq(&self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn le(&self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn gt(&self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn ge(&self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CmpOp::Ge, rhs)
    }

    /// `lo <= self && self <= hi`.
    pub fn within(&self, lo: impl Into<Expr>, hi: impl Into<Expr>) -> Expr {
        and([self.ge(lo), self.le(hi)])
    }

    pub fn extract(&self, hi: u32, lo: u32) -> Expr {
        Expr::Extract {
            hi,
            lo,
            arg: Box::new(self.clone()),
        }
    }

    pub fn implies(&self, rhs: impl Into<Expr>) -> Expr {
        Expr::Implies(Box::new(self.clone()), Box::new(rhs.into()))
    }
}

pub fn and(items: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::And(items.into_iter().collect())
}

pub fn or(items: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Or(items.into_iter().collect())
}

pub fn not(expr: impl Into<Expr>) -> Expr {
    Expr::Unary {
        op: UnaryOp::Not,
        arg: Box::new(expr.into()),
    }
}

pub fn implies(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Expr {
    Expr::Implies(Box::new(lhs.into()), Box::new(rhs.into()))
}

pub fn ite(cond: impl Into<Expr>, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
    Expr::Ite {
        cond: Box::new(cond.into()),
        then: Box::new(then.into()),
        otherwise: Box::new(otherwise.into()),
    }
}

/// `expr` equals one of `values`.
pub fn one_of<T: Into<Expr>>(expr: &Expr, values: impl IntoIterator<Item = T>) -> Expr {
    or(values.into_iter().map(|v| expr.eq(v)))
}

impl From<SymbolId> for Expr {
    fn from(id: SymbolId) -> Self {
        Expr::Symbol(id)
    }
}

impl From<Const> for Expr {
    fn from(c: Const) -> Self {
        Expr::Const(c)
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Const(Const::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(r: f64) -> Self {
        Expr::Const(Const::Real(r))
    }
}

impl From<f32> for Expr {
    fn from(r: f32) -> Self {
        Expr::Const(Const::Real(f64::from(r)))
    }
}

macro_rules! int_into_expr {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(i: $t) -> Self {
                    Expr::Const(Const::Int(i as i128))
                }
            }
        )*
    };
}

int_into_expr!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Into<Expr>> ops::$trait<T> for Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                Expr::Binary {
                    op: $op,
                    lhs: Box::new(self),
                    rhs: Box::new(rhs.into()),
                }
            }
        }

        impl<T: Into<Expr>> ops::$trait<T> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: T) -> Expr {
                Expr::Binary {
                    op: $op,
                    lhs: Box::new(self.clone()),
                    rhs: Box::new(rhs.into()),
                }
            }
        }

        binary_operator!(@reversed $trait, $method, $op, i32, i64, i128, u32, u64, f64);
    };
    (@reversed $trait:ident, $method:ident, $op:expr, $($t:ty),*) => {
        $(
            impl ops::$trait<Expr> for $t {
                type Output = Expr;

                fn $method(self, rhs: Expr) -> Expr {
                    Expr::Binary {
                        op: $op,
                        lhs: Box::new(Expr::from(self)),
                        rhs: Box::new(rhs),
                    }
                }
            }
        )*
    };
}

binary_operator!(Add, add, BinaryOp::Add);
binary_operator!(Sub, sub, BinaryOp::Sub);
binary_operator!(Mul, mul, BinaryOp::Mul);
binary_operator!(Div, div, BinaryOp::Div);
binary_operator!(Rem, rem, BinaryOp::Rem);
binary_operator!(BitAnd, bitand, BinaryOp::And);
binary_operator!(BitOr, bitor, BinaryOp::Or);
binary_operator!(BitXor, bitxor, BinaryOp::Xor);
binary_operator!(Shl, shl, BinaryOp::Shl);
binary_operator!(Shr, shr, BinaryOp::Shr);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            arg: Box::new(self),
        }
    }
}

impl ops::Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        -self.clone()
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        not(self)
    }
}

impl ops::Not for &Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        not(self.clone())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "neg"),
            UnaryOp::Not => write!(f, "not"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(name)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, head: &str, items: &[Expr]) -> fmt::Result {
    write!(f, "({head}")?;
    for item in items {
        write!(f, " {item}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Symbol(id) => write!(f, "{id}"),
            Expr::Unary { op, arg } => write!(f, "({op} {arg})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({op} {lhs} {rhs})"),
            Expr::Compare { op, lhs, rhs } => write!(f, "({op} {lhs} {rhs})"),
            Expr::Extract { hi, lo, arg } => write!(f, "(extract {hi} {lo} {arg})"),
            Expr::And(items) => write_list(f, "and", items),
            Expr::Or(items) => write_list(f, "or", items),
            Expr::Implies(lhs, rhs) => write!(f, "(=> {lhs} {rhs})"),
            Expr::Ite {
                cond,
                then,
                otherwise,
            } => write!(f, "(ite {cond} {then} {otherwise})"),
        }
    }
}
