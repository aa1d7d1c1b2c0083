//! Lowering of [`Expr`] trees onto the gate circuit.
//!
//! Three kinds of word flow through the encoder:
//! - unsigned words (`BitVec` symbols) wrap modulo `2^width`;
//! - signed words (`Int` symbols) widen on every operation so results are
//!   exact;
//! - scaled signed words (`Real` symbols) are fixed-point numbers carrying a
//!   number of fractional bits.
//!
//! Literals stay unmaterialized until they meet a symbolic operand and then
//! adopt its representation.

use crv_ir::expr::{BinaryOp, CmpOp, Const, Expr, UnaryOp};
use crv_ir::sort::Sort;
use varisat::Lit;

use crate::circuit::{Bits, Circuit};
use crate::error::SolverError;
use crate::solver::SolverConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WordKind {
    Unsigned,
    Signed { scale: u32 },
}

#[derive(Debug, Clone)]
pub(crate) struct Word {
    pub bits: Bits,
    pub kind: WordKind,
}

impl Word {
    fn width(&self) -> usize {
        self.bits.len()
    }

    fn scale(&self) -> u32 {
        match self.kind {
            WordKind::Unsigned => 0,
            WordKind::Signed { scale } => scale,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Encoded {
    Bool(Lit),
    Word(Word),
    Const(Const),
}

impl Encoded {
    fn describe(&self) -> String {
        match self {
            Encoded::Bool(_) => "bool".to_string(),
            Encoded::Word(w) => match w.kind {
                WordKind::Unsigned => format!("bv{}", w.width()),
                WordKind::Signed { scale: 0 } => format!("int{}", w.width()),
                WordKind::Signed { scale } => format!("fixed{}.{}", w.width(), scale),
            },
            Encoded::Const(c) => format!("constant {c}"),
        }
    }
}

/// The bits backing one declared symbol.
#[derive(Debug, Clone)]
pub(crate) struct SymbolEntry {
    pub sort: Sort,
    pub bits: Bits,
}

impl SymbolEntry {
    fn encoded(&self) -> Encoded {
        match self.sort {
            Sort::Bool => Encoded::Bool(self.bits[0]),
            Sort::BitVec { .. } => Encoded::Word(Word {
                bits: self.bits.clone(),
                kind: WordKind::Unsigned,
            }),
            Sort::Int { .. } => Encoded::Word(Word {
                bits: self.bits.clone(),
                kind: WordKind::Signed { scale: 0 },
            }),
            Sort::Real { frac_bits, .. } => Encoded::Word(Word {
                bits: self.bits.clone(),
                kind: WordKind::Signed { scale: frac_bits },
            }),
        }
    }
}

/// How a real literal is brought onto a fixed-point grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rounding {
    /// Arithmetic: an integer partner is promoted to the default scale.
    Arith,
    Nearest,
    Floor,
    Ceil,
}

const REAL_LIMIT: f64 = 8.507_059_173_023_462e37; // 2^126

/// Minimal two's-complement width holding `value`.
pub(crate) fn signed_width(value: i128) -> usize {
    let magnitude = if value < 0 { !value } else { value };
    (128 - magnitude.leading_zeros() as usize) + 1
}

fn scale_real(value: f64, scale: u32, rounding: Rounding) -> Result<(i128, bool), SolverError> {
    let scaled = value * 2f64.powi(scale as i32);
    if !scaled.is_finite() || scaled.abs() >= REAL_LIMIT {
        return Err(SolverError::Unsupported(format!(
            "real literal {value} is outside the fixed-point range"
        )));
    }
    let exact = scaled.fract() == 0.0;
    let rounded = match rounding {
        Rounding::Floor => scaled.floor(),
        Rounding::Ceil => scaled.ceil(),
        Rounding::Arith | Rounding::Nearest => scaled.round(),
    };
    Ok((rounded as i128, exact))
}

fn const_int(c: Const) -> Option<i128> {
    match c {
        Const::Int(i) => Some(i),
        Const::Bool(b) => Some(i128::from(b)),
        Const::Real(_) => None,
    }
}

fn const_real(c: Const) -> f64 {
    match c {
        Const::Int(i) => i as f64,
        Const::Bool(b) => f64::from(u8::from(b)),
        Const::Real(r) => r,
    }
}

pub(crate) struct Encoder<'a> {
    pub circuit: &'a mut Circuit,
    pub symbols: &'a [SymbolEntry],
    pub config: &'a SolverConfig,
}

impl Encoder<'_> {
    pub fn encode_bool(&mut self, expr: &Expr) -> Result<Lit, SolverError> {
        match self.encode(expr)? {
            Encoded::Bool(lit) => Ok(lit),
            Encoded::Const(Const::Bool(b)) => Ok(self.circuit.constant(b)),
            other => Err(SolverError::NotBoolean(format!(
                "{} in {expr}",
                other.describe()
            ))),
        }
    }

    fn encode(&mut self, expr: &Expr) -> Result<Encoded, SolverError> {
        match expr {
            Expr::Const(c) => Ok(Encoded::Const(*c)),
            Expr::Symbol(id) => self
                .symbols
                .get(id.0 as usize)
                .map(SymbolEntry::encoded)
                .ok_or(SolverError::UnknownSymbol(*id)),
            Expr::Unary { op, arg } => {
                let value = self.encode(arg)?;
                self.unary(*op, value)
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = self.encode(lhs)?;
                let b = self.encode(rhs)?;
                self.binary(*op, a, b)
            }
            Expr::Compare { op, lhs, rhs } => {
                let a = self.encode(lhs)?;
                let b = self.encode(rhs)?;
                self.compare(*op, a, b)
            }
            Expr::Extract { hi, lo, arg } => {
                let value = self.encode(arg)?;
                self.extract(*hi, *lo, value)
            }
            Expr::And(items) => {
                let lits = items
                    .iter()
                    .map(|e| self.encode_bool(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Encoded::Bool(self.circuit.and_many(&lits)))
            }
            Expr::Or(items) => {
                let lits = items
                    .iter()
                    .map(|e| self.encode_bool(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Encoded::Bool(self.circuit.or_many(&lits)))
            }
            Expr::Implies(lhs, rhs) => {
                let a = self.encode_bool(lhs)?;
                let b = self.encode_bool(rhs)?;
                Ok(Encoded::Bool(self.circuit.or2(!a, b)))
            }
            Expr::Ite {
                cond,
                then,
                otherwise,
            } => {
                let sel = self.encode_bool(cond)?;
                let a = self.encode(then)?;
                let b = self.encode(otherwise)?;
                self.ite(sel, a, b)
            }
        }
    }

    fn checked(&self, word: Word) -> Result<Word, SolverError> {
        let limit = self.config.max_word_width;
        if word.width() > limit as usize {
            return Err(SolverError::WidthLimit {
                width: word.width() as u32,
                limit,
            });
        }
        Ok(word)
    }

    fn bool_operand(&self, value: &Encoded) -> Option<Lit> {
        match value {
            Encoded::Bool(lit) => Some(*lit),
            Encoded::Const(Const::Bool(b)) => Some(self.circuit.constant(*b)),
            _ => None,
        }
    }

    /// Booleans used as numbers become one-bit words.
    fn numeric(&self, value: Encoded) -> Encoded {
        match value {
            Encoded::Bool(lit) => Encoded::Word(Word {
                bits: vec![lit],
                kind: WordKind::Unsigned,
            }),
            Encoded::Const(Const::Bool(b)) => Encoded::Const(Const::Int(i128::from(b))),
            other => other,
        }
    }

    fn unary(&mut self, op: UnaryOp, value: Encoded) -> Result<Encoded, SolverError> {
        let unsupported = |v: &Encoded| SolverError::Unsupported(format!("{op} on {}", v.describe()));
        match (op, value) {
            (UnaryOp::Not, Encoded::Bool(lit)) => Ok(Encoded::Bool(!lit)),
            (UnaryOp::Not, Encoded::Const(Const::Bool(b))) => Ok(Encoded::Const(Const::Bool(!b))),
            (UnaryOp::Not, Encoded::Const(Const::Int(i))) => Ok(Encoded::Const(Const::Int(!i))),
            (UnaryOp::Not, Encoded::Word(w)) if w.scale() == 0 => Ok(Encoded::Word(Word {
                bits: w.bits.iter().map(|&l| !l).collect(),
                kind: w.kind,
            })),
            (UnaryOp::Neg, Encoded::Const(Const::Int(i))) => {
                Ok(Encoded::Const(Const::Int(i.wrapping_neg())))
            }
            (UnaryOp::Neg, Encoded::Const(Const::Real(r))) => Ok(Encoded::Const(Const::Real(-r))),
            (UnaryOp::Neg, Encoded::Word(w)) => match w.kind {
                WordKind::Unsigned => Ok(Encoded::Word(Word {
                    bits: self.circuit.neg(&w.bits),
                    kind: w.kind,
                })),
                WordKind::Signed { .. } => {
                    let wide = self.circuit.sign_extend(&w.bits, w.width() + 1);
                    let bits = self.circuit.neg(&wide);
                    Ok(Encoded::Word(self.checked(Word { bits, kind: w.kind })?))
                }
            },
            (UnaryOp::Neg, Encoded::Bool(lit)) => {
                let value = self.numeric(Encoded::Bool(lit));
                self.unary(op, value)
            }
            (_, other) => Err(unsupported(&other)),
        }
    }

    fn fold(&self, op: BinaryOp, a: Const, b: Const) -> Result<Const, SolverError> {
        if let (Some(x), Some(y)) = (const_int(a), const_int(b)) {
            let value = match op {
                BinaryOp::Add => x.wrapping_add(y),
                BinaryOp::Sub => x.wrapping_sub(y),
                BinaryOp::Mul => x.wrapping_mul(y),
                BinaryOp::Div if y == 0 => 0,
                BinaryOp::Div => x.wrapping_div(y),
                BinaryOp::Rem if y == 0 => x,
                BinaryOp::Rem => x.wrapping_rem(y),
                BinaryOp::And => x & y,
                BinaryOp::Or => x | y,
                BinaryOp::Xor => x ^ y,
                BinaryOp::Shl | BinaryOp::Shr if y < 0 => {
                    return Err(SolverError::Unsupported(format!("shift by {y}")))
                }
                BinaryOp::Shl if y >= 128 => 0,
                BinaryOp::Shl => x.wrapping_shl(y as u32),
                BinaryOp::Shr => x >> y.min(127),
            };
            return Ok(Const::Int(value));
        }
        let (x, y) = (const_real(a), const_real(b));
        let value = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div => x / y,
            BinaryOp::Rem => x % y,
            _ => {
                return Err(SolverError::Unsupported(format!(
                    "{op} on real literals {a} and {b}"
                )))
            }
        };
        Ok(Const::Real(value))
    }

    fn binary(&mut self, op: BinaryOp, a: Encoded, b: Encoded) -> Result<Encoded, SolverError> {
        if matches!(op, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor) {
            if let (Some(x), Some(y)) = (self.bool_operand(&a), self.bool_operand(&b)) {
                let lit = match op {
                    BinaryOp::And => self.circuit.and2(x, y),
                    BinaryOp::Or => self.circuit.or2(x, y),
                    _ => self.circuit.xor2(x, y),
                };
                return Ok(Encoded::Bool(lit));
            }
        }
        let a = self.numeric(a);
        let b = self.numeric(b);
        if let (Encoded::Const(x), Encoded::Const(y)) = (&a, &b) {
            return Ok(Encoded::Const(self.fold(op, *x, *y)?));
        }
        if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
            return self.shift(op, a, b);
        }
        let (x, y) = self.unify(a, b, Rounding::Arith)?;
        self.word_op(op, x, y).map(Encoded::Word)
    }

    fn word_op(&mut self, op: BinaryOp, x: Word, y: Word) -> Result<Word, SolverError> {
        let c = &mut *self.circuit;
        let scale = match x.kind {
            WordKind::Unsigned => {
                let bits = match op {
                    BinaryOp::Add => c.add(&x.bits, &y.bits),
                    BinaryOp::Sub => c.sub(&x.bits, &y.bits),
                    BinaryOp::Mul => c.mul(&x.bits, &y.bits),
                    BinaryOp::Div => c.udivrem(&x.bits, &y.bits).0,
                    BinaryOp::Rem => c.udivrem(&x.bits, &y.bits).1,
                    BinaryOp::And => c.bitwise(&x.bits, &y.bits, Circuit::and2),
                    BinaryOp::Or => c.bitwise(&x.bits, &y.bits, Circuit::or2),
                    BinaryOp::Xor => c.bitwise(&x.bits, &y.bits, Circuit::xor2),
                    BinaryOp::Shl | BinaryOp::Shr => {
                        return Err(SolverError::Unsupported(format!("{op} outside shift lowering")))
                    }
                };
                return Ok(Word { bits, kind: x.kind });
            }
            WordKind::Signed { scale } => scale,
        };
        let width = x.width();
        let bits = match op {
            BinaryOp::Add | BinaryOp::Sub => {
                let a = c.sign_extend(&x.bits, width + 1);
                let b = c.sign_extend(&y.bits, width + 1);
                if op == BinaryOp::Add {
                    c.add(&a, &b)
                } else {
                    c.sub(&a, &b)
                }
            }
            BinaryOp::Mul => {
                let a = c.sign_extend(&x.bits, 2 * width);
                let b = c.sign_extend(&y.bits, 2 * width);
                let product = c.mul(&a, &b);
                // back onto the operand grid; fractional bits below it are floored
                c.shr_const(&product, scale as usize, true)[..2 * width - scale as usize].to_vec()
            }
            BinaryOp::Div if scale == 0 => c.sdivrem(&x.bits, &y.bits).0,
            BinaryOp::Div => {
                let wide = width + scale as usize;
                let a = c.sign_extend(&x.bits, wide);
                let a = c.shl_const(&a, scale as usize);
                let b = c.sign_extend(&y.bits, wide);
                c.sdivrem(&a, &b).0
            }
            BinaryOp::Rem if scale == 0 => c.sdivrem(&x.bits, &y.bits).1,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor if scale == 0 => {
                let f = match op {
                    BinaryOp::And => Circuit::and2,
                    BinaryOp::Or => Circuit::or2,
                    _ => Circuit::xor2,
                };
                c.bitwise(&x.bits, &y.bits, f)
            }
            _ => {
                return Err(SolverError::Unsupported(format!(
                    "{op} on fixed-point operands"
                )))
            }
        };
        self.checked(Word { bits, kind: x.kind })
    }

    fn shift(&mut self, op: BinaryOp, a: Encoded, b: Encoded) -> Result<Encoded, SolverError> {
        let left = op == BinaryOp::Shl;
        let value = match (a, &b) {
            (Encoded::Word(w), _) => w,
            (Encoded::Const(c), Encoded::Word(partner)) => self.materialize(c, partner, Rounding::Nearest)?,
            (a, b) => {
                return Err(SolverError::Unsupported(format!(
                    "{op} on {} and {}",
                    a.describe(),
                    b.describe()
                )))
            }
        };
        if value.scale() != 0 {
            return Err(SolverError::Unsupported(format!("{op} on a fixed-point operand")));
        }
        let signed = value.kind != WordKind::Unsigned;
        match b {
            Encoded::Const(c) => {
                let amount = const_int(c)
                    .filter(|k| *k >= 0)
                    .ok_or_else(|| SolverError::Unsupported(format!("shift by {c}")))?;
                let amount = usize::try_from(amount).unwrap_or(usize::MAX);
                let bits = if left && signed {
                    let width = value.width().saturating_add(amount);
                    if width > self.config.max_word_width as usize {
                        return Err(SolverError::WidthLimit {
                            width: width.min(u32::MAX as usize) as u32,
                            limit: self.config.max_word_width,
                        });
                    }
                    let wide = self.circuit.sign_extend(&value.bits, width);
                    self.circuit.shl_const(&wide, amount)
                } else if left {
                    self.circuit.shl_const(&value.bits, amount)
                } else {
                    self.circuit.shr_const(&value.bits, amount, signed)
                };
                Ok(Encoded::Word(Word { bits, kind: value.kind }))
            }
            Encoded::Word(amount) => {
                if left && signed {
                    return Err(SolverError::Unsupported(
                        "left shift of an integer by a symbolic amount".to_string(),
                    ));
                }
                let bits = self.circuit.shift(&value.bits, &amount.bits, left, signed);
                Ok(Encoded::Word(Word { bits, kind: value.kind }))
            }
            Encoded::Bool(_) => Err(SolverError::Unsupported(format!("{op} by a boolean"))),
        }
    }

    /// Builds a word for literal `c` in the representation of `partner`.
    fn materialize(&self, c: Const, partner: &Word, rounding: Rounding) -> Result<Word, SolverError> {
        match partner.kind {
            WordKind::Unsigned => {
                let value = match c {
                    Const::Real(r) => scale_real(r, 0, rounding)?.0,
                    other => const_int(other).unwrap_or_default(),
                };
                Ok(Word {
                    bits: self.circuit.const_bits(value, partner.width() as u32),
                    kind: WordKind::Unsigned,
                })
            }
            WordKind::Signed { scale } => {
                let (value, scale) = match c {
                    Const::Real(r) if scale == 0 && rounding == Rounding::Arith => {
                        let frac = self.config.real_frac_bits;
                        (scale_real(r, frac, rounding)?.0, frac)
                    }
                    Const::Real(r) => (scale_real(r, scale, rounding)?.0, scale),
                    other => {
                        let value = const_int(other).unwrap_or_default();
                        let scaled = value.checked_shl(scale).filter(|v| v >> scale == value);
                        let scaled = scaled.ok_or_else(|| {
                            SolverError::Unsupported(format!("literal {value} is outside the fixed-point range"))
                        })?;
                        (scaled, scale)
                    }
                };
                Ok(self.signed_const(value, scale))
            }
        }
    }

    fn signed_const(&self, value: i128, scale: u32) -> Word {
        let width = signed_width(value);
        Word {
            bits: self.circuit.const_bits(value, width as u32),
            kind: WordKind::Signed { scale },
        }
    }

    fn unify(&mut self, a: Encoded, b: Encoded, rounding: Rounding) -> Result<(Word, Word), SolverError> {
        let (x, y) = match (a, b) {
            (Encoded::Word(x), Encoded::Word(y)) => (x, y),
            (Encoded::Word(x), Encoded::Const(c)) => {
                let y = self.materialize(c, &x, rounding)?;
                (x, y)
            }
            (Encoded::Const(c), Encoded::Word(y)) => {
                let x = self.materialize(c, &y, rounding)?;
                (x, y)
            }
            (Encoded::Const(c), Encoded::Const(d)) => {
                let real = matches!(c, Const::Real(_)) || matches!(d, Const::Real(_));
                let scale = if real { self.config.real_frac_bits } else { 0 };
                let to_word = |k: Const| -> Result<Word, SolverError> {
                    let value = match k {
                        Const::Real(r) => scale_real(r, scale, Rounding::Nearest)?.0,
                        other => const_int(other).unwrap_or_default() << scale,
                    };
                    Ok(self.signed_const(value, scale))
                };
                (to_word(c)?, to_word(d)?)
            }
            (a, b) => {
                return Err(SolverError::Unsupported(format!(
                    "cannot combine {} with {}",
                    a.describe(),
                    b.describe()
                )))
            }
        };
        self.align(x, y)
    }

    fn to_signed(&self, word: Word) -> Word {
        match word.kind {
            WordKind::Unsigned => Word {
                bits: self.circuit.zero_extend(&word.bits, word.width() + 1),
                kind: WordKind::Signed { scale: 0 },
            },
            WordKind::Signed { .. } => word,
        }
    }

    fn rescale(&self, word: Word, scale: u32) -> Word {
        let shift = (scale - word.scale()) as usize;
        let mut bits = vec![self.circuit.constant(false); shift];
        bits.extend(word.bits);
        Word {
            bits,
            kind: WordKind::Signed { scale },
        }
    }

    /// Brings two words onto a common representation and width.
    fn align(&self, x: Word, y: Word) -> Result<(Word, Word), SolverError> {
        if x.kind == WordKind::Unsigned && y.kind == WordKind::Unsigned {
            let width = x.width().max(y.width());
            let x = Word {
                bits: self.circuit.zero_extend(&x.bits, width),
                kind: WordKind::Unsigned,
            };
            let y = Word {
                bits: self.circuit.zero_extend(&y.bits, width),
                kind: WordKind::Unsigned,
            };
            return Ok((self.checked(x)?, y));
        }
        let x = self.to_signed(x);
        let y = self.to_signed(y);
        let scale = x.scale().max(y.scale());
        let x = self.rescale(x, scale);
        let y = self.rescale(y, scale);
        let width = x.width().max(y.width());
        let x = Word {
            bits: self.circuit.sign_extend(&x.bits, width),
            kind: x.kind,
        };
        let y = Word {
            bits: self.circuit.sign_extend(&y.bits, width),
            kind: y.kind,
        };
        Ok((self.checked(x)?, y))
    }

    fn compare(&mut self, op: CmpOp, a: Encoded, b: Encoded) -> Result<Encoded, SolverError> {
        let swap = matches!(a, Encoded::Const(_)) && !matches!(b, Encoded::Const(_));
        let (op, a, b) = if swap { (op.flip(), b, a) } else { (op, a, b) };
        if matches!(op, CmpOp::Eq | CmpOp::Ne) {
            if let (Some(x), Some(y)) = (self.bool_operand(&a), self.bool_operand(&b)) {
                let differ = self.circuit.xor2(x, y);
                return Ok(Encoded::Bool(if op == CmpOp::Eq { !differ } else { differ }));
            }
        }
        let a = self.numeric(a);
        let b = self.numeric(b);
        if let (Encoded::Const(x), Encoded::Const(y)) = (&a, &b) {
            let ordering = match (const_int(*x), const_int(*y)) {
                (Some(i), Some(j)) => Some(i.cmp(&j)),
                _ => const_real(*x).partial_cmp(&const_real(*y)),
            };
            let holds = ordering.is_some_and(|o| match op {
                CmpOp::Eq => o.is_eq(),
                CmpOp::Ne => o.is_ne(),
                CmpOp::Lt => o.is_lt(),
                CmpOp::Le => o.is_le(),
                CmpOp::Gt => o.is_gt(),
                CmpOp::Ge => o.is_ge(),
            });
            return Ok(Encoded::Const(Const::Bool(holds)));
        }
        // a real literal off the partner's grid can never be equal to it
        if let (Encoded::Word(w), Encoded::Const(Const::Real(r))) = (&a, &b) {
            if matches!(op, CmpOp::Eq | CmpOp::Ne) && !scale_real(*r, w.scale(), Rounding::Nearest)?.1 {
                return Ok(Encoded::Const(Const::Bool(op == CmpOp::Ne)));
            }
        }
        let rounding = match op {
            CmpOp::Le | CmpOp::Gt => Rounding::Floor,
            CmpOp::Lt | CmpOp::Ge => Rounding::Ceil,
            CmpOp::Eq | CmpOp::Ne => Rounding::Nearest,
        };
        let (x, y) = self.unify(a, b, rounding)?;
        let c = &mut *self.circuit;
        let less = |c: &mut Circuit, p: &Word, q: &Word| match p.kind {
            WordKind::Unsigned => c.ult(&p.bits, &q.bits),
            WordKind::Signed { .. } => c.slt(&p.bits, &q.bits),
        };
        let lit = match op {
            CmpOp::Eq => c.eq(&x.bits, &y.bits),
            CmpOp::Ne => !c.eq(&x.bits, &y.bits),
            CmpOp::Lt => less(c, &x, &y),
            CmpOp::Le => !less(c, &y, &x),
            CmpOp::Gt => less(c, &y, &x),
            CmpOp::Ge => !less(c, &x, &y),
        };
        Ok(Encoded::Bool(lit))
    }

    fn extract(&mut self, hi: u32, lo: u32, value: Encoded) -> Result<Encoded, SolverError> {
        if hi < lo {
            return Err(SolverError::Unsupported(format!("extract {hi} {lo}")));
        }
        let width = (hi - lo + 1) as usize;
        match self.numeric(value) {
            Encoded::Const(c) => {
                let v = const_int(c)
                    .ok_or_else(|| SolverError::Unsupported(format!("extract from {c}")))?;
                let shifted = v >> lo.min(127);
                let masked = if width >= 128 {
                    shifted
                } else {
                    shifted & ((1i128 << width) - 1)
                };
                Ok(Encoded::Const(Const::Int(masked)))
            }
            Encoded::Word(w) if w.scale() == 0 => {
                let full = hi as usize + 1;
                let bits = if w.kind == WordKind::Unsigned {
                    self.circuit.zero_extend(&w.bits, full.max(w.width()))
                } else {
                    self.circuit.sign_extend(&w.bits, full.max(w.width()))
                };
                Ok(Encoded::Word(self.checked(Word {
                    bits: bits[lo as usize..full].to_vec(),
                    kind: WordKind::Unsigned,
                })?))
            }
            other => Err(SolverError::Unsupported(format!(
                "extract from {}",
                other.describe()
            ))),
        }
    }

    fn ite(&mut self, sel: Lit, a: Encoded, b: Encoded) -> Result<Encoded, SolverError> {
        match self.circuit.const_value(sel) {
            Some(true) => return Ok(a),
            Some(false) => return Ok(b),
            None => {}
        }
        if let (Some(x), Some(y)) = (self.bool_operand(&a), self.bool_operand(&b)) {
            return Ok(Encoded::Bool(self.circuit.mux(sel, x, y)));
        }
        let a = self.numeric(a);
        let b = self.numeric(b);
        let (x, y) = self.unify(a, b, Rounding::Arith)?;
        let bits = self.circuit.mux_bits(sel, &x.bits, &y.bits);
        Ok(Encoded::Word(Word { bits, kind: x.kind }))
    }
}
