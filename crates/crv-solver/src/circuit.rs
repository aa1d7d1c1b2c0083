//! Gate-level circuit construction on top of the SAT backend.
//!
//! Every gate is Tseitin-encoded into a fresh variable. Gates whose inputs
//! are the constant literal fold away without touching the solver, so
//! constant operands cost nothing. Words are little-endian vectors of
//! literals (bit 0 first).

use varisat::{solver::Solver, ExtendFormula, Lit, Var};

use crate::error::SolverError;

pub(crate) type Bits = Vec<Lit>;

pub(crate) struct Circuit {
    sat: Solver<'static>,
    next_var: usize,
    true_lit: Lit,
}

impl Circuit {
    pub fn new() -> Self {
        let mut sat = Solver::new();
        let true_lit = Var::from_index(0).positive();
        sat.add_clause(&[true_lit]);
        Self {
            sat,
            next_var: 1,
            true_lit,
        }
    }

    pub fn fresh(&mut self) -> Lit {
        let var = Var::from_index(self.next_var);
        self.next_var += 1;
        var.positive()
    }

    /// A fresh literal the solver tracks even when no clause mentions it.
    pub fn input(&mut self) -> Lit {
        let lit = self.fresh();
        self.sat.add_clause(&[lit, !lit]);
        lit
    }

    pub fn constant(&self, value: bool) -> Lit {
        if value {
            self.true_lit
        } else {
            !self.true_lit
        }
    }

    pub fn const_value(&self, lit: Lit) -> Option<bool> {
        if lit == self.true_lit {
            Some(true)
        } else if lit == !self.true_lit {
            Some(false)
        } else {
            None
        }
    }

    pub fn num_vars(&self) -> usize {
        self.next_var
    }

    pub fn add_clause(&mut self, clause: &[Lit]) {
        self.sat.add_clause(clause);
    }

    /// Solve under `assumptions`; on success returns the assignment indexed
    /// by variable.
    pub fn solve(&mut self, assumptions: &[Lit]) -> Result<Option<Vec<bool>>, SolverError> {
        self.sat.assume(assumptions);
        match self.sat.solve() {
            Ok(true) => {
                let model = self
                    .sat
                    .model()
                    .ok_or_else(|| SolverError::Backend("SAT but no model returned".to_string()))?;
                let mut values = vec![false; self.next_var];
                for lit in model {
                    let index = lit.var().index();
                    if index < values.len() {
                        values[index] = lit.is_positive();
                    }
                }
                Ok(Some(values))
            }
            Ok(false) => Ok(None),
            Err(e) => Err(SolverError::Backend(e.to_string())),
        }
    }

    // -- single-bit gates --

    pub fn and2(&mut self, a: Lit, b: Lit) -> Lit {
        match (self.const_value(a), self.const_value(b)) {
            (Some(false), _) | (_, Some(false)) => return self.constant(false),
            (Some(true), _) => return b,
            (_, Some(true)) => return a,
            _ => {}
        }
        if a == b {
            return a;
        }
        if a == !b {
            return self.constant(false);
        }
        let out = self.fresh();
        self.sat.add_clause(&[!out, a]);
        self.sat.add_clause(&[!out, b]);
        self.sat.add_clause(&[out, !a, !b]);
        out
    }

    pub fn or2(&mut self, a: Lit, b: Lit) -> Lit {
        !self.and2(!a, !b)
    }

    pub fn and_many(&mut self, lits: &[Lit]) -> Lit {
        let mut inputs = Vec::with_capacity(lits.len());
        for &lit in lits {
            match self.const_value(lit) {
                Some(false) => return self.constant(false),
                Some(true) => {}
                None => {
                    if inputs.contains(&!lit) {
                        return self.constant(false);
                    }
                    if !inputs.contains(&lit) {
                        inputs.push(lit);
                    }
                }
            }
        }
        match inputs.len() {
            0 => self.constant(true),
            1 => inputs[0],
            2 => self.and2(inputs[0], inputs[1]),
            _ => {
                let out = self.fresh();
                let mut long = Vec::with_capacity(inputs.len() + 1);
                long.push(out);
                for &lit in &inputs {
                    self.sat.add_clause(&[!out, lit]);
                    long.push(!lit);
                }
                self.sat.add_clause(&long);
                out
            }
        }
    }

    pub fn or_many(&mut self, lits: &[Lit]) -> Lit {
        let negated: Vec<Lit> = lits.iter().map(|&l| !l).collect();
        !self.and_many(&negated)
    }

    pub fn xor2(&mut self, a: Lit, b: Lit) -> Lit {
        match (self.const_value(a), self.const_value(b)) {
            (Some(x), Some(y)) => return self.constant(x ^ y),
            (Some(false), _) => return b,
            (Some(true), _) => return !b,
            (_, Some(false)) => return a,
            (_, Some(true)) => return !a,
            _ => {}
        }
        if a == b {
            return self.constant(false);
        }
        if a == !b {
            return self.constant(true);
        }
        let out = self.fresh();
        self.sat.add_clause(&[!out, a, b]);
        self.sat.add_clause(&[!out, !a, !b]);
        self.sat.add_clause(&[out, !a, b]);
        self.sat.add_clause(&[out, a, !b]);
        out
    }

    /// `sel ? then : otherwise`
    pub fn mux(&mut self, sel: Lit, then: Lit, otherwise: Lit) -> Lit {
        match self.const_value(sel) {
            Some(true) => return then,
            Some(false) => return otherwise,
            None => {}
        }
        if then == otherwise {
            return then;
        }
        match (self.const_value(then), self.const_value(otherwise)) {
            (Some(true), Some(false)) => return sel,
            (Some(false), Some(true)) => return !sel,
            (Some(true), _) => return self.or2(sel, otherwise),
            (Some(false), _) => return self.and2(!sel, otherwise),
            (_, Some(true)) => return self.or2(!sel, then),
            (_, Some(false)) => return self.and2(sel, then),
            _ => {}
        }
        let out = self.fresh();
        self.sat.add_clause(&[!sel, !then, out]);
        self.sat.add_clause(&[!sel, then, !out]);
        self.sat.add_clause(&[sel, !otherwise, out]);
        self.sat.add_clause(&[sel, otherwise, !out]);
        out
    }

    fn full_add(&mut self, a: Lit, b: Lit, carry: Lit) -> (Lit, Lit) {
        let half = self.xor2(a, b);
        let sum = self.xor2(half, carry);
        let both = self.and2(a, b);
        let propagate = self.and2(half, carry);
        let carry_out = self.or2(both, propagate);
        (sum, carry_out)
    }

    // -- word gates; operands must share a width unless noted --

    pub fn const_bits(&self, value: i128, width: u32) -> Bits {
        (0..width)
            .map(|i| self.constant((value >> i.min(127)) & 1 == 1))
            .collect()
    }

    /// Reads a constant word back, if every bit is constant.
    #[cfg(test)]
    pub fn const_word(&self, bits: &[Lit], signed: bool) -> Option<i128> {
        if bits.len() > 128 {
            return None;
        }
        let mut value: i128 = 0;
        for (i, &bit) in bits.iter().enumerate() {
            if self.const_value(bit)? {
                value |= 1i128 << i;
            }
        }
        let width = bits.len();
        if signed && width < 128 && width > 0 && (value >> (width - 1)) & 1 == 1 {
            value |= -1i128 << width;
        }
        Some(value)
    }

    pub fn zero_extend(&self, bits: &[Lit], width: usize) -> Bits {
        let mut out: Bits = bits.iter().copied().take(width).collect();
        out.resize(width, self.constant(false));
        out
    }

    pub fn sign_extend(&self, bits: &[Lit], width: usize) -> Bits {
        let fill = bits.last().copied().unwrap_or(self.constant(false));
        let mut out: Bits = bits.iter().copied().take(width).collect();
        out.resize(width, fill);
        out
    }

    fn add_with_carry(&mut self, a: &[Lit], b: &[Lit], carry_in: Lit) -> (Bits, Lit) {
        let mut carry = carry_in;
        let mut out = Vec::with_capacity(a.len());
        for (&x, &y) in a.iter().zip(b) {
            let (sum, next) = self.full_add(x, y, carry);
            out.push(sum);
            carry = next;
        }
        (out, carry)
    }

    pub fn add(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let zero = self.constant(false);
        self.add_with_carry(a, b, zero).0
    }

    pub fn sub(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let inverted: Bits = b.iter().map(|&l| !l).collect();
        let one = self.constant(true);
        self.add_with_carry(a, &inverted, one).0
    }

    pub fn neg(&mut self, a: &[Lit]) -> Bits {
        let zero = self.const_bits(0, a.len() as u32);
        self.sub(&zero, a)
    }

    /// Product truncated to the operand width.
    pub fn mul(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let width = a.len();
        let mut acc = self.const_bits(0, width as u32);
        for (i, &sel) in b.iter().enumerate().take(width) {
            if self.const_value(sel) == Some(false) {
                continue;
            }
            let mut partial = self.const_bits(0, i as u32);
            for &bit in a.iter().take(width - i) {
                partial.push(self.and2(bit, sel));
            }
            acc = self.add(&acc, &partial);
        }
        acc
    }

    pub fn eq(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let mut same = Vec::with_capacity(a.len());
        for (&x, &y) in a.iter().zip(b) {
            same.push(!self.xor2(x, y));
        }
        self.and_many(&same)
    }

    pub fn ult(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let inverted: Bits = b.iter().map(|&l| !l).collect();
        let one = self.constant(true);
        let (_, carry) = self.add_with_carry(a, &inverted, one);
        !carry
    }

    pub fn slt(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let mut a = a.to_vec();
        let mut b = b.to_vec();
        if let (Some(x), Some(y)) = (a.last_mut(), b.last_mut()) {
            *x = !*x;
            *y = !*y;
        }
        self.ult(&a, &b)
    }

    pub fn mux_bits(&mut self, sel: Lit, then: &[Lit], otherwise: &[Lit]) -> Bits {
        then.iter()
            .zip(otherwise)
            .map(|(&t, &e)| self.mux(sel, t, e))
            .collect()
    }

    pub fn bitwise(&mut self, a: &[Lit], b: &[Lit], f: fn(&mut Self, Lit, Lit) -> Lit) -> Bits {
        a.iter().zip(b).map(|(&x, &y)| f(self, x, y)).collect()
    }

    /// Unsigned restoring division. A zero divisor yields an all-ones
    /// quotient and leaves the dividend as remainder.
    pub fn udivrem(&mut self, a: &[Lit], b: &[Lit]) -> (Bits, Bits) {
        let width = a.len();
        let divisor = self.zero_extend(b, width + 1);
        let mut rem = self.const_bits(0, width as u32 + 1);
        let mut quot = vec![self.constant(false); width];
        for i in (0..width).rev() {
            let mut shifted = Vec::with_capacity(width + 1);
            shifted.push(a[i]);
            shifted.extend_from_slice(&rem[..width]);
            let below = self.ult(&shifted, &divisor);
            let diff = self.sub(&shifted, &divisor);
            rem = self.mux_bits(below, &shifted, &diff);
            quot[i] = !below;
        }
        rem.truncate(width);
        (quot, rem)
    }

    /// Signed division truncating toward zero. `x / 0 == 0` and `x % 0 == x`.
    /// Operands are widened by one bit so the most negative dividend cannot
    /// overflow.
    pub fn sdivrem(&mut self, a: &[Lit], b: &[Lit]) -> (Bits, Bits) {
        let width = a.len() + 1;
        let a = self.sign_extend(a, width);
        let b = self.sign_extend(b, width);
        let a_neg = a[width - 1];
        let b_neg = b[width - 1];
        let a_negated = self.neg(&a);
        let b_negated = self.neg(&b);
        let a_abs = self.mux_bits(a_neg, &a_negated, &a);
        let b_abs = self.mux_bits(b_neg, &b_negated, &b);
        let (q_abs, r_abs) = self.udivrem(&a_abs, &b_abs);

        let zero = self.const_bits(0, width as u32);
        let b_zero = self.eq(&b, &zero);
        let q_negated = self.neg(&q_abs);
        let signs_differ = self.xor2(a_neg, b_neg);
        let quot = self.mux_bits(signs_differ, &q_negated, &q_abs);
        let quot = self.mux_bits(b_zero, &zero, &quot);
        let r_negated = self.neg(&r_abs);
        let rem = self.mux_bits(a_neg, &r_negated, &r_abs);
        (quot, rem)
    }

    pub fn shl_const(&self, a: &[Lit], amount: usize) -> Bits {
        let width = a.len();
        let mut out = vec![self.constant(false); amount.min(width)];
        out.extend(a.iter().copied().take(width.saturating_sub(amount)));
        out
    }

    pub fn shr_const(&self, a: &[Lit], amount: usize, arithmetic: bool) -> Bits {
        let width = a.len();
        let fill = if arithmetic {
            a.last().copied().unwrap_or(self.constant(false))
        } else {
            self.constant(false)
        };
        let mut out: Bits = a.iter().copied().skip(amount).collect();
        out.resize(width, fill);
        out
    }

    /// Barrel shifter; `amount` is read as an unsigned word.
    pub fn shift(&mut self, a: &[Lit], amount: &[Lit], left: bool, arithmetic: bool) -> Bits {
        let width = a.len();
        let mut cur = a.to_vec();
        for (j, &sel) in amount.iter().enumerate() {
            let step = if j < usize::BITS as usize - 1 {
                1usize << j
            } else {
                usize::MAX
            };
            let shifted = if left {
                self.shl_const(&cur, step.min(width))
            } else {
                self.shr_const(&cur, step.min(width), arithmetic)
            };
            cur = self.mux_bits(sel, &shifted, &cur);
        }
        cur
    }
}
