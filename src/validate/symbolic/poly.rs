//! Rational-coefficient multivariate polynomials.
//!
//! The normal form behind symbolic equivalence checking. All arithmetic is
//! checked; overflow surfaces as `None` and the parser converts it into a
//! local parse failure, never a panic.

use std::collections::BTreeMap;

/// A reduced rational number with positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    num: i64,
    den: i64,
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

impl Rational {
    pub const ZERO: Self = Self { num: 0, den: 1 };
    pub const ONE: Self = Self { num: 1, den: 1 };

    /// Reduction happens in i128 so `i64::MIN` inputs cannot overflow on
    /// sign normalization; values that do not fit back into i64 yield None.
    pub fn new(num: i64, den: i64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let mut num = num as i128;
        let mut den = den as i128;
        if den < 0 {
            num = -num;
            den = -den;
        }
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1) as i128;
        Some(Self {
            num: i64::try_from(num / g).ok()?,
            den: i64::try_from(den / g).ok()?,
        })
    }

    pub fn from_integer(n: i64) -> Self {
        Self { num: n, den: 1 }
    }

    /// Parse a decimal literal such as `3`, `2.5`, or `.75`.
    pub fn from_decimal(text: &str) -> Option<Self> {
        match text.split_once('.') {
            None => text.parse::<i64>().ok().map(Self::from_integer),
            Some((whole, frac)) => {
                if !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                // Sentence-final periods leave numbers like "4."
                if frac.is_empty() {
                    if whole.is_empty() {
                        return None;
                    }
                    return whole.parse::<i64>().ok().map(Self::from_integer);
                }
                let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
                let frac_value: i64 = frac.parse().ok()?;
                let scale = 10i64.checked_pow(frac.len() as u32)?;
                let num = whole.checked_mul(scale)?.checked_add(frac_value)?;
                Self::new(num, scale)
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        let num = self
            .num
            .checked_mul(other.den)?
            .checked_add(other.num.checked_mul(self.den)?)?;
        Self::new(num, self.den.checked_mul(other.den)?)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.checked_add(other.checked_neg()?)
    }

    pub fn checked_mul(self, other: Self) -> Option<Self> {
        Self::new(
            self.num.checked_mul(other.num)?,
            self.den.checked_mul(other.den)?,
        )
    }

    pub fn checked_div(self, other: Self) -> Option<Self> {
        if other.is_zero() {
            return None;
        }
        Self::new(
            self.num.checked_mul(other.den)?,
            self.den.checked_mul(other.num)?,
        )
    }

    pub fn checked_neg(self) -> Option<Self> {
        Some(Self {
            num: self.num.checked_neg()?,
            den: self.den,
        })
    }
}

/// A monomial: variable name to (positive) exponent.
pub type Monomial = BTreeMap<String, u32>;

/// A multivariate polynomial in canonical form: monomial -> nonzero
/// coefficient. Two polynomials are algebraically equal iff their canonical
/// forms are equal, so `PartialEq` is the equivalence check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, Rational>,
}

impl Polynomial {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(value: Rational) -> Self {
        let mut p = Self::zero();
        p.insert_term(Monomial::new(), value);
        p
    }

    pub fn variable(name: impl Into<String>) -> Self {
        let mut mono = Monomial::new();
        mono.insert(name.into(), 1);
        let mut p = Self::zero();
        p.insert_term(mono, Rational::ONE);
        p
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// The constant value, if this polynomial has no variables.
    pub fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::ZERO),
            1 => {
                let (mono, coeff) = self.terms.iter().next().unwrap();
                mono.is_empty().then_some(*coeff)
            }
            _ => None,
        }
    }

    fn insert_term(&mut self, mono: Monomial, coeff: Rational) {
        if !coeff.is_zero() {
            self.terms.insert(mono, coeff);
        }
    }

    fn accumulate(&mut self, mono: Monomial, coeff: Rational) -> Option<()> {
        let updated = match self.terms.get(&mono) {
            Some(existing) => existing.checked_add(coeff)?,
            None => coeff,
        };
        if updated.is_zero() {
            self.terms.remove(&mono);
        } else {
            self.terms.insert(mono, updated);
        }
        Some(())
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        let mut out = self.clone();
        for (mono, coeff) in &other.terms {
            out.accumulate(mono.clone(), *coeff)?;
        }
        Some(out)
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.checked_add(&other.checked_neg()?)
    }

    pub fn checked_neg(&self) -> Option<Self> {
        let mut terms = BTreeMap::new();
        for (mono, coeff) in &self.terms {
            terms.insert(mono.clone(), coeff.checked_neg()?);
        }
        Some(Self { terms })
    }

    pub fn checked_mul(&self, other: &Self) -> Option<Self> {
        let mut out = Self::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                let mut mono = ma.clone();
                for (var, exp) in mb {
                    let entry = mono.entry(var.clone()).or_insert(0);
                    *entry = entry.checked_add(*exp)?;
                }
                out.accumulate(mono, ca.checked_mul(*cb)?)?;
            }
        }
        Some(out)
    }

    pub fn checked_pow(&self, exponent: u32) -> Option<Self> {
        let mut out = Self::constant(Rational::ONE);
        for _ in 0..exponent {
            out = out.checked_mul(self)?;
        }
        Some(out)
    }

    /// Divide every coefficient by a nonzero constant.
    pub fn checked_div_const(&self, divisor: Rational) -> Option<Self> {
        if divisor.is_zero() {
            return None;
        }
        let mut out = Self::zero();
        for (mono, coeff) in &self.terms {
            out.insert_term(mono.clone(), coeff.checked_div(divisor)?);
        }
        Some(out)
    }

    /// Scale so the leading coefficient (largest monomial in canonical
    /// order) becomes 1. Deterministic normal form for equation comparison:
    /// `2x - 8` and `x - 4` both become `x - 4`. The zero polynomial is its
    /// own monic form.
    pub fn monic(&self) -> Option<Self> {
        match self.terms.iter().next_back() {
            None => Some(Self::zero()),
            Some((_, leading)) => self.checked_div_const(*leading),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(num: i64, den: i64) -> Rational {
        Rational::new(num, den).unwrap()
    }

    #[test]
    fn rationals_reduce_and_normalize_sign() {
        assert_eq!(r(2, 4), r(1, 2));
        assert_eq!(r(1, -2), r(-1, 2));
        assert_eq!(r(-3, -6), r(1, 2));
        assert!(Rational::new(1, 0).is_none());
    }

    #[test]
    fn decimal_parsing() {
        assert_eq!(Rational::from_decimal("2.5"), Some(r(5, 2)));
        assert_eq!(Rational::from_decimal(".75"), Some(r(3, 4)));
        assert_eq!(Rational::from_decimal("13"), Some(r(13, 1)));
        assert_eq!(Rational::from_decimal("4."), Some(r(4, 1)));
        assert_eq!(Rational::from_decimal("1.2.3"), None);
    }

    #[test]
    fn extreme_coefficients_exhaust_instead_of_panicking() {
        let min = Rational::from_integer(i64::MIN);
        assert_eq!(min.checked_neg(), None);
        assert_eq!(Rational::ZERO.checked_sub(min), None);
        // -i64::MIN does not fit back into i64
        assert_eq!(Rational::new(i64::MIN, -1), None);
        // but reduction itself may shrink the magnitude into range
        assert_eq!(Rational::new(i64::MIN, 2), Rational::new(i64::MIN / 2, 1));
        assert_eq!(Rational::new(i64::MIN, i64::MIN), Some(Rational::ONE));

        let p = Polynomial::constant(min);
        assert_eq!(p.checked_neg(), None);
        assert_eq!(Polynomial::zero().checked_sub(&p), None);
    }

    #[test]
    fn polynomial_cancellation_removes_terms() {
        let x = Polynomial::variable("x");
        let diff = x.checked_sub(&x).unwrap();
        assert!(diff.is_zero());
    }

    #[test]
    fn monic_normalizes_scalar_multiples() {
        // 2x - 8
        let two_x = Polynomial::variable("x")
            .checked_mul(&Polynomial::constant(r(2, 1)))
            .unwrap();
        let p = two_x.checked_sub(&Polynomial::constant(r(8, 1))).unwrap();
        // x - 4
        let q = Polynomial::variable("x")
            .checked_sub(&Polynomial::constant(r(4, 1)))
            .unwrap();
        assert_eq!(p.monic().unwrap(), q.monic().unwrap());
    }

    #[test]
    fn monic_distinguishes_different_degree() {
        // x^2 - 4 vs x - 2
        let x = Polynomial::variable("x");
        let quad = x
            .checked_pow(2)
            .unwrap()
            .checked_sub(&Polynomial::constant(r(4, 1)))
            .unwrap();
        let linear = x.checked_sub(&Polynomial::constant(r(2, 1))).unwrap();
        assert_ne!(quad.monic().unwrap(), linear.monic().unwrap());
    }

    #[test]
    fn multivariate_products() {
        // (x + y)^2 == x^2 + 2xy + y^2
        let sum = Polynomial::variable("x")
            .checked_add(&Polynomial::variable("y"))
            .unwrap();
        let lhs = sum.checked_pow(2).unwrap();

        let x2 = Polynomial::variable("x").checked_pow(2).unwrap();
        let y2 = Polynomial::variable("y").checked_pow(2).unwrap();
        let xy = Polynomial::variable("x")
            .checked_mul(&Polynomial::variable("y"))
            .unwrap()
            .checked_mul(&Polynomial::constant(r(2, 1)))
            .unwrap();
        let rhs = x2.checked_add(&xy).unwrap().checked_add(&y2).unwrap();
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn as_constant() {
        assert_eq!(Polynomial::zero().as_constant(), Some(Rational::ZERO));
        assert_eq!(Polynomial::constant(r(3, 2)).as_constant(), Some(r(3, 2)));
        assert_eq!(Polynomial::variable("x").as_constant(), None);
    }
}
