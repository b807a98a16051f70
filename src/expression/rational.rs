//! Exact rational numbers for constant folding.
//!
//! Values are kept reduced with a positive denominator, so derived
//! equality is value equality. Every arithmetic operation is checked:
//! an overflowing result is reported as `None` and the caller declines
//! to fold.

use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i128,
    den: i128,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    // operates on non-negative values only
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Create a reduced rational `num/den`; `None` if `den` is zero
    /// or the value cannot be represented.
    pub fn new(num: i128, den: i128) -> Option<Rational> {
        if den == 0 {
            return None;
        }
        let (num, den) = if den < 0 {
            (num.checked_neg()?, den.checked_neg()?)
        } else {
            (num, den)
        };
        let g = gcd(num.checked_abs()?, den);
        Some(Rational {
            num: num / g,
            den: den / g,
        })
    }

    pub fn from_int(i: i64) -> Rational {
        Rational {
            num: i as i128,
            den: 1,
        }
    }

    /// The exact value of a finite float, or `None` if it is not
    /// finite or needs more than 127 bits on either side.
    pub fn from_f64(f: f64) -> Option<Rational> {
        if !f.is_finite() {
            return None;
        }
        if f == 0.0 {
            return Some(Rational::ZERO);
        }
        let bits = f.to_bits();
        let negative = bits >> 63 != 0;
        let exp = ((bits >> 52) & 0x7ff) as i32;
        let frac = bits & ((1u64 << 52) - 1);
        let (mantissa, exp) = if exp == 0 {
            (frac, -1074)
        } else {
            (frac | (1u64 << 52), exp - 1075)
        };
        let mantissa = if negative {
            -(mantissa as i128)
        } else {
            mantissa as i128
        };
        if exp >= 0 {
            if exp > 74 {
                return None;
            }
            Some(Rational {
                num: mantissa << exp,
                den: 1,
            })
        } else {
            let shift = -exp;
            // strip common factors of two before building the denominator
            let tz = (mantissa.trailing_zeros() as i32).min(shift);
            let (mantissa, shift) = (mantissa >> tz, shift - tz);
            if shift > 126 {
                return None;
            }
            Rational::new(mantissa, 1i128 << shift)
        }
    }

    pub fn numer(&self) -> i128 {
        self.num
    }

    pub fn denom(&self) -> i128 {
        self.den
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn signum(&self) -> i32 {
        self.num.signum() as i32
    }

    /// The value as an `i64`, if it is an integer in range.
    pub fn to_i64(&self) -> Option<i64> {
        if self.den != 1 {
            return None;
        }
        i64::try_from(self.num).ok()
    }

    pub fn to_f64(&self) -> f64 {
        if self.den == 1 {
            return self.num as f64;
        }
        self.num as f64 / self.den as f64
    }

    /// The value as an `f64` if the conversion is exact.
    pub fn to_f64_exact(&self) -> Option<f64> {
        let f = self.to_f64();
        (Rational::from_f64(f) == Some(*self)).then_some(f)
    }

    pub fn checked_add(&self, rhs: &Rational) -> Option<Rational> {
        let g = gcd(self.den, rhs.den);
        let lhs_scale = rhs.den / g;
        let rhs_scale = self.den / g;
        let num = self
            .num
            .checked_mul(lhs_scale)?
            .checked_add(rhs.num.checked_mul(rhs_scale)?)?;
        Rational::new(num, self.den.checked_mul(lhs_scale)?)
    }

    pub fn checked_sub(&self, rhs: &Rational) -> Option<Rational> {
        self.checked_add(&rhs.checked_neg()?)
    }

    pub fn checked_mul(&self, rhs: &Rational) -> Option<Rational> {
        let g1 = gcd(self.num.checked_abs()?, rhs.den);
        let g2 = gcd(rhs.num.checked_abs()?, self.den);
        let (g1, g2) = (g1.max(1), g2.max(1));
        let num = (self.num / g1).checked_mul(rhs.num / g2)?;
        let den = (self.den / g2).checked_mul(rhs.den / g1)?;
        Rational::new(num, den)
    }

    /// `None` on division by zero as well as on overflow.
    pub fn checked_div(&self, rhs: &Rational) -> Option<Rational> {
        self.checked_mul(&rhs.checked_recip()?)
    }

    /// The remainder of truncated division, carrying the sign of `self`.
    pub fn checked_rem(&self, rhs: &Rational) -> Option<Rational> {
        if rhs.is_zero() {
            return None;
        }
        let q = self.checked_div(rhs)?.trunc();
        self.checked_sub(&q.checked_mul(rhs)?)
    }

    pub fn checked_neg(&self) -> Option<Rational> {
        Some(Rational {
            num: self.num.checked_neg()?,
            den: self.den,
        })
    }

    pub fn checked_recip(&self) -> Option<Rational> {
        if self.num == 0 {
            return None;
        }
        Rational::new(self.den, self.num)
    }

    pub fn abs(&self) -> Option<Rational> {
        if self.num < 0 {
            self.checked_neg()
        } else {
            Some(*self)
        }
    }

    pub fn floor(&self) -> Rational {
        Rational {
            num: self.num.div_euclid(self.den),
            den: 1,
        }
    }

    pub fn ceil(&self) -> Rational {
        let f = self.num.div_euclid(self.den);
        let num = if self.num.rem_euclid(self.den) == 0 {
            f
        } else {
            f + 1
        };
        Rational { num, den: 1 }
    }

    pub fn trunc(&self) -> Rational {
        Rational {
            num: self.num / self.den,
            den: 1,
        }
    }

    /// Round to the nearest integer; halves round towards positive infinity.
    pub fn round(&self) -> Rational {
        let floor = self.num.div_euclid(self.den);
        let rem = self.num.rem_euclid(self.den);
        // rem/den >= 1/2
        let num = if rem >= self.den - rem { floor + 1 } else { floor };
        Rational { num, den: 1 }
    }

    /// Round to the nearest integer; halves round to the even neighbour.
    pub fn round_even(&self) -> Rational {
        let floor = self.num.div_euclid(self.den);
        let rem = self.num.rem_euclid(self.den);
        let num = match rem.cmp(&(self.den - rem)) {
            Ordering::Less => floor,
            Ordering::Greater => floor + 1,
            Ordering::Equal if floor % 2 == 0 => floor,
            Ordering::Equal => floor + 1,
        };
        Rational { num, den: 1 }
    }
}

impl From<i64> for Rational {
    fn from(i: i64) -> Rational {
        Rational::from_int(i)
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Rational) -> Ordering {
        cmp_fractions(self.num, self.den, other.num, other.den)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Rational) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare `a/b` with `c/d` (both denominators positive) without
/// overflow by walking their continued fraction expansions.
fn cmp_fractions(mut a: i128, mut b: i128, mut c: i128, mut d: i128) -> Ordering {
    loop {
        let qa = a.div_euclid(b);
        let qc = c.div_euclid(d);
        if qa != qc {
            return qa.cmp(&qc);
        }
        let ra = a.rem_euclid(b);
        let rc = c.rem_euclid(d);
        match (ra == 0, rc == 0) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            // ra/b < rc/d  <=>  d/rc < b/ra
            (false, false) => (a, b, c, d) = (d, rc, b, ra),
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            return write!(f, "{}", self.num);
        }
        match self.to_f64_exact() {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "{}/{}", self.num, self.den),
        }
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i128, d: i128) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn test_normalization() {
        assert_eq!(rat(2, 4), rat(1, 2));
        assert_eq!(rat(3, -6), rat(-1, 2));
        assert_eq!(rat(-1, 2).denom(), 2);
        assert!(Rational::new(1, 0).is_none());
    }

    #[test]
    fn test_exact_division_comparison() {
        // 1000/350 = 20/7 = 2.857...
        let q = rat(1000, 1).checked_div(&rat(350, 1)).unwrap();
        assert_eq!(q, rat(20, 7));
        assert!(q < Rational::from_f64(3.0).unwrap());
        assert!(q > Rational::from_f64(2.857).unwrap());
    }

    #[test]
    fn test_from_f64() {
        assert_eq!(Rational::from_f64(0.5), Some(rat(1, 2)));
        assert_eq!(Rational::from_f64(-3.0), Some(rat(-3, 1)));
        assert_eq!(Rational::from_f64(0.1).unwrap().to_f64(), 0.1);
        assert!(Rational::from_f64(f64::NAN).is_none());
        assert!(Rational::from_f64(1e300).is_none());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(rat(-7, 2).round(), rat(-3, 1));
        assert_eq!(rat(7, 2).round(), rat(4, 1));
        assert_eq!(rat(-7, 2).round_even(), rat(-4, 1));
        assert_eq!(rat(5, 2).round_even(), rat(2, 1));
        assert_eq!(rat(-7, 2).floor(), rat(-4, 1));
        assert_eq!(rat(-7, 2).ceil(), rat(-3, 1));
        assert_eq!(rat(-7, 2).trunc(), rat(-3, 1));
    }

    #[test]
    fn test_remainder() {
        assert_eq!(rat(7, 1).checked_rem(&rat(3, 1)), Some(rat(1, 1)));
        assert_eq!(rat(-7, 1).checked_rem(&rat(3, 1)), Some(rat(-1, 1)));
        assert_eq!(rat(7, 2).checked_rem(&rat(1, 1)), Some(rat(1, 2)));
        assert!(rat(1, 1).checked_rem(&Rational::ZERO).is_none());
    }

    #[test]
    fn test_overflow_is_reported() {
        let big = rat(i128::MAX, 1);
        assert!(big.checked_add(&Rational::ONE).is_none());
        assert!(big.checked_mul(&rat(2, 1)).is_none());
        assert_eq!(big.cmp(&rat(i128::MAX - 1, 1)), Ordering::Greater);
        assert_eq!(
            rat(i128::MAX, i128::MAX - 1).cmp(&rat(i128::MAX - 1, i128::MAX - 2)),
            Ordering::Less
        );
    }

    #[test]
    fn test_ordering() {
        assert!(rat(1, 3) < rat(1, 2));
        assert!(rat(2, 7) < rat(3, 10));
        assert!(rat(-1, 3) > rat(-1, 2));
        assert!(rat(5, 8) > rat(3, 5));
        assert_eq!(rat(4, 6).cmp(&rat(2, 3)), Ordering::Equal);

        let mut values = vec![rat(3, 4), rat(1, 3), rat(1, 2), rat(2, 3)];
        values.sort();
        assert_eq!(values, vec![rat(1, 3), rat(1, 2), rat(2, 3), rat(3, 4)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(rat(6, 2).to_string(), "3");
        assert_eq!(rat(1, 4).to_string(), "0.25");
        assert_eq!(rat(1, 3).to_string(), "1/3");
    }
}
