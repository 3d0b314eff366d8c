use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Neg, Sub};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point monetary amount in 10^-6 currency units.
///
/// All arithmetic is integer arithmetic with truncating division, so a cost
/// computed today reproduces byte-for-byte when recomputed against the same
/// inputs. Floating point never touches persisted amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

const SCALE: i64 = 1_000_000;
const FRAC_DIGITS: usize = 6;

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_micros(micros: i64) -> Self {
        Money(micros)
    }

    pub fn micros(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Cost of `tokens` at a per-million-token rate, truncated toward zero.
    pub fn per_million(self, tokens: u64) -> Money {
        let product = self.0 as i128 * tokens as i128;
        Money((product / SCALE as i128) as i64)
    }

    /// Parse a decimal string such as `"10"`, `"-0.5"` or `"9.9972"`.
    /// Fractional digits beyond six are truncated, matching cost arithmetic.
    pub fn parse(input: &str) -> Result<Money, String> {
        let s = input.trim();
        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        if s.is_empty() {
            return Err(format!("invalid money literal: {:?}", input));
        }
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("invalid money literal: {:?}", input));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(format!("invalid money literal: {:?}", input));
        }
        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| format!("money literal out of range: {:?}", input))?
        };
        let mut frac: i64 = 0;
        for (idx, ch) in frac_part.chars().enumerate() {
            if idx >= FRAC_DIGITS {
                break;
            }
            frac = frac * 10 + (ch as u8 - b'0') as i64;
        }
        let seen = frac_part.len().min(FRAC_DIGITS);
        for _ in seen..FRAC_DIGITS {
            frac *= 10;
        }
        let micros = whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| format!("money literal out of range: {:?}", input))?;
        Ok(Money(if negative { -micros } else { micros }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u64;
        let frac = abs % SCALE as u64;
        let mut frac_str = format!("{:06}", frac);
        while frac_str.len() > 2 && frac_str.ends_with('0') {
            frac_str.pop();
        }
        write!(f, "{}{}.{}", sign, whole, frac_str)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Money::parse(&raw).map_err(D::Error::custom)
    }
}
