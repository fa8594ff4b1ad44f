//! Calendar quarters and contiguous quarter ranges.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid quarter literal '{0}'")]
pub struct QuarterParseError(pub String);

/// A calendar quarter, e.g. `2025Q1`.
///
/// Ordered chronologically. Accepted input forms: `2025Q1`, `2025q1`,
/// `2025:1`, `2025:01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quarter {
    year: i32,
    q: u8,
}

impl Quarter {
    pub fn new(year: i32, q: u8) -> Result<Self, QuarterParseError> {
        if (1..=4).contains(&q) {
            Ok(Self { year, q })
        } else {
            Err(QuarterParseError(format!("{year}Q{q}")))
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u8 {
        self.q
    }

    /// Position on the infinite quarterly axis. Used for arithmetic only.
    fn linear(&self) -> i64 {
        self.year as i64 * 4 + (self.q as i64 - 1)
    }

    fn from_linear(n: i64) -> Self {
        let year = n.div_euclid(4) as i32;
        let q = (n.rem_euclid(4) + 1) as u8;
        Self { year, q }
    }

    /// The quarter `n` steps away (negative = earlier).
    pub fn offset_by(&self, n: i32) -> Quarter {
        Self::from_linear(self.linear() + n as i64)
    }

    /// Number of quarters from `other` to `self` (positive when `self` is later).
    pub fn quarters_since(&self, other: Quarter) -> i64 {
        self.linear() - other.linear()
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.q)
    }
}

impl FromStr for Quarter {
    type Err = QuarterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || QuarterParseError(s.to_string());
        let (year_part, q_part) = s
            .split_once(['Q', 'q', ':'])
            .ok_or_else(err)?;
        let year: i32 = year_part.trim().parse().map_err(|_| err())?;
        let q: u8 = q_part.trim().parse().map_err(|_| err())?;
        // EViews-style "2005:02" means Q2.
        Quarter::new(year, q).map_err(|_| err())
    }
}

impl Serialize for Quarter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quarter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct QuarterVisitor;

        impl Visitor<'_> for QuarterVisitor {
            type Value = Quarter;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a quarter literal like 2025Q1")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Quarter, E> {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(QuarterVisitor)
    }
}

/// A contiguous range of quarters: `start` plus `len` consecutive quarters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    start: Quarter,
    len: usize,
}

impl Span {
    pub fn new(start: Quarter, end: Quarter) -> Result<Self, QuarterParseError> {
        let len = end.quarters_since(start);
        if len < 0 {
            return Err(QuarterParseError(format!("{start}..{end}")));
        }
        Ok(Self { start, len: len as usize + 1 })
    }

    pub fn start(&self) -> Quarter {
        self.start
    }

    pub fn end(&self) -> Quarter {
        self.start.offset_by(self.len as i32 - 1)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of `q` within the span, if covered.
    pub fn index_of(&self, q: Quarter) -> Option<usize> {
        let d = q.quarters_since(self.start);
        if d >= 0 && (d as usize) < self.len {
            Some(d as usize)
        } else {
            None
        }
    }

    pub fn quarter_at(&self, idx: usize) -> Quarter {
        self.start.offset_by(idx as i32)
    }

    pub fn iter(&self) -> impl Iterator<Item = Quarter> + '_ {
        (0..self.len).map(|i| self.quarter_at(i))
    }
}
