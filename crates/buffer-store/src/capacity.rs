// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Buffer capacities and their human-readable form.
//!
//! A [`Capacity`] is a non-zero byte count. It can be written in
//! configuration either as an integer or as a string with a binary suffix.

use crate::BufferError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// The fixed byte capacity of a buffer.
///
/// # Parsing
/// - `"4000"` or `"4000B"` → 4000 bytes
/// - `"4K"` or `"4KB"` → 4 × 1024 bytes
/// - `"1M"` or `"1MB"` → 1024² bytes
/// - `"1G"` or `"1GB"` → 1024³ bytes
///
/// # Examples
/// ```
/// use buffer_store::Capacity;
///
/// assert_eq!(Capacity::parse("4K").unwrap().as_bytes(), 4096);
/// assert_eq!(Capacity::parse("4000").unwrap().as_bytes(), 4000);
/// assert!(Capacity::parse("0").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "CapacityRepr", into = "CapacityRepr")]
pub struct Capacity {
    bytes: usize,
}

impl Capacity {
    /// Creates a capacity from a byte count. Zero is rejected.
    pub fn from_bytes(bytes: usize) -> Result<Self, BufferError> {
        if bytes == 0 {
            return Err(BufferError::InvalidCapacity("capacity must be non-zero".into()));
        }
        Ok(Self { bytes })
    }

    /// Capacity for `count` elements of `element_size` bytes each.
    pub fn for_elements(count: usize, element_size: usize) -> Result<Self, BufferError> {
        let bytes = count.checked_mul(element_size).ok_or_else(|| {
            BufferError::InvalidCapacity(format!("{count} elements of {element_size} bytes overflows"))
        })?;
        Self::from_bytes(bytes)
    }

    /// Returns the capacity in bytes.
    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable capacity string. Case-insensitive.
    pub fn parse(s: &str) -> Result<Self, BufferError> {
        let s = s.trim();
        let upper = s.to_uppercase();

        let (num_str, multiplier) = if upper.ends_with("GB") {
            (&s[..s.len() - 2], GIB)
        } else if upper.ends_with('G') {
            (&s[..s.len() - 1], GIB)
        } else if upper.ends_with("MB") {
            (&s[..s.len() - 2], MIB)
        } else if upper.ends_with('M') {
            (&s[..s.len() - 1], MIB)
        } else if upper.ends_with("KB") {
            (&s[..s.len() - 2], KIB)
        } else if upper.ends_with('K') {
            (&s[..s.len() - 1], KIB)
        } else if upper.ends_with('B') {
            (&s[..s.len() - 1], 1)
        } else {
            (s, 1)
        };

        let value: usize = num_str.trim().parse().map_err(|_| {
            BufferError::InvalidCapacity(format!(
                "'{s}': expected a byte count with an optional K, M or G suffix"
            ))
        })?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| BufferError::InvalidCapacity(format!("'{s}' overflows")))?;
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes % GIB == 0 {
            write!(f, "{}G", self.bytes / GIB)
        } else if self.bytes % MIB == 0 {
            write!(f, "{}M", self.bytes / MIB)
        } else if self.bytes % KIB == 0 {
            write!(f, "{}K", self.bytes / KIB)
        } else {
            write!(f, "{}", self.bytes)
        }
    }
}

impl std::str::FromStr for Capacity {
    type Err = BufferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// On-disk form: either `4000` or `"4K"`.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum CapacityRepr {
    Bytes(usize),
    Text(String),
}

impl TryFrom<CapacityRepr> for Capacity {
    type Error = BufferError;

    fn try_from(repr: CapacityRepr) -> Result<Self, Self::Error> {
        match repr {
            CapacityRepr::Bytes(bytes) => Self::from_bytes(bytes),
            CapacityRepr::Text(text) => Self::parse(&text),
        }
    }
}

impl From<Capacity> for CapacityRepr {
    fn from(capacity: Capacity) -> Self {
        CapacityRepr::Text(capacity.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(Capacity::parse("4K").unwrap().as_bytes(), 4096);
        assert_eq!(Capacity::parse("4kb").unwrap().as_bytes(), 4096);
        assert_eq!(Capacity::parse("1M").unwrap().as_bytes(), MIB);
        assert_eq!(Capacity::parse("1MB").unwrap().as_bytes(), MIB);
        assert_eq!(Capacity::parse("2g").unwrap().as_bytes(), 2 * GIB);
        assert_eq!(Capacity::parse("512B").unwrap().as_bytes(), 512);
    }

    #[test]
    fn test_parse_raw_bytes() {
        assert_eq!(Capacity::parse("4000").unwrap().as_bytes(), 4000);
        assert_eq!(Capacity::parse("  24 ").unwrap().as_bytes(), 24);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Capacity::parse("").is_err());
        assert!(Capacity::parse("abc").is_err());
        assert!(Capacity::parse("0K").is_err());
        assert!(Capacity::parse("-4").is_err());
        assert!(Capacity::parse(&format!("{}G", usize::MAX)).is_err());
    }

    #[test]
    fn test_for_elements() {
        assert_eq!(Capacity::for_elements(1000, 4).unwrap().as_bytes(), 4000);
        assert!(Capacity::for_elements(0, 4).is_err());
        assert!(Capacity::for_elements(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Capacity::parse("4000").unwrap().to_string(), "4000");
        assert_eq!(Capacity::parse("8K").unwrap().to_string(), "8K");
        assert_eq!(Capacity::parse("3M").unwrap().to_string(), "3M");
        assert_eq!(Capacity::parse("1G").unwrap().to_string(), "1G");
    }

    #[test]
    fn test_serde_accepts_number_or_string() {
        let a: Capacity = serde_json::from_str("4000").unwrap();
        let b: Capacity = serde_json::from_str("\"4000\"").unwrap();
        assert_eq!(a, b);
        let k: Capacity = serde_json::from_str("\"2K\"").unwrap();
        assert_eq!(k.as_bytes(), 2048);
        assert!(serde_json::from_str::<Capacity>("0").is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let c = Capacity::parse("64K").unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "\"64K\"");
        let back: Capacity = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
