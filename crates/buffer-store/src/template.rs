// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Declared shape constraints.
//!
//! A declaration's `max_shape` is a list of signed extents. A positive
//! extent is an upper bound that only contributes to the capacity; a
//! negative extent `-n` fixes that axis at exactly `n`. The axes together
//! form a [`ShapeTemplate`] that bound shapes are checked against.

use array_core::Shape;
use std::fmt;

/// Per-axis constraints: `Some(n)` is fixed at `n`, `None` is free.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShapeTemplate {
    dims: Vec<Option<usize>>,
}

impl ShapeTemplate {
    /// Builds a template from signed extents. Negative extents are fixed.
    pub fn from_signed(max_shape: &[i64]) -> Self {
        let dims = max_shape
            .iter()
            .map(|&d| (d < 0).then(|| usize::try_from(d.unsigned_abs()).unwrap_or(usize::MAX)))
            .collect();
        Self { dims }
    }

    /// Returns the per-axis constraints.
    pub fn dims(&self) -> &[Option<usize>] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns `true` if any axis is fixed.
    pub fn has_fixed(&self) -> bool {
        self.dims.iter().any(Option::is_some)
    }

    /// Returns `true` if `shape` has the template's rank and matches every
    /// fixed axis.
    pub fn accepts(&self, shape: &Shape) -> bool {
        shape.rank() == self.rank()
            && self
                .dims
                .iter()
                .zip(shape.dims())
                .all(|(fixed, &extent)| fixed.map_or(true, |n| n == extent))
    }
}

impl fmt::Display for ShapeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .dims
            .iter()
            .map(|d| d.map_or_else(|| "*".to_string(), |n| n.to_string()))
            .collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_extents_are_fixed() {
        let t = ShapeTemplate::from_signed(&[-3, 100]);
        assert_eq!(t.dims(), &[Some(3), None]);
        assert!(t.has_fixed());
        assert_eq!(t.to_string(), "[3, *]");
    }

    #[test]
    fn test_accepts() {
        let t = ShapeTemplate::from_signed(&[-3, 100]);
        assert!(t.accepts(&Shape::matrix(3, 7)));
        assert!(t.accepts(&Shape::matrix(3, 0)));
        assert!(!t.accepts(&Shape::matrix(4, 7)));
        assert!(!t.accepts(&Shape::vector(3)));
        assert!(!t.accepts(&Shape::new(vec![3, 7, 1])));
    }

    #[test]
    fn test_all_free() {
        let t = ShapeTemplate::from_signed(&[1000]);
        assert!(!t.has_fixed());
        assert!(t.accepts(&Shape::vector(5)));
    }
}
