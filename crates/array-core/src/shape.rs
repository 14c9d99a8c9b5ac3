// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape descriptors and row-major stride computation.

use crate::ArrayError;
use std::fmt;

/// Extent of each axis of a buffer's current presentation.
///
/// Layout is always row-major: the last axis is contiguous in memory.
/// A rank-0 shape holds exactly one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// ```
    /// use array_core::Shape;
    /// let s = Shape::new(vec![4, 3, 2]);
    /// assert_eq!((s.rank(), s.num_elements()), (3, 24));
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Rank 0, one element.
    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Builds a shape from dimensions reported by the embedded runtime.
    ///
    /// The runtime speaks in signed integers; negative dimensions are
    /// rejected rather than wrapped.
    pub fn from_reported(dims: &[i64]) -> Result<Self, ArrayError> {
        let converted = dims
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ArrayError::InvalidShape {
                dims: dims.to_vec(),
                detail: "dimensions must be non-negative".into(),
            })?;
        Ok(Self::new(converted))
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of the dimensions, saturating at `usize::MAX`. Prefer
    /// [`checked_num_elements`](Shape::checked_num_elements) for shapes
    /// that arrive from outside the process.
    pub fn num_elements(&self) -> usize {
        self.checked_num_elements().unwrap_or(usize::MAX)
    }

    /// Product of the dimensions, or `None` if it overflows.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Bytes needed for elements of `element_size`, or `None` on overflow.
    pub fn size_bytes(&self, element_size: usize) -> Option<usize> {
        self.checked_num_elements()?.checked_mul(element_size)
    }

    /// Row-major strides in bytes.
    ///
    /// `stride[n-1] = element_size` and `stride[i] = stride[i+1] * dims[i+1]`,
    /// assigned from the last dimension inward. Empty for rank 0.
    pub fn byte_strides(&self, element_size: usize) -> Vec<usize> {
        let mut strides = Vec::with_capacity(self.dims.len());
        let mut step = element_size;
        for &extent in self.dims.iter().rev() {
            strides.push(step);
            step = step.saturating_mul(extent);
        }
        strides.reverse();
        strides
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(shape: &Shape) -> Self {
        shape.clone()
    }
}
