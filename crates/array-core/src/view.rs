// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Non-owning array views and the generation counter that guards them.
//!
//! A buffer owns its memory and an [`Epoch`]. Every view it hands out
//! remembers the epoch's generation at creation time. When the buffer is
//! reshaped the epoch advances, and when the buffer is dropped the epoch is
//! retired; from then on every data access through the old view returns
//! [`ArrayError::Stale`] or [`ArrayError::Retired`] instead of touching
//! memory that now means something else (or nothing at all).
//!
//! Data access from Rust is copy-based on purpose: a view does not borrow
//! its buffer, so it cannot hand out slices that might outlive it. The
//! zero-copy consumer is the embedded runtime, which receives the raw
//! pointer via [`ArrayView::as_ptr`].
//!
//! Writing through a view is `unsafe`. A view is a detached descriptor, so
//! the borrow checker cannot see the `&[T]` or `&mut [u8]` its owning
//! buffer may have handed out, and re-presenting the same shape keeps the
//! view current. Safe writes go through `&mut` on the owning buffer.

use crate::{ArrayError, Element, ElementType, Shape};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const RETIRED: u64 = u64::MAX;

/// Shared generation counter between a buffer and its views.
#[derive(Debug, Clone, Default)]
pub struct Epoch {
    generation: Arc<AtomicU64>,
}

impl Epoch {
    /// Creates an epoch at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current generation.
    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Invalidates all outstanding views and returns the new generation.
    pub fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Permanently invalidates all views. Called when memory is released.
    pub fn retire(&self) {
        self.generation.store(RETIRED, Ordering::Release);
    }

    /// Returns `true` once [`retire`](Epoch::retire) has been called.
    pub fn is_retired(&self) -> bool {
        self.current() == RETIRED
    }
}

/// A non-owning, row-major view over a buffer's memory.
///
/// Cloning a view clones the descriptor, never the data.
#[derive(Clone)]
pub struct ArrayView {
    data: NonNull<u8>,
    shape: Shape,
    strides: Vec<usize>,
    element: ElementType,
    generation: u64,
    epoch: Epoch,
}

impl ArrayView {
    /// See [`ElementType::make_view`] for the safety contract.
    pub(crate) unsafe fn from_raw_parts(
        data: NonNull<u8>,
        shape: Shape,
        strides: Vec<usize>,
        element: ElementType,
        epoch: &Epoch,
    ) -> Self {
        Self {
            data,
            shape,
            strides,
            element,
            generation: epoch.current(),
            epoch: epoch.clone(),
        }
    }

    /// Returns the viewed shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the byte strides, one per dimension.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Returns the element type.
    pub fn element(&self) -> &ElementType {
        &self.element
    }

    /// Returns the generation this view was created at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the number of elements covered by the view.
    pub fn num_elements(&self) -> usize {
        self.shape.num_elements()
    }

    /// Returns the number of bytes covered by the view.
    pub fn len_bytes(&self) -> usize {
        self.num_elements() * self.element.size_bytes()
    }

    /// Returns `true` if the owning buffer has not been reshaped or dropped
    /// since this view was created.
    pub fn is_current(&self) -> bool {
        self.check().is_ok()
    }

    /// Verifies that the view still describes its buffer's layout.
    pub fn check(&self) -> Result<(), ArrayError> {
        let current = self.epoch.current();
        if current == RETIRED {
            return Err(ArrayError::Retired {
                view: self.generation,
            });
        }
        if current != self.generation {
            return Err(ArrayError::Stale {
                view: self.generation,
                current,
            });
        }
        Ok(())
    }

    /// Returns the start of the viewed memory for a foreign consumer.
    ///
    /// The pointer is valid for [`len_bytes`](ArrayView::len_bytes) bytes
    /// until the owning buffer is reshaped or dropped.
    pub fn as_ptr(&self) -> Result<*mut u8, ArrayError> {
        self.check()?;
        Ok(self.data.as_ptr())
    }

    /// Copies the viewed elements out in row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, ArrayError> {
        self.expect_type::<T>()?;
        self.check()?;
        let size = self.element.size_bytes();
        // SAFETY: the generation check above guarantees the buffer is alive
        // and still covers `len_bytes()` bytes; the slice does not escape.
        let bytes = unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len_bytes()) };
        Ok(bytes.chunks_exact(size).map(T::read).collect())
    }

    /// Copies the viewed elements into an owned `ndarray` of the same shape.
    pub fn to_ndarray<T: Element>(&self) -> Result<ndarray::ArrayD<T>, ArrayError> {
        let values = self.to_vec::<T>()?;
        ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(self.shape.dims()), values).map_err(|e| {
            ArrayError::InvalidShape {
                dims: self.shape.dims().iter().map(|&d| d as i64).collect(),
                detail: e.to_string(),
            }
        })
    }

    /// Writes `values` into the leading elements of the view.
    ///
    /// Fails with [`ArrayError::LengthMismatch`] if more values are given
    /// than the view holds.
    ///
    /// # Safety
    /// No Rust reference into the viewed memory may be live for the
    /// duration of the call, and no other thread may access it. In
    /// particular, no slice handed out by the owning buffer may be alive.
    pub unsafe fn write<T: Element>(&self, values: &[T]) -> Result<(), ArrayError> {
        self.expect_type::<T>()?;
        self.check()?;
        let capacity = self.num_elements();
        if values.len() > capacity {
            return Err(ArrayError::LengthMismatch {
                shape: self.shape.clone(),
                capacity,
                actual: values.len(),
            });
        }
        let size = self.element.size_bytes();
        // SAFETY: see `to_vec`; the written range is within `len_bytes()`
        // and the caller guarantees no other reference covers it.
        let bytes =
            unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), values.len() * size) };
        for (chunk, value) in bytes.chunks_exact_mut(size).zip(values) {
            value.write(chunk);
        }
        Ok(())
    }

    /// Copies as many leading bytes as fit from `source` into this view.
    ///
    /// Both views must hold the same element type; no promotion is done.
    /// Returns the number of elements copied.
    ///
    /// # Safety
    /// Same contract as [`write`](ArrayView::write) for this view's memory.
    /// The source memory must not be mutably borrowed.
    pub unsafe fn copy_from(&self, source: &ArrayView) -> Result<usize, ArrayError> {
        if source.element != self.element {
            return Err(ArrayError::TypeMismatch {
                requested: self.element.name().to_string(),
                actual: source.element.name().to_string(),
            });
        }
        self.check()?;
        source.check()?;
        let count = self.num_elements().min(source.num_elements());
        let len = count * self.element.size_bytes();
        // SAFETY: both views are current, so both ranges are live; `copy`
        // tolerates overlap when both views alias the same buffer.
        unsafe {
            std::ptr::copy(source.data.as_ptr(), self.data.as_ptr(), len);
        }
        Ok(count)
    }

    /// Renders the view numpy-style, eliding elements past `max_elements`.
    pub fn render(&self, max_elements: usize) -> Result<String, ArrayError> {
        self.check()?;
        let size = self.element.size_bytes();
        let total = self.num_elements();
        let shown = total.min(max_elements);
        // SAFETY: see `to_vec`.
        let bytes = unsafe { std::slice::from_raw_parts(self.data.as_ptr(), shown * size) };
        let mut items: Vec<String> = bytes
            .chunks_exact(size)
            .map(|chunk| self.element.render(chunk))
            .collect();
        if shown < total {
            items.push("...".to_string());
        }
        Ok(format!(
            "array([{}], shape={}, dtype={})",
            items.join(", "),
            self.shape,
            self.element
        ))
    }

    fn expect_type<T: Element>(&self) -> Result<(), ArrayError> {
        if self.element.is::<T>() {
            Ok(())
        } else {
            Err(ArrayError::TypeMismatch {
                requested: T::NAME.to_string(),
                actual: self.element.name().to_string(),
            })
        }
    }
}

impl fmt::Debug for ArrayView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("element", &self.element.name())
            .field("generation", &self.generation)
            .field("current", &self.is_current())
            .finish()
    }
}
