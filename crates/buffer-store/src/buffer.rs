// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fixed-capacity buffers with zero-copy reshaping.
//!
//! A [`Buffer`] owns one aligned memory block for its whole lifetime. The
//! element type is fixed at allocation; the shape can be changed with
//! [`Buffer::set`] as long as it fits. Reshaping never reallocates or
//! copies: it only rebuilds the view descriptor over the same memory.

use crate::block::RawBlock;
use crate::{BufferError, BufferStats, ShapeTemplate};
use array_core::{ArrayView, Element, ElementType, Epoch, PlainElement, Shape, TypeDispatchTable};
use std::fmt;

/// A fixed-capacity, shape-aware memory buffer.
///
/// # Invariants
/// - `product(shape) * element_size <= capacity` at all times.
/// - The element type never changes.
/// - Strides are row-major: `stride[n-1] = element_size`,
///   `stride[i] = stride[i+1] * shape[i+1]`.
/// - Every view handed out before a shape change reports
///   [`ArrayError::Stale`](array_core::ArrayError::Stale) afterwards.
pub struct Buffer {
    name: Option<String>,
    type_tag: String,
    element: ElementType,
    block: RawBlock,
    epoch: Epoch,
    view: ArrayView,
    template: Option<ShapeTemplate>,
    stats: BufferStats,
}

impl Buffer {
    /// Allocates `capacity` zeroed bytes for elements of type `type_tag`.
    ///
    /// The new buffer presents an empty 1-D shape `[0]`.
    ///
    /// # Errors
    /// - [`BufferError::UnsupportedType`] if the tag is not in `table`.
    /// - [`BufferError::ZeroCapacity`] if `capacity` is zero.
    pub fn allocate(
        capacity: usize,
        type_tag: &str,
        table: &TypeDispatchTable,
    ) -> Result<Self, BufferError> {
        let element = table.resolve(type_tag)?;
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity {
                buffer: UNNAMED.to_string(),
            });
        }
        let block = RawBlock::zeroed(capacity)?;
        let epoch = Epoch::new();
        // SAFETY: the block covers `capacity >= 0` bytes and outlives the
        // view; `Drop` retires the epoch before the block is released.
        let view = unsafe { element.make_view(block.ptr(), Shape::vector(0), &epoch) };
        Ok(Self {
            name: None,
            type_tag: type_tag.to_string(),
            element,
            block,
            epoch,
            view,
            template: None,
            stats: BufferStats::default(),
        })
    }

    /// Attaches a name used in error messages.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Constrains the shapes [`set`](Buffer::set) accepts.
    pub fn with_template(mut self, template: ShapeTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Presents `shape` and returns the writable region covering it.
    ///
    /// The region is exactly `product(shape) * element_size` bytes long and
    /// starts at the same address for every shape. Setting the current
    /// shape again keeps the view, its strides and its generation.
    ///
    /// # Errors
    /// [`BufferError::CapacityExceeded`] if the shape does not fit, or
    /// [`BufferError::ShapeMismatch`] if it breaks the buffer's template.
    /// The buffer's shape, view and contents are unchanged either way.
    pub fn set(&mut self, shape: impl Into<Shape>) -> Result<&mut [u8], BufferError> {
        let shape = shape.into();
        if let Some(template) = &self.template {
            if !template.accepts(&shape) {
                self.stats.record_template_rejection();
                return Err(BufferError::ShapeMismatch {
                    buffer: self.label().to_string(),
                    shape,
                    template: template.clone(),
                });
            }
        }
        let (bytes, reshaped) = self.present(shape)?;
        self.stats.record_set(bytes, reshaped);
        Ok(&mut self.block.as_mut_slice()[..bytes])
    }

    /// Typed [`set`](Buffer::set): the region as a slice of `T`.
    ///
    /// Fails with [`BufferError::TypeMismatch`] unless `T` is exactly the
    /// buffer's element type. No promotion is performed.
    pub fn set_typed<T: PlainElement>(
        &mut self,
        shape: impl Into<Shape>,
    ) -> Result<&mut [T], BufferError> {
        self.expect_type::<T>()?;
        let region = self.set(shape)?;
        let len = region.len() / std::mem::size_of::<T>();
        // SAFETY: the region starts on a 64-byte boundary, holds `len`
        // elements of `T` exactly, and `T` accepts any bit pattern.
        Ok(unsafe { std::slice::from_raw_parts_mut(region.as_mut_ptr().cast::<T>(), len) })
    }

    /// Presents `shape` without handing out a writable region.
    pub fn reset(&mut self, shape: impl Into<Shape>) -> Result<(), BufferError> {
        let (bytes, reshaped) = self.present(shape.into())?;
        self.stats.record_reset(bytes, reshaped);
        Ok(())
    }

    /// Presents the whole capacity as a 1-D shape of
    /// [`max_elements`](Buffer::max_elements) elements.
    pub fn reset_flat(&mut self) -> Result<(), BufferError> {
        self.reset(Shape::vector(self.max_elements()))
    }

    /// Returns the current view.
    pub fn view(&self) -> &ArrayView {
        &self.view
    }

    /// Returns the bytes covered by the current shape.
    pub fn as_bytes(&self) -> &[u8] {
        &self.block.as_slice()[..self.view.len_bytes()]
    }

    /// Returns the bytes covered by the current shape, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.view.len_bytes();
        &mut self.block.as_mut_slice()[..len]
    }

    /// Returns the current contents as a slice of `T`.
    pub fn as_slice<T: PlainElement>(&self) -> Result<&[T], BufferError> {
        self.expect_type::<T>()?;
        let bytes = self.as_bytes();
        let len = bytes.len() / std::mem::size_of::<T>();
        // SAFETY: see `set_typed`.
        Ok(unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<T>(), len) })
    }

    /// Returns the current contents as a mutable slice of `T`.
    pub fn as_slice_mut<T: PlainElement>(&mut self) -> Result<&mut [T], BufferError> {
        self.expect_type::<T>()?;
        let bytes = self.as_bytes_mut();
        let len = bytes.len() / std::mem::size_of::<T>();
        // SAFETY: see `set_typed`.
        Ok(unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<T>(), len) })
    }

    /// Writes `values` into the leading elements of the current shape.
    /// Works for every [`Element`], including `bool`.
    ///
    /// This is the safe write path: it needs `&mut self`, so no slice the
    /// buffer handed out can be alive. A detached [`ArrayView`] cannot be
    /// written from safe code:
    ///
    /// ```compile_fail
    /// use array_core::TypeDispatchTable;
    /// use buffer_store::Buffer;
    ///
    /// let mut b = Buffer::allocate(16, "float32", &TypeDispatchTable::with_builtins()).unwrap();
    /// b.set_typed::<f32>([1]).unwrap()[0] = 1.0;
    /// let view = b.view().clone();
    /// let shared = b.as_slice::<f32>().unwrap();
    /// view.write(&[99.0f32]).unwrap();
    /// assert_eq!(shared[0], 1.0);
    /// ```
    ///
    /// # Errors
    /// [`BufferError::TypeMismatch`] unless `T` is the element type, and
    /// [`BufferError::View`] wrapping `LengthMismatch` if `values` does not
    /// fit the current shape.
    pub fn write<T: Element>(&mut self, values: &[T]) -> Result<(), BufferError> {
        self.expect_type::<T>()?;
        // SAFETY: `&mut self` excludes every slice handed out by this
        // buffer, and the view is current by construction.
        unsafe { self.view.write(values)? };
        Ok(())
    }

    /// Copies the current contents out. Works for every [`Element`],
    /// including `bool`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, BufferError> {
        if !self.element.is::<T>() {
            return Err(self.type_mismatch(T::NAME));
        }
        Ok(self.view.to_vec::<T>()?)
    }

    /// Returns the buffer's name, if one was attached.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the type tag the buffer was allocated with.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Returns the resolved element type.
    pub fn element(&self) -> &ElementType {
        &self.element
    }

    /// Returns the fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.block.len()
    }

    /// Returns the largest element count any shape may have.
    pub fn max_elements(&self) -> usize {
        self.capacity() / self.element.size_bytes().max(1)
    }

    /// Returns the current shape.
    pub fn shape(&self) -> &Shape {
        self.view.shape()
    }

    /// Returns the current byte strides.
    pub fn strides(&self) -> &[usize] {
        self.view.strides()
    }

    /// Returns the current generation. It advances on every shape change.
    pub fn generation(&self) -> u64 {
        self.epoch.current()
    }

    /// Returns the start of the memory block. Stable for the buffer's life.
    pub fn as_ptr(&self) -> *const u8 {
        self.block.ptr().as_ptr()
    }

    /// Returns the declared template, if any.
    pub fn template(&self) -> Option<&ShapeTemplate> {
        self.template.as_ref()
    }

    /// Returns usage statistics.
    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    /// Validates `shape` against the capacity and rebuilds the view if the
    /// shape changed. Returns the presented byte count and whether the
    /// generation advanced.
    fn present(&mut self, shape: Shape) -> Result<(usize, bool), BufferError> {
        let capacity = self.capacity();
        let required = match shape.size_bytes(self.element.size_bytes()) {
            Some(bytes) if bytes <= capacity => bytes,
            other => {
                self.stats.record_rejection();
                return Err(BufferError::CapacityExceeded {
                    buffer: self.label().to_string(),
                    shape,
                    required: other.unwrap_or(usize::MAX),
                    capacity,
                });
            }
        };

        if &shape == self.view.shape() {
            return Ok((required, false));
        }

        self.epoch.advance();
        // SAFETY: `required <= capacity`, so the view stays inside the
        // block; the epoch was advanced so older views are now stale.
        self.view = unsafe { self.element.make_view(self.block.ptr(), shape, &self.epoch) };
        tracing::trace!(
            buffer = self.label(),
            shape = %self.view.shape(),
            generation = self.view.generation(),
            "buffer reshaped"
        );
        Ok((required, true))
    }

    fn expect_type<T: Element>(&self) -> Result<(), BufferError> {
        if self.element.is::<T>() {
            Ok(())
        } else {
            Err(self.type_mismatch(T::NAME))
        }
    }

    fn type_mismatch(&self, requested: &str) -> BufferError {
        BufferError::TypeMismatch {
            buffer: self.label().to_string(),
            requested: requested.to_string(),
            actual: self.element.name().to_string(),
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }
}

const UNNAMED: &str = "<unnamed>";

impl Drop for Buffer {
    fn drop(&mut self) {
        // Views may outlive the buffer; make them fail before the block
        // is released.
        self.epoch.retire();
    }
}

// The view's raw pointer targets memory this buffer exclusively owns, so
// the buffer can move between threads. It is NOT Sync: `set` mutates the
// block through `&mut self` while views alias it.
unsafe impl Send for Buffer {}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.label())
            .field("type_tag", &self.type_tag)
            .field("capacity", &self.capacity())
            .field("shape", self.shape())
            .field("generation", &self.generation())
            .finish()
    }
}
