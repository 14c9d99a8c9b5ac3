// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Aligned, zero-initialised raw memory owned by exactly one buffer.

use crate::{BufferError, BUFFER_ALIGN};
use std::alloc::{self, Layout};
use std::ptr::NonNull;

pub(crate) struct RawBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RawBlock {
    /// Allocates `len` zeroed bytes. `len` must be non-zero.
    pub(crate) fn zeroed(len: usize) -> Result<Self, BufferError> {
        debug_assert!(len > 0);
        let layout = Layout::from_size_align(len, BUFFER_ALIGN)
            .map_err(|e| BufferError::InvalidCapacity(format!("{len} bytes: {e}")))?;
        // SAFETY: `layout` has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        Ok(Self { ptr, layout })
    }

    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }

    pub(crate) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: the block owns `len()` initialised bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity on the
        // Rust side.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }
}

impl Drop for RawBlock {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// The block is plain owned bytes; moving it between threads is fine.
unsafe impl Send for RawBlock {}
