// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for element dispatch and array views.

use crate::Shape;

/// Errors that can occur when resolving element types or accessing views.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArrayError {
    /// The type tag is not registered in the dispatch table.
    #[error("unsupported element type '{0}'")]
    UnsupportedType(String),

    /// The view was created for an older layout of its buffer.
    #[error("stale array view: created at generation {view}, buffer is at generation {current}")]
    Stale { view: u64, current: u64 },

    /// The owning buffer has been released.
    #[error("array view outlived its buffer (generation {view})")]
    Retired { view: u64 },

    /// Typed access requested with a different element type.
    #[error("element type mismatch: view holds {actual}, requested {requested}")]
    TypeMismatch {
        requested: String,
        actual: String,
    },

    /// More values supplied than the view can hold.
    #[error("length mismatch for shape {shape}: view holds {capacity} elements, got {actual}")]
    LengthMismatch {
        shape: Shape,
        capacity: usize,
        actual: usize,
    },

    /// An element kind cannot back a buffer.
    #[error("invalid element kind '{name}': {detail}")]
    InvalidElement { name: String, detail: String },

    /// A shape could not be interpreted (negative or overflowing dimensions).
    #[error("invalid shape {dims:?}: {detail}")]
    InvalidShape { dims: Vec<i64>, detail: String },
}
