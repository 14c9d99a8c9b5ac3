// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for buffers and the registry.

use crate::ShapeTemplate;
use array_core::{ArrayError, Shape};

/// Errors that can occur when allocating, reshaping or looking up buffers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// The type tag is not registered in the dispatch table.
    #[error("unsupported element type '{0}'")]
    UnsupportedType(String),

    /// The requested shape does not fit in the buffer's capacity.
    /// `required` saturates at `usize::MAX` when the byte count overflows.
    #[error("buffer '{buffer}': shape {shape} needs {required} bytes, capacity is {capacity}")]
    CapacityExceeded {
        buffer: String,
        shape: Shape,
        required: usize,
        capacity: usize,
    },

    /// The requested shape breaks a fixed axis of the declaration.
    #[error("buffer '{buffer}': shape {shape} does not match declared shape {template}")]
    ShapeMismatch {
        buffer: String,
        shape: Shape,
        template: ShapeTemplate,
    },

    /// No buffer with this name is declared.
    #[error("no buffer named '{0}'")]
    NameNotFound(String),

    /// A buffer with this name is already declared.
    #[error("buffer '{0}' declared twice")]
    DuplicateName(String),

    /// Attempted to allocate a zero-sized buffer.
    #[error("buffer '{buffer}': cannot allocate zero-sized buffer")]
    ZeroCapacity { buffer: String },

    /// Typed access with a type other than the buffer's element type.
    #[error("buffer '{buffer}': element type is {actual}, requested {requested}")]
    TypeMismatch {
        buffer: String,
        requested: String,
        actual: String,
    },

    /// A capacity string or declaration could not be interpreted.
    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    /// A view operation failed.
    #[error(transparent)]
    View(ArrayError),
}

impl From<ArrayError> for BufferError {
    fn from(err: ArrayError) -> Self {
        match err {
            ArrayError::UnsupportedType(tag) => Self::UnsupportedType(tag),
            other => Self::View(other),
        }
    }
}
