// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the embedded runtime.

use array_core::ArrayError;
use buffer_store::BufferError;

/// Errors that can occur while managing or calling into the embedded runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Starting the runtime, loading the module or building the boundary
    /// objects failed. Everything acquired so far has been released.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// A callable inside the embedded module raised or returned an error.
    #[error("computation error in '{callable}': {message}")]
    Computation { callable: String, message: String },

    /// Another handle already holds the embedded runtime.
    #[error("runtime '{0}' is already initialized by another handle")]
    AlreadyActive(String),

    /// The operation is not allowed in the handle's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An earlier computation error left the session unusable.
    #[error("session poisoned by an earlier computation error: {0}")]
    Poisoned(String),

    /// A boundary object rejected a call or returned something unusable.
    #[error("boundary call '{op}' failed: {detail}")]
    Boundary { op: String, detail: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A buffer operation failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// A view operation failed.
    #[error(transparent)]
    View(#[from] ArrayError),
}

impl RuntimeError {
    pub(crate) fn boundary(op: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Boundary {
            op: op.into(),
            detail: detail.to_string(),
        }
    }

    /// Returns `true` for errors raised by the embedded module's own code.
    pub fn is_computation(&self) -> bool {
        matches!(self, Self::Computation { .. })
    }
}
