// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # buffer-store
//!
//! Fixed-capacity, shape-aware memory buffers shared with an embedded
//! runtime, and the name-keyed registry that owns them.
//!
//! # Key Components
//!
//! - [`Buffer`]: one exclusively-owned, 64-byte aligned, zero-initialised
//!   memory block with an immutable element type. Its shape can change any
//!   number of times within the fixed capacity; the memory never moves.
//! - [`BufferRegistry`]: the buffers of a session, declared once from a
//!   table of [`BufferDecl`]s and looked up by name.
//! - [`ShapeTemplate`]: fixed axes a declaration imposes on bound shapes.
//! - [`Capacity`]: human-readable byte counts (`"4000"`, `"4K"`, `"1M"`).
//! - [`BufferStats`]: per-buffer counters (sets, reshapes, rejections).
//!
//! # Ownership Model
//!
//! ```text
//! BufferRegistry ──owns──► Buffer ──owns──► RawBlock (aligned bytes)
//!                             │
//!                             ├── Epoch (generation counter, shared)
//!                             │
//!                             └── ArrayView ──► handed to the runtime
//! ```
//!
//! A view never owns memory. Reshaping a buffer advances its epoch, and
//! dropping it retires the epoch, so old views fail instead of reading
//! memory that was reinterpreted or released.
//!
//! # Example
//! ```
//! use array_core::TypeDispatchTable;
//! use buffer_store::Buffer;
//!
//! let table = TypeDispatchTable::with_builtins();
//! let mut buf = Buffer::allocate(4000, "float_", &table).unwrap();
//! let region = buf.set_typed::<f32>([3, 2]).unwrap();
//! region.copy_from_slice(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(buf.view().to_vec::<f32>().unwrap()[5], 5.0);
//! assert!(buf.set([1001]).is_err());
//! ```

mod block;
mod buffer;
mod capacity;
mod error;
mod registry;
mod stats;
mod template;

pub use buffer::Buffer;
pub use capacity::Capacity;
pub use error::BufferError;
pub use registry::{BufferDecl, BufferRegistry, RegistryPolicy};
pub use template::ShapeTemplate;
pub use stats::BufferStats;

/// Alignment of every buffer's memory block, in bytes.
pub const BUFFER_ALIGN: usize = 64;
