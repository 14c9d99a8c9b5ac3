// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # array-core
//!
//! Typed, shape-aware descriptors for memory shared with an embedded runtime.
//!
//! This crate provides:
//! - [`ElementKind`] / [`ElementType`]: per-type element size, numpy
//!   typestr and rendering, the unit the dispatch table hands out.
//! - [`TypeDispatchTable`]: maps symbolic type tags (`"float_"`,
//!   `"int32_t"`, `"float64"`, ...) to element types. Open for extension.
//! - [`Shape`]: dimension lists with row-major byte strides.
//! - [`ArrayView`]: a non-owning, generation-checked view over a buffer's
//!   memory, the object handed across the runtime boundary.
//!
//! # Design Goals
//! - Zero-copy views: a view is a pointer plus layout, never a copy.
//! - Stale views fail loudly instead of reading reinterpreted memory.
//! - No automatic type promotion: typed access must match the element kind.

mod dispatch;
mod element;
mod error;
mod shape;
mod view;

pub use dispatch::TypeDispatchTable;
pub use element::{Element, ElementKind, ElementType, PlainElement, Scalar};
pub use error::ArrayError;
pub use shape::Shape;
pub use view::{ArrayView, Epoch};
