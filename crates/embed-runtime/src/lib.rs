// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # embed-runtime
//!
//! Lifecycle management for an embedded dynamic runtime that exchanges
//! shape-aware buffers with the host process without copying.
//!
//! The runtime takes:
//! - A [`RuntimeConfig`] declaring the buffers, the outputs and the module
//!   to load (TOML or programmatic).
//! - An [`Embedder`]: the runtime implementation. [`NativeEmbedder`] hosts
//!   in-process Rust modules; `PythonEmbedder` (feature `python`) embeds
//!   CPython and exposes buffers as numpy arrays.
//!
//! # Lifecycle
//! ```text
//! RuntimeHandle::new ──► Uninitialized
//!                            │  initialize()   (lease, start, load, bind outputs)
//!                            ▼
//!                        Initialized ◄── bind_input / invoke / inspect / read_output
//!                            │  finalize()  or drop
//!                            ▼
//!                        Finalized   (terminal)
//! ```
//!
//! At most one handle per embedder resource is `Initialized` at a time;
//! a process-wide lease enforces this.
//!
//! # Invocation
//! `invoke` presents every output buffer flat at full capacity, calls the
//! module's entry point with the input set and output set, then reads the
//! shape the module reports for each output and re-presents the buffer
//! with exactly that shape.

mod boundary;
mod config;
mod error;
mod handle;
mod lease;
mod metrics;
mod native;
#[cfg(feature = "python")]
mod python;

pub use boundary::{Embedder, InputSet, LoadedModule, OutputSet};
pub use config::{BufferSpec, FirstTouchConfig, ModuleConfig, RuntimeConfig};
pub use error::RuntimeError;
pub use handle::{LifecycleState, OutputSlice, RuntimeHandle};
pub use lease::RuntimeLease;
pub use metrics::InvocationMetrics;
pub use native::{
    print_view, EntryFn, InspectFn, LifecycleCounters, NativeEmbedder, NativeInputs, NativeModule,
    NativeOutputs,
};
#[cfg(feature = "python")]
pub use python::PythonEmbedder;
