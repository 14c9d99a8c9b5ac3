// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The contract between the host and an embedded runtime.
//!
//! An [`Embedder`] starts and stops the runtime and loads a module. The
//! loaded module exposes four symbols, named in [`ModuleConfig`]:
//!
//! | Symbol        | Role                                               |
//! |---------------|----------------------------------------------------|
//! | `input_type`  | constructs an [`InputSet`] (`set(name, view)`)      |
//! | `output_type` | constructs an [`OutputSet`] (`set_buffer`, `get_shape`) |
//! | `entry_point` | `model(input_set, output_set)`                     |
//! | `inspect`     | `show(view)`                                       |
//!
//! Boundary objects belong to the module that created them; a module
//! receives only the sets it constructed, so implementations may downcast
//! through `as_any_mut`.

use crate::{ModuleConfig, RuntimeError};
use array_core::ArrayView;
use std::any::Any;

/// A runtime implementation the host can embed.
pub trait Embedder {
    /// Human-readable name (e.g., `"native"`, `"cpython"`).
    fn name(&self) -> &str;

    /// Key of the process-wide resource this embedder drives. At most one
    /// handle per key may be initialized at a time.
    fn resource_key(&self) -> &str;

    /// Starts the runtime.
    fn start(&mut self) -> Result<(), RuntimeError>;

    /// Loads a module and resolves its four symbols.
    fn load(&mut self, module: &ModuleConfig) -> Result<Box<dyn LoadedModule>, RuntimeError>;

    /// Stops the runtime. Must tolerate being called after a failed
    /// `start` and must not fail.
    fn shutdown(&mut self);
}

/// A loaded module with its symbols resolved.
pub trait LoadedModule {
    /// Module name.
    fn name(&self) -> &str;

    /// Constructs a fresh input set.
    fn new_input_set(&self) -> Result<Box<dyn InputSet>, RuntimeError>;

    /// Constructs a fresh output set.
    fn new_output_set(&self) -> Result<Box<dyn OutputSet>, RuntimeError>;

    /// Calls the entry point. Errors raised by module code are reported as
    /// [`RuntimeError::Computation`].
    fn call_entry(
        &self,
        inputs: &mut dyn InputSet,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), RuntimeError>;

    /// Calls the inspect callable on a view.
    fn inspect(&self, view: &ArrayView) -> Result<(), RuntimeError>;
}

/// The module-side object that receives input views.
pub trait InputSet {
    /// Hands the current view of input `name` to the module.
    fn set(&mut self, name: &str, view: &ArrayView) -> Result<(), RuntimeError>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The module-side object that receives output views and reports shapes.
pub trait OutputSet {
    /// Hands the current view of output `name` to the module.
    fn set_buffer(&mut self, name: &str, view: &ArrayView) -> Result<(), RuntimeError>;

    /// Returns the shape the module produced for output `name`.
    ///
    /// Dimensions are signed because foreign runtimes report them that way;
    /// the host rejects negative values.
    fn get_shape(&self, name: &str) -> Result<Vec<i64>, RuntimeError>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
