// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The runtime handle: one embedded-runtime session and its buffers.
//!
//! ```text
//! RuntimeHandle::new            builds the buffer registry
//!     │  .initialize()          lease → start → load → sets → bind outputs
//!     ▼
//! Initialized
//!     │  .bind_input()          registry → Buffer::set → InputSet::set
//!     │  .invoke()              reset_flat → entry → get_shape → reset
//!     │  .read_output()         registry → OutputSlice
//!     │  .finalize() / drop     sets → module → shutdown → lease
//!     ▼
//! Finalized
//! ```
//!
//! The handle is move-only. [`RuntimeHandle::take`] moves the live session
//! out of a handle held in place; the source is left detached and its drop
//! does nothing.

use crate::{
    Embedder, InputSet, InvocationMetrics, LoadedModule, OutputSet, RuntimeConfig, RuntimeError,
    RuntimeLease,
};
use array_core::{ArrayView, Element, ElementType, PlainElement, Shape, TypeDispatchTable};
use buffer_store::{Buffer, BufferRegistry};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

// ── Lifecycle ──────────────────────────────────────────────────

/// Where a [`RuntimeHandle`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum LifecycleState {
    /// Buffers are declared; the embedded runtime is not running.
    Uninitialized,
    /// The runtime is running and the module is loaded.
    Initialized,
    /// Terminal. Also reported by a handle whose state was moved out.
    Finalized,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Finalized => "finalized",
        })
    }
}

// ── Output access ──────────────────────────────────────────────

/// Read access to an output buffer after `invoke`.
#[derive(Debug, Clone, Copy)]
pub struct OutputSlice<'a> {
    buffer: &'a Buffer,
}

impl<'a> OutputSlice<'a> {
    /// Returns the start of the buffer's memory.
    pub fn as_ptr(&self) -> *const u8 {
        self.buffer.as_ptr()
    }

    /// Returns the shape the module produced.
    pub fn shape(&self) -> &'a Shape {
        self.buffer.shape()
    }

    /// Returns the byte strides of the produced shape.
    pub fn strides(&self) -> &'a [usize] {
        self.buffer.strides()
    }

    /// Returns the element type.
    pub fn element(&self) -> &'a ElementType {
        self.buffer.element()
    }

    /// Returns the bytes covered by the produced shape.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buffer.as_bytes()
    }

    /// Returns the produced elements as a typed slice.
    pub fn as_slice<T: PlainElement>(&self) -> Result<&'a [T], RuntimeError> {
        Ok(self.buffer.as_slice::<T>()?)
    }

    /// Copies the produced elements out.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, RuntimeError> {
        Ok(self.buffer.to_vec::<T>()?)
    }

    /// Returns the current view.
    pub fn view(&self) -> &'a ArrayView {
        self.buffer.view()
    }
}

// ── Handle ─────────────────────────────────────────────────────

struct Session {
    module: Box<dyn LoadedModule>,
    inputs: Box<dyn InputSet>,
    outputs: Box<dyn OutputSet>,
    poisoned: Option<String>,
    lease: RuntimeLease,
}

struct HandleState {
    config: RuntimeConfig,
    embedder: Box<dyn Embedder>,
    registry: BufferRegistry,
    session: Option<Session>,
    lifecycle: LifecycleState,
    metrics: InvocationMetrics,
}

/// Borrowed pieces of a live session, split so buffers and boundary
/// objects can be used together.
struct Live<'a> {
    config: &'a RuntimeConfig,
    registry: &'a mut BufferRegistry,
    session: &'a mut Session,
    metrics: &'a mut InvocationMetrics,
}

/// Owner of an embedded-runtime session.
///
/// # Example
/// ```
/// use embed_runtime::{NativeEmbedder, NativeModule, RuntimeConfig, RuntimeHandle};
///
/// let module = NativeModule::standard("model", |inputs, outputs| {
///     let values = inputs.to_vec::<f32>("input_a")?;
///     let shape = inputs.view("input_a")?.shape().clone();
///     outputs.set_output("output_a", shape, &values)
/// });
/// let embedder = NativeEmbedder::with_resource_key("doc-handle").with_module(module);
///
/// let mut handle = RuntimeHandle::new(RuntimeConfig::default(), embedder).unwrap();
/// handle.initialize().unwrap();
/// handle
///     .bind_input_typed::<f32>("input_a", [3, 2])
///     .unwrap()
///     .copy_from_slice(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
/// handle.invoke().unwrap();
///
/// let out = handle.read_output("output_a").unwrap();
/// assert_eq!(out.shape().dims(), &[3, 2]);
/// assert_eq!(out.as_slice::<f32>().unwrap(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
/// ```
pub struct RuntimeHandle {
    inner: Option<HandleState>,
}

impl RuntimeHandle {
    /// Creates an uninitialized handle using the built-in element types.
    ///
    /// Buffer declarations are resolved and allocated here, so unknown type
    /// tags and invalid capacities surface before the runtime starts.
    pub fn new(config: RuntimeConfig, embedder: impl Embedder + 'static) -> Result<Self, RuntimeError> {
        Self::with_table(config, embedder, &TypeDispatchTable::with_builtins())
    }

    /// Creates an uninitialized handle resolving type tags through `table`.
    pub fn with_table(
        config: RuntimeConfig,
        embedder: impl Embedder + 'static,
        table: &TypeDispatchTable,
    ) -> Result<Self, RuntimeError> {
        let decls = config.buffer_decls(table)?;
        let registry = BufferRegistry::with_policy(table, decls, config.registry_policy())?;
        tracing::info!(
            embedder = embedder.name(),
            module = %config.module.name,
            buffers = registry.len(),
            "runtime handle created"
        );
        Ok(Self {
            inner: Some(HandleState {
                config,
                embedder: Box::new(embedder),
                registry,
                session: None,
                lifecycle: LifecycleState::Uninitialized,
                metrics: InvocationMetrics::default(),
            }),
        })
    }

    /// Starts the embedded runtime and loads the configured module.
    ///
    /// Acquires the process-wide lease for the embedder's resource, starts
    /// the runtime, resolves the module's symbols, constructs one input set
    /// and one output set, and hands every output buffer's current view to
    /// the output set.
    ///
    /// # Errors
    /// - [`RuntimeError::AlreadyActive`] if another handle holds the resource.
    /// - [`RuntimeError::Initialization`] if any later step fails. The
    ///   runtime is shut down, the lease released and the handle stays
    ///   uninitialized.
    /// - [`RuntimeError::InvalidState`] unless the handle is uninitialized.
    pub fn initialize(&mut self) -> Result<(), RuntimeError> {
        let st = self.inner_mut()?;
        if st.lifecycle != LifecycleState::Uninitialized {
            return Err(RuntimeError::InvalidState(format!(
                "cannot initialize a {} handle",
                st.lifecycle
            )));
        }

        let lease = RuntimeLease::acquire(st.embedder.resource_key())?;
        match st.open_session() {
            Ok((module, inputs, outputs)) => {
                tracing::info!(
                    embedder = st.embedder.name(),
                    module = module.name(),
                    outputs = st.config.outputs.len(),
                    "runtime initialized"
                );
                st.session = Some(Session {
                    module,
                    inputs,
                    outputs,
                    poisoned: None,
                    lease,
                });
                st.lifecycle = LifecycleState::Initialized;
                Ok(())
            }
            Err(err) => {
                st.embedder.shutdown();
                drop(lease);
                tracing::warn!(error = %err, "initialization failed, runtime shut down");
                Err(match err {
                    RuntimeError::Initialization(_) => err,
                    other => RuntimeError::Initialization(other.to_string()),
                })
            }
        }
    }

    /// Presents input `name` with `shape` and returns its writable region.
    ///
    /// The region is exactly `product(shape) * element_size` bytes. The
    /// buffer's new view has already been handed to the input set when this
    /// returns, so filling the region is all that is left to do.
    ///
    /// # Errors
    /// [`RuntimeError::Buffer`] wrapping `NameNotFound`, `CapacityExceeded`
    /// or `ShapeMismatch`; [`RuntimeError::Poisoned`] after an
    /// unrecoverable computation error. If the input set rejects the view,
    /// the buffer goes back to the shape the module last accepted.
    pub fn bind_input(&mut self, name: &str, shape: impl Into<Shape>) -> Result<&mut [u8], RuntimeError> {
        let shape = shape.into();
        let Live {
            registry,
            session,
            metrics,
            ..
        } = self.live()?;
        let buffer = registry.get_or_declare(name)?;
        hand_over(buffer, session.inputs.as_mut(), name, |b| b.set(shape).map(drop))?;
        metrics.record_bind();
        Ok(buffer.as_bytes_mut())
    }

    /// Typed [`bind_input`](RuntimeHandle::bind_input). `T` must be exactly
    /// the buffer's element type.
    pub fn bind_input_typed<T: PlainElement>(
        &mut self,
        name: &str,
        shape: impl Into<Shape>,
    ) -> Result<&mut [T], RuntimeError> {
        let shape = shape.into();
        let Live {
            registry,
            session,
            metrics,
            ..
        } = self.live()?;
        let buffer = registry.get_or_declare(name)?;
        hand_over(buffer, session.inputs.as_mut(), name, |b| b.set_typed::<T>(shape).map(drop))?;
        metrics.record_bind();
        Ok(buffer.as_slice_mut::<T>()?)
    }

    /// Returns read access to buffer `name` with its current shape.
    ///
    /// Works in every state so results stay readable after `finalize`.
    pub fn read_output(&self, name: &str) -> Result<OutputSlice<'_>, RuntimeError> {
        let buffer = self.inner_ref()?.registry.get(name)?;
        Ok(OutputSlice { buffer })
    }

    /// Calls the module's entry point once.
    ///
    /// Every output is first presented flat at full capacity, then the
    /// entry point runs, then each output is re-presented with the shape
    /// the module reports for it.
    ///
    /// # Errors
    /// [`RuntimeError::Computation`] with the module's error text if the
    /// entry point fails. Unless `module.recoverable_errors` is set, the
    /// session is then poisoned and later calls fail with
    /// [`RuntimeError::Poisoned`] until the handle is finalized.
    pub fn invoke(&mut self) -> Result<(), RuntimeError> {
        let mut live = self.live()?;
        let start = Instant::now();
        let result = live.run_entry();
        let elapsed = start.elapsed();

        match result {
            Ok(shapes) => {
                tracing::debug!(elapsed_us = elapsed.as_micros() as u64, "invoke complete");
                live.metrics.record_success(elapsed, shapes);
                Ok(())
            }
            Err(err) => {
                live.metrics.record_failure(elapsed);
                if err.is_computation() && !live.config.module.recoverable_errors {
                    tracing::warn!(error = %err, "session poisoned");
                    live.session.poisoned = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Calls the module's inspect callable on buffer `name`'s current view.
    ///
    /// A failure is reported as [`RuntimeError::Computation`] but does not
    /// poison the session.
    pub fn inspect(&self, name: &str) -> Result<(), RuntimeError> {
        let st = self.inner_ref()?;
        let session = st.live_session()?;
        let buffer = st.registry.get(name)?;
        session.module.inspect(buffer.view())
    }

    /// Tears the session down: boundary objects, then the module, then the
    /// runtime, then the lease. Idempotent; also run on drop.
    pub fn finalize(&mut self) {
        let Some(st) = self.inner.as_mut() else {
            return;
        };
        if st.lifecycle == LifecycleState::Finalized {
            return;
        }
        if let Some(session) = st.session.take() {
            let Session {
                module,
                inputs,
                outputs,
                lease,
                ..
            } = session;
            drop(inputs);
            drop(outputs);
            drop(module);
            st.embedder.shutdown();
            drop(lease);
            tracing::info!(metrics = %st.metrics.summary(), "runtime finalized");
        }
        st.lifecycle = LifecycleState::Finalized;
    }

    /// Moves the whole session into a new handle, leaving `self` detached.
    ///
    /// A detached handle reports [`LifecycleState::Finalized`], is not
    /// valid, rejects every operation and does nothing on drop.
    pub fn take(&mut self) -> RuntimeHandle {
        RuntimeHandle {
            inner: self.inner.take(),
        }
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.inner
            .as_ref()
            .map_or(LifecycleState::Finalized, |st| st.lifecycle)
    }

    /// Returns `true` while this handle owns a running runtime.
    pub fn is_valid(&self) -> bool {
        self.inner.as_ref().is_some_and(|st| st.session.is_some())
    }

    /// Returns `true` after an unrecoverable computation error.
    pub fn is_poisoned(&self) -> bool {
        self.inner
            .as_ref()
            .and_then(|st| st.session.as_ref())
            .is_some_and(|s| s.poisoned.is_some())
    }

    /// Returns the buffer registry, or `None` for a detached handle.
    pub fn registry(&self) -> Option<&BufferRegistry> {
        self.inner.as_ref().map(|st| &st.registry)
    }

    /// Returns invocation metrics, or `None` for a detached handle.
    pub fn metrics(&self) -> Option<&InvocationMetrics> {
        self.inner.as_ref().map(|st| &st.metrics)
    }

    /// Returns the configuration, or `None` for a detached handle.
    pub fn config(&self) -> Option<&RuntimeConfig> {
        self.inner.as_ref().map(|st| &st.config)
    }

    // ── Private helpers ────────────────────────────────────────

    fn inner_ref(&self) -> Result<&HandleState, RuntimeError> {
        self.inner.as_ref().ok_or_else(detached)
    }

    fn inner_mut(&mut self) -> Result<&mut HandleState, RuntimeError> {
        self.inner.as_mut().ok_or_else(detached)
    }

    fn live(&mut self) -> Result<Live<'_>, RuntimeError> {
        let st = self.inner_mut()?;
        let lifecycle = st.lifecycle;
        let session = match st.session.as_mut() {
            Some(session) if lifecycle == LifecycleState::Initialized => session,
            _ => return Err(RuntimeError::InvalidState(format!("handle is {lifecycle}"))),
        };
        if let Some(reason) = &session.poisoned {
            return Err(RuntimeError::Poisoned(reason.clone()));
        }
        Ok(Live {
            config: &st.config,
            registry: &mut st.registry,
            session,
            metrics: &mut st.metrics,
        })
    }
}

fn detached() -> RuntimeError {
    RuntimeError::InvalidState("handle has been moved from".into())
}

/// Applies `present` to an input buffer and hands the new view to the input
/// set. On rejection the buffer is re-presented with its previous shape and
/// that view is handed over again, so host and module agree.
fn hand_over(
    buffer: &mut Buffer,
    inputs: &mut dyn InputSet,
    name: &str,
    present: impl FnOnce(&mut Buffer) -> Result<(), buffer_store::BufferError>,
) -> Result<(), RuntimeError> {
    let previous = buffer.shape().clone();
    present(buffer)?;
    if let Err(err) = inputs.set(name, buffer.view()) {
        tracing::warn!(buffer = name, shape = %buffer.shape(), error = %err, "input rejected, shape restored");
        buffer.reset(previous)?;
        if let Err(again) = inputs.set(name, buffer.view()) {
            tracing::warn!(buffer = name, error = %again, "restored input rejected");
        }
        return Err(err);
    }
    tracing::debug!(buffer = name, shape = %buffer.shape(), "input bound");
    Ok(())
}

impl HandleState {
    /// Everything `initialize` does after taking the lease. Objects created
    /// here are dropped on the error path before the caller shuts down.
    #[allow(clippy::type_complexity)]
    fn open_session(
        &mut self,
    ) -> Result<(Box<dyn LoadedModule>, Box<dyn InputSet>, Box<dyn OutputSet>), RuntimeError> {
        self.embedder.start()?;
        let module = self.embedder.load(&self.config.module)?;
        let inputs = module.new_input_set()?;
        let mut outputs = module.new_output_set()?;
        for name in &self.config.outputs {
            let buffer = self.registry.get(name)?;
            outputs.set_buffer(name, buffer.view())?;
        }
        Ok((module, inputs, outputs))
    }

    fn live_session(&self) -> Result<&Session, RuntimeError> {
        let session = match self.session.as_ref() {
            Some(session) if self.lifecycle == LifecycleState::Initialized => session,
            _ => {
                return Err(RuntimeError::InvalidState(format!(
                    "handle is {}",
                    self.lifecycle
                )))
            }
        };
        match &session.poisoned {
            Some(reason) => Err(RuntimeError::Poisoned(reason.clone())),
            None => Ok(session),
        }
    }
}

impl Live<'_> {
    /// Two-phase output presentation around one entry-point call. Returns
    /// the produced shape of every output.
    fn run_entry(&mut self) -> Result<BTreeMap<String, Vec<usize>>, RuntimeError> {
        for name in &self.config.outputs {
            let buffer = self.registry.get_mut(name)?;
            buffer.reset_flat()?;
            self.session.outputs.set_buffer(name, buffer.view())?;
        }

        let Session {
            module,
            inputs,
            outputs,
            ..
        } = &mut *self.session;
        module.call_entry(inputs.as_mut(), outputs.as_mut())?;

        let mut shapes = BTreeMap::new();
        for name in &self.config.outputs {
            let reported = self.session.outputs.get_shape(name)?;
            let shape = Shape::from_reported(&reported)
                .map_err(|e| RuntimeError::boundary("get_shape", format!("output '{name}': {e}")))?;
            let buffer = self.registry.get_mut(name)?;
            buffer.reset(shape)?;
            self.session.outputs.set_buffer(name, buffer.view())?;
            shapes.insert(name.clone(), buffer.shape().dims().to_vec());
        }
        Ok(shapes)
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RuntimeHandle");
        d.field("state", &self.state());
        if let Some(st) = &self.inner {
            d.field("embedder", &st.embedder.name())
                .field("module", &st.config.module.name)
                .field("buffers", &st.registry.len())
                .field("poisoned", &self.is_poisoned());
        }
        d.finish()
    }
}
