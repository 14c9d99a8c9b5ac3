// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! In-process embedder for modules written in Rust.
//!
//! A [`NativeModule`] is a symbol table: the input-set and output-set
//! constructors, entry points and inspect callables, each under a name.
//! [`NativeEmbedder`] hosts any number of modules and resolves the symbols
//! named in [`ModuleConfig`] when one is loaded, exactly as a dynamic
//! runtime would resolve attributes of an imported module.

use crate::{Embedder, InputSet, LoadedModule, ModuleConfig, OutputSet, RuntimeError};
use array_core::{ArrayView, Element, Shape};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Entry point signature: read the inputs, write and report the outputs.
pub type EntryFn = Arc<dyn Fn(&NativeInputs, &mut NativeOutputs) -> Result<(), String> + Send + Sync>;

/// Inspect callable signature.
pub type InspectFn = Arc<dyn Fn(&ArrayView) -> Result<(), String> + Send + Sync>;

/// Elements printed by [`print_view`] before eliding the rest.
const PRINT_LIMIT: usize = 1000;

/// Default inspect callable: prints the view numpy-style to stdout.
pub fn print_view(view: &ArrayView) -> Result<(), String> {
    let text = view.render(PRINT_LIMIT).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

// ── Module ─────────────────────────────────────────────────────

#[derive(Clone)]
enum Symbol {
    InputType,
    OutputType,
    Entry(EntryFn),
    Inspect(InspectFn),
}

impl Symbol {
    fn kind(&self) -> &'static str {
        match self {
            Symbol::InputType => "an input type",
            Symbol::OutputType => "an output type",
            Symbol::Entry(_) => "an entry point",
            Symbol::Inspect(_) => "an inspect callable",
        }
    }
}

/// A Rust module with named symbols.
///
/// # Example
/// ```
/// use embed_runtime::NativeModule;
///
/// let module = NativeModule::standard("model", |inputs, outputs| {
///     let values = inputs.to_vec::<f32>("input_a")?;
///     let shape = inputs.view("input_a")?.shape().clone();
///     outputs.set_output("output_a", shape, &values)
/// });
/// assert_eq!(module.name(), "model");
/// ```
#[derive(Clone)]
pub struct NativeModule {
    name: String,
    symbols: BTreeMap<String, Symbol>,
}

impl NativeModule {
    /// Creates a module with no symbols.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: BTreeMap::new(),
        }
    }

    /// Creates a module exporting the default symbol names:
    /// `InputDataSet`, `OutputDataSet`, `model` (the given entry point)
    /// and `show` ([`print_view`]).
    pub fn standard<F>(name: impl Into<String>, entry: F) -> Self
    where
        F: Fn(&NativeInputs, &mut NativeOutputs) -> Result<(), String> + Send + Sync + 'static,
    {
        let defaults = ModuleConfig::default();
        Self::new(name)
            .with_input_type(&defaults.input_type)
            .with_output_type(&defaults.output_type)
            .with_entry(&defaults.entry_point, entry)
            .with_inspect(&defaults.inspect, print_view)
    }

    /// Exports an input-set constructor under `symbol`.
    pub fn with_input_type(mut self, symbol: &str) -> Self {
        self.symbols.insert(symbol.to_string(), Symbol::InputType);
        self
    }

    /// Exports an output-set constructor under `symbol`.
    pub fn with_output_type(mut self, symbol: &str) -> Self {
        self.symbols.insert(symbol.to_string(), Symbol::OutputType);
        self
    }

    /// Exports an entry point under `symbol`.
    pub fn with_entry<F>(mut self, symbol: &str, entry: F) -> Self
    where
        F: Fn(&NativeInputs, &mut NativeOutputs) -> Result<(), String> + Send + Sync + 'static,
    {
        self.symbols.insert(symbol.to_string(), Symbol::Entry(Arc::new(entry)));
        self
    }

    /// Exports an inspect callable under `symbol`.
    pub fn with_inspect<F>(mut self, symbol: &str, inspect: F) -> Self
    where
        F: Fn(&ArrayView) -> Result<(), String> + Send + Sync + 'static,
    {
        self.symbols
            .insert(symbol.to_string(), Symbol::Inspect(Arc::new(inspect)));
        self
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the exported symbol names.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    fn lookup(&self, symbol: &str) -> Result<&Symbol, RuntimeError> {
        self.symbols.get(symbol).ok_or_else(|| {
            RuntimeError::Initialization(format!(
                "module '{}' has no attribute '{symbol}'",
                self.name
            ))
        })
    }

    fn wrong_kind(&self, symbol: &str, found: &Symbol, expected: &str) -> RuntimeError {
        RuntimeError::Initialization(format!(
            "'{}.{symbol}' is {}, expected {expected}",
            self.name,
            found.kind()
        ))
    }
}

impl std::fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .field("symbols", &self.symbols.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct LoadedNative {
    name: String,
    entry_name: String,
    entry: EntryFn,
    inspect_name: String,
    inspect: InspectFn,
}

impl LoadedModule for LoadedNative {
    fn name(&self) -> &str {
        &self.name
    }

    fn new_input_set(&self) -> Result<Box<dyn InputSet>, RuntimeError> {
        Ok(Box::<NativeInputs>::default())
    }

    fn new_output_set(&self) -> Result<Box<dyn OutputSet>, RuntimeError> {
        Ok(Box::new(NativeOutputs::new()))
    }

    fn call_entry(
        &self,
        inputs: &mut dyn InputSet,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), RuntimeError> {
        let inputs = inputs
            .as_any_mut()
            .downcast_mut::<NativeInputs>()
            .ok_or_else(|| RuntimeError::boundary("call_entry", "input set was not created by this module"))?;
        let outputs = outputs
            .as_any_mut()
            .downcast_mut::<NativeOutputs>()
            .ok_or_else(|| RuntimeError::boundary("call_entry", "output set was not created by this module"))?;
        (self.entry)(&*inputs, outputs).map_err(|message| RuntimeError::Computation {
            callable: format!("{}.{}", self.name, self.entry_name),
            message,
        })
    }

    fn inspect(&self, view: &ArrayView) -> Result<(), RuntimeError> {
        (self.inspect)(view).map_err(|message| RuntimeError::Computation {
            callable: format!("{}.{}", self.name, self.inspect_name),
            message,
        })
    }
}

// ── Boundary objects ───────────────────────────────────────────

/// Input set handed to native entry points.
#[derive(Debug, Default)]
pub struct NativeInputs {
    views: BTreeMap<String, ArrayView>,
}

impl NativeInputs {
    /// Returns the view bound to input `name`.
    pub fn view(&self, name: &str) -> Result<&ArrayView, String> {
        self.views
            .get(name)
            .ok_or_else(|| format!("input '{name}' has not been set"))
    }

    /// Copies input `name` out as `T`.
    pub fn to_vec<T: Element>(&self, name: &str) -> Result<Vec<T>, String> {
        self.view(name)?.to_vec::<T>().map_err(|e| e.to_string())
    }

    /// Returns the names of all inputs set so far.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }
}

impl InputSet for NativeInputs {
    fn set(&mut self, name: &str, view: &ArrayView) -> Result<(), RuntimeError> {
        self.views.insert(name.to_string(), view.clone());
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
struct OutputSlot {
    view: ArrayView,
    reported: Option<Shape>,
}

/// Output set handed to native entry points.
///
/// During `invoke` every output view is flat and spans the whole buffer.
/// The entry point writes its result into the leading elements and reports
/// the produced shape; the host then re-presents the buffer with it. A
/// reported shape persists until the module reports a new one.
///
/// Only the embedder creates output sets, so an entry point is the only
/// code that can write through them, and it runs while the handle holds
/// every buffer exclusively.
#[derive(Debug)]
pub struct NativeOutputs {
    slots: BTreeMap<String, OutputSlot>,
}

impl NativeOutputs {
    pub(crate) fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Returns the view bound to output `name`.
    pub fn view(&self, name: &str) -> Result<&ArrayView, String> {
        self.slot(name).map(|slot| &slot.view)
    }

    /// Writes `values` into output `name` and reports `shape`.
    ///
    /// `values` must hold exactly `product(shape)` elements of the output's
    /// element type.
    pub fn set_output<T: Element>(
        &mut self,
        name: &str,
        shape: impl Into<Shape>,
        values: &[T],
    ) -> Result<(), String> {
        let shape = shape.into();
        if shape.checked_num_elements() != Some(values.len()) {
            return Err(format!(
                "output '{name}': shape {shape} needs {} values, got {}",
                shape.num_elements(),
                values.len()
            ));
        }
        let slot = self.slot_mut(name)?;
        // SAFETY: output sets are built by `LoadedNative` only and written
        // during `invoke`, which borrows the handle and its registry
        // mutably, so no slice of the output buffer is alive.
        unsafe { slot.view.write(values) }.map_err(|e| format!("output '{name}': {e}"))?;
        slot.reported = Some(shape);
        Ok(())
    }

    /// Reports the shape of output `name` after writing it through the view.
    pub fn report_shape(&mut self, name: &str, shape: impl Into<Shape>) -> Result<(), String> {
        self.slot_mut(name)?.reported = Some(shape.into());
        Ok(())
    }

    /// Returns the last shape reported for output `name`.
    pub fn reported(&self, name: &str) -> Option<&Shape> {
        self.slots.get(name).and_then(|slot| slot.reported.as_ref())
    }

    fn slot(&self, name: &str) -> Result<&OutputSlot, String> {
        self.slots
            .get(name)
            .ok_or_else(|| format!("output '{name}' has not been set"))
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut OutputSlot, String> {
        self.slots
            .get_mut(name)
            .ok_or_else(|| format!("output '{name}' has not been set"))
    }
}

impl OutputSet for NativeOutputs {
    fn set_buffer(&mut self, name: &str, view: &ArrayView) -> Result<(), RuntimeError> {
        match self.slots.get_mut(name) {
            Some(slot) => slot.view = view.clone(),
            None => {
                self.slots.insert(
                    name.to_string(),
                    OutputSlot {
                        view: view.clone(),
                        reported: None,
                    },
                );
            }
        }
        Ok(())
    }

    fn get_shape(&self, name: &str) -> Result<Vec<i64>, RuntimeError> {
        let shape = self
            .reported(name)
            .ok_or_else(|| RuntimeError::boundary("get_shape", format!("no shape reported for output '{name}'")))?;
        shape
            .dims()
            .iter()
            .map(|&d| i64::try_from(d).map_err(|e| RuntimeError::boundary("get_shape", e)))
            .collect()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── Embedder ───────────────────────────────────────────────────

/// Counts lifecycle calls on a [`NativeEmbedder`]; clones share counters.
#[derive(Debug, Clone, Default)]
pub struct LifecycleCounters {
    starts: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl LifecycleCounters {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::Acquire)
    }
}

/// Embedder hosting [`NativeModule`]s in the current process.
#[derive(Debug)]
pub struct NativeEmbedder {
    resource_key: String,
    modules: BTreeMap<String, NativeModule>,
    running: bool,
    counters: LifecycleCounters,
}

impl NativeEmbedder {
    /// Creates an embedder with resource key `"native"`.
    pub fn new() -> Self {
        Self::with_resource_key("native")
    }

    /// Creates an embedder leasing a custom resource key. Independent keys
    /// can be initialized concurrently.
    pub fn with_resource_key(key: impl Into<String>) -> Self {
        Self {
            resource_key: key.into(),
            modules: BTreeMap::new(),
            running: false,
            counters: LifecycleCounters::default(),
        }
    }

    /// Makes `module` importable under its name.
    pub fn with_module(mut self, module: NativeModule) -> Self {
        self.register(module);
        self
    }

    /// Makes `module` importable under its name, replacing any previous one.
    pub fn register(&mut self, module: NativeModule) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Returns a clone sharing this embedder's lifecycle counts.
    pub fn counters(&self) -> LifecycleCounters {
        self.counters.clone()
    }

    /// Returns `true` between `start` and `shutdown`.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for NativeEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for NativeEmbedder {
    fn name(&self) -> &str {
        "native"
    }

    fn resource_key(&self) -> &str {
        &self.resource_key
    }

    fn start(&mut self) -> Result<(), RuntimeError> {
        if self.running {
            return Err(RuntimeError::Initialization("native runtime already running".into()));
        }
        self.running = true;
        self.counters.starts.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn load(&mut self, config: &ModuleConfig) -> Result<Box<dyn LoadedModule>, RuntimeError> {
        if !self.running {
            return Err(RuntimeError::Initialization("native runtime not started".into()));
        }
        self.counters.loads.fetch_add(1, Ordering::AcqRel);
        let module = self.modules.get(&config.name).ok_or_else(|| {
            RuntimeError::Initialization(format!("no module named '{}'", config.name))
        })?;

        match module.lookup(&config.input_type)? {
            Symbol::InputType => {}
            other => return Err(module.wrong_kind(&config.input_type, other, "an input type")),
        }
        match module.lookup(&config.output_type)? {
            Symbol::OutputType => {}
            other => return Err(module.wrong_kind(&config.output_type, other, "an output type")),
        }
        let entry = match module.lookup(&config.entry_point)? {
            Symbol::Entry(f) => Arc::clone(f),
            other => return Err(module.wrong_kind(&config.entry_point, other, "an entry point")),
        };
        let inspect = match module.lookup(&config.inspect)? {
            Symbol::Inspect(f) => Arc::clone(f),
            other => return Err(module.wrong_kind(&config.inspect, other, "an inspect callable")),
        };

        tracing::debug!(module = %config.name, "native module loaded");
        Ok(Box::new(LoadedNative {
            name: module.name().to_string(),
            entry_name: config.entry_point.clone(),
            entry,
            inspect_name: config.inspect.clone(),
            inspect,
        }))
    }

    fn shutdown(&mut self) {
        if self.running {
            self.running = false;
            self.counters.shutdowns.fetch_add(1, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use array_core::{Epoch, ElementType};
    use std::ptr::NonNull;

    fn copy_module() -> NativeModule {
        NativeModule::standard("model", |inputs, outputs| {
            let view = inputs.view("input_a")?;
            let values = view.to_vec::<f32>().map_err(|e| e.to_string())?;
            outputs.set_output("output_a", view.shape().clone(), &values)
        })
    }

    fn started(module: NativeModule) -> NativeEmbedder {
        let mut e = NativeEmbedder::with_resource_key("native-unit").with_module(module);
        e.start().unwrap();
        e
    }

    #[test]
    fn test_load_resolves_symbols() {
        let mut e = started(copy_module());
        let m = e.load(&ModuleConfig::default()).unwrap();
        assert_eq!(m.name(), "model");
        assert_eq!(e.counters().loads(), 1);
    }

    #[test]
    fn test_load_before_start_fails() {
        let mut e = NativeEmbedder::new().with_module(copy_module());
        assert!(matches!(
            e.load(&ModuleConfig::default()),
            Err(RuntimeError::Initialization(_))
        ));
    }

    #[test]
    fn test_missing_module() {
        let mut e = started(copy_module());
        let config = ModuleConfig {
            name: "nope".into(),
            ..Default::default()
        };
        assert!(matches!(e.load(&config), Err(RuntimeError::Initialization(_))));
    }

    #[test]
    fn test_missing_or_wrong_symbol() {
        let mut e = started(copy_module());
        let missing = ModuleConfig {
            entry_point: "run".into(),
            ..Default::default()
        };
        assert!(e.load(&missing).is_err());

        let wrong_kind = ModuleConfig {
            entry_point: "show".into(),
            ..Default::default()
        };
        match e.load(&wrong_kind) {
            Err(RuntimeError::Initialization(msg)) => assert!(msg.contains("is an inspect callable, expected an entry point")),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("wrong symbol kind accepted"),
        }
    }

    #[test]
    fn test_shutdown_is_counted_once() {
        let mut e = started(copy_module());
        let counters = e.counters();
        e.shutdown();
        e.shutdown();
        assert_eq!(counters.starts(), 1);
        assert_eq!(counters.shutdowns(), 1);
        assert!(!e.is_running());
    }

    #[test]
    fn test_output_set_reports_shape() {
        let mut words = vec![0u64; 8];
        let epoch = Epoch::new();
        let ptr = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
        let view = unsafe { ElementType::of::<f32>().make_view(ptr, Shape::vector(16), &epoch) };

        let mut outputs = NativeOutputs::new();
        assert!(outputs.get_shape("output_a").is_err());
        outputs.set_buffer("output_a", &view).unwrap();
        assert!(outputs.get_shape("output_a").is_err());

        outputs
            .set_output("output_a", [2, 2], &[1.0f32, 2.0, 3.0, 4.0])
            .unwrap();
        assert_eq!(outputs.get_shape("output_a").unwrap(), vec![2, 2]);
        assert_eq!(&view.to_vec::<f32>().unwrap()[..4], &[1.0, 2.0, 3.0, 4.0]);

        // Rebinding keeps the reported shape.
        outputs.set_buffer("output_a", &view).unwrap();
        assert_eq!(outputs.reported("output_a"), Some(&Shape::matrix(2, 2)));

        assert!(outputs.set_output("output_a", [3], &[1.0f32]).is_err());
        assert!(outputs.set_output("output_a", [17], &[0.0f32; 17]).is_err());
        epoch.retire();
    }

    #[test]
    fn test_entry_error_is_computation() {
        let failing = NativeModule::standard("model", |_, _| Err("boom".to_string()));
        let mut e = started(failing);
        let m = e.load(&ModuleConfig::default()).unwrap();
        let mut inputs = m.new_input_set().unwrap();
        let mut outputs = m.new_output_set().unwrap();
        match m.call_entry(inputs.as_mut(), outputs.as_mut()) {
            Err(RuntimeError::Computation { callable, message }) => {
                assert_eq!(callable, "model.model");
                assert_eq!(message, "boom");
            }
            other => panic!("expected computation error, got {other:?}"),
        }
    }
}
