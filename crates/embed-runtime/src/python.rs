// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPython embedder.
//!
//! Views cross the boundary as numpy arrays built directly over the host
//! buffer with `PyArray_NewFromDescr`; no element is copied. The arrays have
//! no base object, so they are only valid while the buffer keeps the shape
//! they were created with. A module must not keep them past the call that
//! received them (for inputs, past the next `set` on the same name).

use crate::{Embedder, InputSet, LoadedModule, ModuleConfig, OutputSet, RuntimeError};
use array_core::ArrayView;
use numpy::npyffi::{npy_intp, NpyTypes, NPY_ARRAY_ALIGNED, NPY_ARRAY_WRITEABLE, PY_ARRAY_API};
use numpy::{PyArrayDescr, PyArrayDescrMethods};
use pyo3::prelude::*;
use pyo3::types::{PyList, PyTracebackMethods};
use std::any::Any;
use std::os::raw::c_int;

/// Embedder driving the process's CPython interpreter.
///
/// The interpreter is never torn down: CPython does not support
/// re-initialisation reliably once extension modules such as numpy have
/// been imported. `shutdown` instead drops the imported module from
/// `sys.modules`, removes the `sys.path` entries `load` added and runs a
/// garbage collection, so the next `initialize` imports the module afresh.
#[derive(Debug, Default)]
pub struct PythonEmbedder {
    started: bool,
    module: Option<String>,
    inserted_paths: Vec<String>,
}

impl PythonEmbedder {
    pub fn new() -> Self {
        Self::default()
    }
}

fn py_error(py: Python<'_>, err: &PyErr) -> String {
    let traceback = err
        .traceback_bound(py)
        .and_then(|tb| tb.format().ok())
        .unwrap_or_default();
    format!("{traceback}{err}")
}

impl Embedder for PythonEmbedder {
    fn name(&self) -> &str {
        "cpython"
    }

    fn resource_key(&self) -> &str {
        "cpython"
    }

    fn start(&mut self) -> Result<(), RuntimeError> {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            py.import_bound("numpy")
                .map_err(|e| RuntimeError::Initialization(format!("cannot import numpy: {}", py_error(py, &e))))
        })?;
        self.started = true;
        tracing::debug!(version = %Python::with_gil(|py| py.version().to_string()), "python runtime started");
        Ok(())
    }

    fn load(&mut self, config: &ModuleConfig) -> Result<Box<dyn LoadedModule>, RuntimeError> {
        if !self.started {
            return Err(RuntimeError::Initialization("python runtime not started".into()));
        }
        Python::with_gil(|py| {
            let init_err = |e: PyErr| RuntimeError::Initialization(py_error(py, &e));

            let sys_path = py
                .import_bound("sys")
                .and_then(|sys| sys.getattr("path"))
                .map_err(init_err)?;
            let sys_path = sys_path
                .downcast::<PyList>()
                .map_err(|e| RuntimeError::Initialization(format!("sys.path: {e}")))?;
            for dir in &config.search_paths {
                let entry = dir.to_string_lossy().into_owned();
                if sys_path.contains(entry.as_str()).map_err(init_err)? {
                    continue;
                }
                sys_path
                    .insert(self.inserted_paths.len(), entry.as_str())
                    .map_err(init_err)?;
                self.inserted_paths.push(entry);
            }

            self.module = Some(config.name.clone());
            let module = py.import_bound(config.name.as_str()).map_err(init_err)?;
            let resolve = |symbol: &str| -> Result<PyObject, RuntimeError> {
                let attr = module.getattr(symbol).map_err(init_err)?;
                if !attr.is_callable() {
                    return Err(RuntimeError::Initialization(format!(
                        "'{}.{symbol}' is not callable",
                        config.name
                    )));
                }
                Ok(attr.unbind())
            };

            let loaded = LoadedPython {
                name: config.name.clone(),
                input_type: resolve(&config.input_type)?,
                output_type: resolve(&config.output_type)?,
                entry: resolve(&config.entry_point)?,
                entry_name: config.entry_point.clone(),
                inspect: resolve(&config.inspect)?,
                inspect_name: config.inspect.clone(),
            };
            tracing::debug!(module = %config.name, "python module imported");
            Ok(Box::new(loaded) as Box<dyn LoadedModule>)
        })
    }

    fn shutdown(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;
        Python::with_gil(|py| {
            if let Err(e) = self.forget_module(py) {
                tracing::warn!(error = %e, "cannot unload python module");
            }
            if let Err(e) = py.import_bound("gc").and_then(|gc| gc.call_method0("collect")) {
                tracing::warn!(error = %e, "gc.collect failed during shutdown");
            }
        });
        tracing::debug!("python runtime released");
    }
}

impl PythonEmbedder {
    /// Undoes what `load` did to `sys`: the module leaves `sys.modules` and
    /// the search paths it added leave `sys.path`.
    fn forget_module(&mut self, py: Python<'_>) -> PyResult<()> {
        let sys = py.import_bound("sys")?;
        if let Some(name) = self.module.take() {
            sys.getattr("modules")?
                .call_method1("pop", (name, py.None()))?;
        }
        let sys_path = sys.getattr("path")?;
        for entry in self.inserted_paths.drain(..) {
            if sys_path.contains(entry.as_str())? {
                sys_path.call_method1("remove", (entry,))?;
            }
        }
        Ok(())
    }
}

// ── Module ─────────────────────────────────────────────────────

struct LoadedPython {
    name: String,
    input_type: PyObject,
    output_type: PyObject,
    entry: PyObject,
    entry_name: String,
    inspect: PyObject,
    inspect_name: String,
}

impl LoadedPython {
    fn construct(&self, constructor: &PyObject, what: &str) -> Result<PyObject, RuntimeError> {
        Python::with_gil(|py| {
            constructor.call0(py).map_err(|e| {
                RuntimeError::Initialization(format!("{}: cannot construct {what}: {}", self.name, py_error(py, &e)))
            })
        })
    }
}

impl LoadedModule for LoadedPython {
    fn name(&self) -> &str {
        &self.name
    }

    fn new_input_set(&self) -> Result<Box<dyn InputSet>, RuntimeError> {
        let object = self.construct(&self.input_type, "input set")?;
        Ok(Box::new(PythonInputs { object }))
    }

    fn new_output_set(&self) -> Result<Box<dyn OutputSet>, RuntimeError> {
        let object = self.construct(&self.output_type, "output set")?;
        Ok(Box::new(PythonOutputs { object }))
    }

    fn call_entry(
        &self,
        inputs: &mut dyn InputSet,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), RuntimeError> {
        let inputs = inputs
            .as_any_mut()
            .downcast_mut::<PythonInputs>()
            .ok_or_else(|| RuntimeError::boundary("call_entry", "input set was not created by this module"))?;
        let outputs = outputs
            .as_any_mut()
            .downcast_mut::<PythonOutputs>()
            .ok_or_else(|| RuntimeError::boundary("call_entry", "output set was not created by this module"))?;

        Python::with_gil(|py| {
            self.entry
                .call1(py, (inputs.object.clone_ref(py), outputs.object.clone_ref(py)))
                .map(drop)
                .map_err(|e| RuntimeError::Computation {
                    callable: format!("{}.{}", self.name, self.entry_name),
                    message: py_error(py, &e),
                })
        })
    }

    fn inspect(&self, view: &ArrayView) -> Result<(), RuntimeError> {
        Python::with_gil(|py| {
            let array = to_numpy(py, view)?;
            self.inspect
                .call1(py, (array,))
                .map(drop)
                .map_err(|e| RuntimeError::Computation {
                    callable: format!("{}.{}", self.name, self.inspect_name),
                    message: py_error(py, &e),
                })
        })
    }
}

// ── Boundary objects ───────────────────────────────────────────

struct PythonInputs {
    object: PyObject,
}

impl InputSet for PythonInputs {
    fn set(&mut self, name: &str, view: &ArrayView) -> Result<(), RuntimeError> {
        Python::with_gil(|py| {
            let array = to_numpy(py, view)?;
            self.object
                .call_method1(py, "set", (name, array))
                .map(drop)
                .map_err(|e| RuntimeError::boundary("set", py_error(py, &e)))
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct PythonOutputs {
    object: PyObject,
}

impl OutputSet for PythonOutputs {
    fn set_buffer(&mut self, name: &str, view: &ArrayView) -> Result<(), RuntimeError> {
        Python::with_gil(|py| {
            let array = to_numpy(py, view)?;
            self.object
                .call_method1(py, "set_buffer", (name, array))
                .map(drop)
                .map_err(|e| RuntimeError::boundary("set_buffer", py_error(py, &e)))
        })
    }

    fn get_shape(&self, name: &str) -> Result<Vec<i64>, RuntimeError> {
        Python::with_gil(|py| {
            self.object
                .call_method1(py, "get_shape", (name,))
                .and_then(|shape| shape.extract::<Vec<i64>>(py))
                .map_err(|e| RuntimeError::boundary("get_shape", py_error(py, &e)))
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Wraps `view`'s memory in a writeable numpy array without copying.
fn to_numpy<'py>(py: Python<'py>, view: &ArrayView) -> Result<Bound<'py, PyAny>, RuntimeError> {
    let data = view.as_ptr()?;
    let descr = PyArrayDescr::new_bound(py, view.element().typestr())
        .map_err(|e| RuntimeError::boundary("dtype", py_error(py, &e)))?;

    // Shapes are bounded by the buffer capacity, which fits in isize.
    let mut dims: Vec<npy_intp> = view.shape().dims().iter().map(|&d| d as npy_intp).collect();
    let mut strides: Vec<npy_intp> = view.strides().iter().map(|&s| s as npy_intp).collect();
    let rank = dims.len() as c_int;

    // SAFETY: `data` points at a live allocation of at least
    // `view.len_bytes()` bytes, checked against the buffer's generation
    // above. The descriptor reference is stolen by numpy. A null base
    // leaves ownership of the memory with the host buffer.
    unsafe {
        let array = PY_ARRAY_API.PyArray_NewFromDescr(
            py,
            PY_ARRAY_API.get_type_object(py, NpyTypes::PyArray_Type),
            descr.into_dtype_ptr(),
            rank,
            dims.as_mut_ptr(),
            strides.as_mut_ptr(),
            data.cast(),
            NPY_ARRAY_WRITEABLE | NPY_ARRAY_ALIGNED,
            std::ptr::null_mut(),
        );
        Bound::from_owned_ptr_or_err(py, array).map_err(|e| RuntimeError::boundary("PyArray_NewFromDescr", py_error(py, &e)))
    }
}
