// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Round trips through CPython using `demos/model.py`.
//!
//! Requires a Python interpreter with numpy. The interpreter is a process
//! singleton, so the tests in this file take turns.

use embed_runtime::{PythonEmbedder, RuntimeConfig, RuntimeError, RuntimeHandle};
use pyo3::prelude::*;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn demos() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

fn config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.module.search_paths = vec![demos()];
    config
}

fn sys_path_count(entry: &str) -> usize {
    Python::with_gil(|py| {
        let path: Vec<String> = py
            .import_bound("sys")
            .and_then(|sys| sys.getattr("path"))
            .and_then(|path| path.extract())
            .unwrap();
        path.iter().filter(|p| p.as_str() == entry).count()
    })
}

fn python_handle(config: RuntimeConfig) -> RuntimeHandle {
    let mut h = RuntimeHandle::new(config, PythonEmbedder::new()).unwrap();
    h.initialize().unwrap();
    h
}

#[test]
fn test_python_sum() {
    let _guard = serial();
    let mut h = python_handle(config());

    let a: Vec<f32> = (0..6).map(|v| v as f32).collect();
    h.bind_input_typed::<f32>("input_a", [3, 2]).unwrap().copy_from_slice(&a);
    h.bind_input_typed::<f32>("input_b", [3, 2]).unwrap().copy_from_slice(&[0.5; 6]);
    h.invoke().unwrap();

    let out = h.read_output("output_a").unwrap();
    assert_eq!(out.shape().dims(), &[3, 2]);
    assert_eq!(
        out.to_vec::<f32>().unwrap(),
        vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]
    );
    h.inspect("output_a").unwrap();
}

#[test]
fn test_python_reinitialize() {
    let _guard = serial();
    for round in 0..2 {
        let mut h = python_handle(config());
        h.bind_input_typed::<f32>("input_a", [1]).unwrap()[0] = round as f32;
        h.bind_input_typed::<f32>("input_b", [1]).unwrap()[0] = 1.0;
        h.invoke().unwrap();
        assert_eq!(
            h.read_output("output_a").unwrap().to_vec::<f32>().unwrap(),
            vec![round as f32 + 1.0]
        );
    }
}

#[test]
fn test_python_fresh_handle_reimports_module() {
    let _guard = serial();
    let entry = demos().to_string_lossy().into_owned();
    let mut config = config();
    config.module.entry_point = "count".into();

    for _ in 0..3 {
        let mut h = python_handle(config.clone());
        assert_eq!(sys_path_count(&entry), 1);
        h.invoke().unwrap();
        h.invoke().unwrap();
        // Module-level state starts over with every handle.
        assert_eq!(h.read_output("output_a").unwrap().to_vec::<f32>().unwrap(), vec![2.0]);
        h.finalize();
        assert_eq!(sys_path_count(&entry), 0);
    }
}

#[test]
fn test_python_exception_is_computation_error() {
    let _guard = serial();
    let mut config = config();
    config.module.entry_point = "fail".into();
    let mut h = python_handle(config);

    match h.invoke() {
        Err(RuntimeError::Computation { callable, message }) => {
            assert_eq!(callable, "model.fail");
            assert!(message.contains("model rejected its input"));
        }
        other => panic!("expected computation error, got {other:?}"),
    }
    assert!(matches!(h.invoke(), Err(RuntimeError::Poisoned(_))));
}

#[test]
fn test_python_missing_symbol() {
    let _guard = serial();
    let mut config = config();
    config.module.entry_point = "no_such_function".into();
    let mut h = RuntimeHandle::new(config, PythonEmbedder::new()).unwrap();
    assert!(matches!(h.initialize(), Err(RuntimeError::Initialization(_))));
}
