// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Binds a 3x2 input, runs a module that copies it to the output and
//! prints both through the module's inspect callable.
//!
//! ```text
//! RUST_LOG=debug cargo run -p embed-runtime --example copy_roundtrip
//! ```

use embed_runtime::{NativeEmbedder, NativeModule, RuntimeConfig, RuntimeError, RuntimeHandle};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), RuntimeError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let module = NativeModule::standard("model", |inputs, outputs| {
        let view = inputs.view("input_a")?;
        let values = view.to_vec::<f32>().map_err(|e| e.to_string())?;
        outputs.set_output("output_a", view.shape().clone(), &values)
    });
    let mut handle = RuntimeHandle::new(RuntimeConfig::default(), NativeEmbedder::new().with_module(module))?;
    handle.initialize()?;

    let input = handle.bind_input_typed::<f32>("input_a", [3, 2])?;
    for (i, v) in input.iter_mut().enumerate() {
        *v = i as f32;
    }
    handle.inspect("input_a")?;

    handle.invoke()?;
    handle.inspect("output_a")?;

    let out = handle.read_output("output_a")?;
    println!("shape {} strides {:?}", out.shape(), out.strides());
    if let Some(metrics) = handle.metrics() {
        println!("{}", metrics.summary());
    }
    Ok(())
}
