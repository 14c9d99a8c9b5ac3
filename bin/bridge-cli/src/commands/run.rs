// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `embed-bridge run`: bind inputs, invoke the module, print the outputs.
//!
//! ```text
//! RuntimeHandle::new → initialize → bind_input* → invoke → read_output*
//! ```

use crate::EmbedderKind;
use embed_runtime::RuntimeConfig;

pub fn execute(config: RuntimeConfig, embedder: EmbedderKind, shape: &str, repeat: usize) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              embed-bridge · Runner                  ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let shape = super::parse_shape(shape)?;
    let outputs = config.outputs.clone();
    let inputs: Vec<String> = config
        .buffers
        .iter()
        .map(|b| b.name.clone())
        .filter(|name| !outputs.contains(name))
        .collect();

    println!("  Config:");
    println!("   Embedder: {embedder:?}");
    println!("   Module:   {}.{}", config.module.name, config.module.entry_point);
    println!("   Inputs:   {}", inputs.join(", "));
    println!("   Outputs:  {}", outputs.join(", "));
    println!("   Shape:    {shape}");
    println!();

    let mut handle = super::open_handle(config, embedder)?;

    for round in 0..repeat.max(1) {
        // The first input counts up from the round number; the rest are ones.
        for (i, name) in inputs.iter().enumerate() {
            let offset = round as f64;
            if i == 0 {
                super::bind_filled(&mut handle, name, &shape, |j| offset + j as f64)?;
            } else {
                super::bind_filled(&mut handle, name, &shape, |_| 1.0)?;
            }
        }
        handle.invoke()?;
        tracing::info!(round, "invocation complete");
    }

    println!("  Results:");
    for name in &outputs {
        let out = handle.read_output(name)?;
        println!("   {name}: shape {} strides {:?}", out.shape(), out.strides());
        handle.inspect(name)?;
    }
    println!();

    if let Some(metrics) = handle.metrics() {
        println!("  Metrics:");
        println!("   {}", metrics.summary());
        println!();
    }
    handle.finalize();
    Ok(())
}
