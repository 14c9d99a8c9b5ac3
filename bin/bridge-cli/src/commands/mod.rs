// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and the helpers they share.

pub mod check;
pub mod run;
pub mod show;

use crate::{modules, EmbedderKind};
use anyhow::Context;
use array_core::{PlainElement, Shape};
use embed_runtime::{RuntimeConfig, RuntimeHandle};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` raises the level from `warn`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reads the configuration file, or returns the built-in layout.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading configuration from '{}'", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Parses `"3,2"` into a shape. An empty string is a scalar.
pub fn parse_shape(text: &str) -> anyhow::Result<Shape> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Shape::scalar());
    }
    let dims = text
        .split(',')
        .map(|d| {
            d.trim()
                .parse::<usize>()
                .with_context(|| format!("invalid dimension '{}' in shape '{text}'", d.trim()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Shape::new(dims))
}

/// Creates and initializes a handle on the requested embedder.
pub fn open_handle(config: RuntimeConfig, kind: EmbedderKind) -> anyhow::Result<RuntimeHandle> {
    let mut handle = match kind {
        EmbedderKind::Native => RuntimeHandle::new(config, modules::native_embedder())?,
        EmbedderKind::Python => python_handle(config)?,
    };
    handle.initialize().context("initializing embedded runtime")?;
    Ok(handle)
}

#[cfg(feature = "python")]
fn python_handle(config: RuntimeConfig) -> anyhow::Result<RuntimeHandle> {
    Ok(RuntimeHandle::new(config, embed_runtime::PythonEmbedder::new())?)
}

#[cfg(not(feature = "python"))]
fn python_handle(_config: RuntimeConfig) -> anyhow::Result<RuntimeHandle> {
    anyhow::bail!("embed-bridge was built without the `python` feature")
}

/// Binds `name` with `shape` and fills element `i` with `value(i)`,
/// converted to the buffer's element type.
pub fn bind_filled(
    handle: &mut RuntimeHandle,
    name: &str,
    shape: &Shape,
    value: impl Fn(usize) -> f64,
) -> anyhow::Result<()> {
    let kind = handle
        .registry()
        .context("handle has been moved from")?
        .get(name)?
        .element()
        .name()
        .to_string();

    match kind.as_str() {
        "float32" => fill::<f32>(handle, name, shape, |i| value(i) as f32),
        "float64" => fill::<f64>(handle, name, shape, value),
        "int32" => fill::<i32>(handle, name, shape, |i| value(i) as i32),
        "int64" => fill::<i64>(handle, name, shape, |i| value(i) as i64),
        "uint8" => fill::<u8>(handle, name, shape, |i| value(i) as u8),
        other => anyhow::bail!("buffer '{name}': cannot fill elements of type {other}"),
    }
}

fn fill<T: PlainElement>(
    handle: &mut RuntimeHandle,
    name: &str,
    shape: &Shape,
    value: impl Fn(usize) -> T,
) -> anyhow::Result<()> {
    let region = handle.bind_input_typed::<T>(name, shape)?;
    for (i, slot) in region.iter_mut().enumerate() {
        *slot = value(i);
    }
    Ok(())
}
