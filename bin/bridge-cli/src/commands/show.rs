// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `embed-bridge show`: fill a buffer and print it through the module's
//! inspect callable, several rounds on one handle.

use crate::EmbedderKind;
use embed_runtime::RuntimeConfig;

pub fn execute(
    config: RuntimeConfig,
    embedder: EmbedderKind,
    buffer: &str,
    shape: &str,
    loops: usize,
) -> anyhow::Result<()> {
    let shape = super::parse_shape(shape)?;
    let mut handle = super::open_handle(config, embedder)?;

    for remaining in (0..loops).rev() {
        println!("looping {remaining}");
        super::bind_filled(&mut handle, buffer, &shape, |i| i as f64)?;
        handle.inspect(buffer)?;
    }
    Ok(())
}
