// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `embed-bridge check`: resolve every buffer declaration and print the
//! resulting registry without starting a runtime.

use array_core::TypeDispatchTable;
use buffer_store::{BufferRegistry, Capacity};
use embed_runtime::RuntimeConfig;

pub fn execute(config: &RuntimeConfig, dump: bool) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              embed-bridge · Config Check            ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let table = TypeDispatchTable::with_builtins();
    let decls = config.buffer_decls(&table)?;
    let registry = BufferRegistry::with_policy(&table, decls, config.registry_policy())?;

    println!(
        "  Module: {} (search path: {})",
        config.module.name,
        config
            .module
            .search_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    );
    println!(
        "  Symbols: {} / {} / {} / {}",
        config.module.input_type, config.module.output_type, config.module.entry_point, config.module.inspect,
    );
    println!();

    // ── Buffers ────────────────────────────────────────────────
    println!(
        "  {:<20} {:<10} {:<10} {:>10} {:>12} {:<6} {:<12}",
        "Name", "Tag", "Element", "Capacity", "Max elems", "Role", "Fixed axes",
    );
    println!("  {}", "-".repeat(87));
    for (name, buffer) in registry.iter() {
        let role = if config.outputs.iter().any(|o| o == name) {
            "output"
        } else {
            "input"
        };
        let fixed = buffer
            .template()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!(
            "  {:<20} {:<10} {:<10} {:>10} {:>12} {:<6} {:<12}",
            name,
            buffer.type_tag(),
            buffer.element().name(),
            capacity_label(buffer.capacity()),
            buffer.max_elements(),
            role,
            fixed,
        );
        if let Some(spec) = config.buffers.iter().find(|b| b.name == name && !b.doc.is_empty()) {
            println!("  {:<20} {}", "", spec.doc);
        }
    }
    println!();
    println!(
        "  Total: {} buffers, {} reserved",
        registry.len(),
        capacity_label(registry.total_capacity()),
    );
    if let Some(ft) = &config.first_touch {
        println!("  First-touch: undeclared inputs get {} of {}", ft.capacity, ft.dtype);
    }
    println!();

    if dump {
        println!("{}", config.to_toml()?);
    }
    Ok(())
}

fn capacity_label(bytes: usize) -> String {
    Capacity::from_bytes(bytes)
        .map(|c| c.to_string())
        .unwrap_or_else(|_| bytes.to_string())
}
