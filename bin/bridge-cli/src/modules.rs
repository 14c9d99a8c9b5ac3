// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Modules built into the binary for the native embedder.

use embed_runtime::{NativeEmbedder, NativeModule};

/// `model`: `output_a = input_a + input_b`, shaped like `input_a`.
pub fn sum_module() -> NativeModule {
    NativeModule::standard("model", |inputs, outputs| {
        let a = inputs.to_vec::<f32>("input_a")?;
        let b = inputs.to_vec::<f32>("input_b")?;
        if a.len() != b.len() {
            return Err(format!(
                "operands could not be broadcast together: {} and {} elements",
                a.len(),
                b.len()
            ));
        }
        let shape = inputs.view("input_a")?.shape().clone();
        let sum: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        outputs.set_output("output_a", shape, &sum)
    })
}

/// Native embedder with every built-in module registered.
pub fn native_embedder() -> NativeEmbedder {
    NativeEmbedder::new().with_module(sum_module())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_runtime::{RuntimeConfig, RuntimeError, RuntimeHandle};

    #[test]
    fn test_sum_module() {
        let embedder = NativeEmbedder::with_resource_key("cli-sum").with_module(sum_module());
        let mut h = RuntimeHandle::new(RuntimeConfig::default(), embedder).unwrap();
        h.initialize().unwrap();
        h.bind_input_typed::<f32>("input_a", [2]).unwrap().copy_from_slice(&[1.0, 2.0]);
        h.bind_input_typed::<f32>("input_b", [2]).unwrap().copy_from_slice(&[3.0, 4.0]);
        h.invoke().unwrap();
        assert_eq!(
            h.read_output("output_a").unwrap().to_vec::<f32>().unwrap(),
            vec![4.0, 6.0]
        );
    }

    #[test]
    fn test_sum_module_length_mismatch() {
        let embedder = NativeEmbedder::with_resource_key("cli-sum-mismatch").with_module(sum_module());
        let mut h = RuntimeHandle::new(RuntimeConfig::default(), embedder).unwrap();
        h.initialize().unwrap();
        h.bind_input("input_a", [2]).unwrap();
        h.bind_input("input_b", [3]).unwrap();
        assert!(matches!(h.invoke(), Err(RuntimeError::Computation { .. })));
    }
}
