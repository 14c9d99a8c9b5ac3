// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for stride computation and view access.

use array_core::{ElementType, Epoch, Shape, TypeDispatchTable};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::ptr::NonNull;

fn bench_byte_strides(c: &mut Criterion) {
    let shape = Shape::new(vec![8, 16, 32, 64]);
    c.bench_function("byte_strides_rank4", |b| {
        b.iter(|| black_box(&shape).byte_strides(4))
    });
}

fn bench_resolve(c: &mut Criterion) {
    let table = TypeDispatchTable::with_builtins();
    c.bench_function("dispatch_resolve", |b| {
        b.iter(|| table.resolve(black_box("float_")))
    });
}

fn bench_view_roundtrip(c: &mut Criterion) {
    let mut words = vec![0u64; 512];
    let epoch = Epoch::new();
    let ptr = NonNull::new(words.as_mut_ptr().cast::<u8>()).expect("vec pointer is non-null");
    // SAFETY: `words` outlives every view built in this benchmark.
    let view = unsafe { ElementType::of::<f32>().make_view(ptr, Shape::matrix(32, 32), &epoch) };
    let values: Vec<f32> = (0..1024).map(|i| i as f32).collect();

    c.bench_function("view_write_1k_f32", |b| {
        // SAFETY: nothing else borrows `words` while the benchmark runs.
        b.iter(|| unsafe { view.write(black_box(&values)) })
    });
    c.bench_function("view_to_vec_1k_f32", |b| b.iter(|| view.to_vec::<f32>()));
    epoch.retire();
}

criterion_group!(benches, bench_byte_strides, bench_resolve, bench_view_roundtrip);
criterion_main!(benches);
