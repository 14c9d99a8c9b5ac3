// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for buffer presentation.

use array_core::TypeDispatchTable;
use buffer_store::Buffer;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_set_same_shape(c: &mut Criterion) {
    let table = TypeDispatchTable::with_builtins();
    let mut buf = Buffer::allocate(1 << 20, "float_", &table).expect("allocation");
    c.bench_function("set_same_shape", |b| {
        b.iter(|| buf.set(black_box([256, 256])).map(|r| r.len()))
    });
}

fn bench_set_alternating(c: &mut Criterion) {
    let table = TypeDispatchTable::with_builtins();
    let mut buf = Buffer::allocate(1 << 20, "float_", &table).expect("allocation");
    let mut flip = false;
    c.bench_function("set_alternating_shape", |b| {
        b.iter(|| {
            flip = !flip;
            let shape = if flip { [256, 256] } else { [128, 512] };
            buf.set(black_box(shape)).map(|r| r.len())
        })
    });
}

fn bench_fill_typed(c: &mut Criterion) {
    let table = TypeDispatchTable::with_builtins();
    let mut buf = Buffer::allocate(4000, "float_", &table).expect("allocation");
    c.bench_function("set_typed_fill_1000", |b| {
        b.iter(|| {
            if let Ok(region) = buf.set_typed::<f32>([1000]) {
                for (i, v) in region.iter_mut().enumerate() {
                    *v = i as f32;
                }
            }
        })
    });
}

criterion_group!(benches, bench_set_same_shape, bench_set_alternating, bench_fill_typed);
criterion_main!(benches);
