//! Benchmark: keyed list reconciliation

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use lumen_core::{element, Node, Runtime};
use serde_json::json;

fn list(ids: &[usize]) -> Node {
    element("ul")
        .children(
            ids.iter()
                .map(|id| element("li").key(*id).child(*id).build()),
        )
        .build()
}

fn benchmark_reverse_keyed_list(c: &mut Criterion) {
    let forward: Vec<usize> = (0..1000).collect();
    let backward: Vec<usize> = forward.iter().rev().copied().collect();

    c.bench_function("reverse_1000_keyed", |b| {
        let rt = Runtime::new();
        let container = rt.document().create_element("div");
        let mut flip = false;
        b.iter(|| {
            let ids = if flip { &forward } else { &backward };
            flip = !flip;
            rt.render(list(ids), container).unwrap();
            black_box(rt.document().stats());
        });
    });
}

fn benchmark_append_keyed_list(c: &mut Criterion) {
    c.bench_function("append_to_1000_keyed", |b| {
        let rt = Runtime::new();
        let container = rt.document().create_element("div");
        let mut ids: Vec<usize> = (0..1000).collect();
        rt.render(list(&ids), container).unwrap();
        b.iter(|| {
            ids.push(ids.len());
            rt.render(list(&ids), container).unwrap();
        });
    });
}

fn benchmark_state_flush(c: &mut Criterion) {
    c.bench_function("flush_100_writes", |b| {
        let rt = Runtime::new();
        let state = rt.create_state(json!({ "n": 0 }));
        let s = state.clone();
        let _effect = rt.use_effect(move || {
            black_box(s.get("n"));
            None
        });
        let mut n = 0.0;
        b.iter(|| {
            for _ in 0..100 {
                n += 1.0;
                state.set("n", n);
            }
            rt.run_microtasks().unwrap();
        });
    });
}

criterion_group!(
    benches,
    benchmark_reverse_keyed_list,
    benchmark_append_keyed_list,
    benchmark_state_flush
);
criterion_main!(benches);
