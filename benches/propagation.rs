use std::collections::BTreeSet;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plugin_status::store::RunPlan;
use plugin_status::{CoreStatus, DependencyGraph, ServiceStatus, StatusStore};

/// `layers` layers of `width` plugins; each plugin depends on every plugin
/// of the layer above.
fn layered_graph(layers: usize, width: usize) -> DependencyGraph {
    let name = |layer: usize, i: usize| format!("p{}_{}", layer, i);
    let mut edges = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        for i in 0..width {
            let deps: Vec<String> = if layer == 0 {
                Vec::new()
            } else {
                (0..width).map(|j| name(layer - 1, j)).collect()
            };
            edges.push((name(layer, i), deps));
        }
    }
    DependencyGraph::build(edges).unwrap()
}

fn bench_core_change(c: &mut Criterion) {
    let mut group = c.benchmark_group("core_change");
    for &(layers, width) in &[(4, 4), (8, 8), (16, 16)] {
        let graph = Arc::new(layered_graph(layers, width));
        let plan = RunPlan {
            core_changed: true,
            ..RunPlan::default()
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", layers, width)),
            &plan,
            |b, plan| {
                let mut store = StatusStore::new(Arc::clone(&graph), "ok");
                let mut flip = false;
                b.iter(|| {
                    flip = !flip;
                    let status = if flip {
                        ServiceStatus::degraded("slow")
                    } else {
                        ServiceStatus::available("ok")
                    };
                    store.set_core(CoreStatus::uniform(status));
                    black_box(store.propagate(plan))
                });
            },
        );
    }
    group.finish();
}

fn bench_single_reporter(c: &mut Criterion) {
    let graph = Arc::new(layered_graph(8, 8));
    let mut store = StatusStore::new(Arc::clone(&graph), "ok");
    store.set_core(CoreStatus::uniform(ServiceStatus::available("ok")));
    store.propagate(&RunPlan {
        core_changed: true,
        ..RunPlan::default()
    });

    let plan = RunPlan {
        reporters: BTreeSet::from(["p0_0".to_string()]),
        ..RunPlan::default()
    };
    let mut flip = false;
    c.bench_function("single_reporter_8x8", |b| {
        b.iter(|| {
            flip = !flip;
            let status = if flip {
                ServiceStatus::critical("down")
            } else {
                ServiceStatus::available("up")
            };
            let _ = store.record_report("p0_0", status);
            black_box(store.propagate(&plan))
        });
    });
}

criterion_group!(benches, bench_core_change, bench_single_reporter);
criterion_main!(benches);
