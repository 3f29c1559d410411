use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use devhost::domain::models::ServiceDescriptor;
use devhost::services::DependencyGraph;

/// Layered stack: every service depends on up to three services of the previous layer.
fn layered(size: usize) -> Vec<ServiceDescriptor> {
    (0..size)
        .map(|i| {
            let mut svc = ServiceDescriptor::image(format!("svc-{i}"), "img");
            if i >= 10 {
                for offset in 1..=3 {
                    svc.depends_on.insert(format!("svc-{}", (i / 10 - 1) * 10 + (i + offset) % 10));
                }
            }
            svc
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_graph_build");
    for size in [10usize, 100, 1_000] {
        let services = layered(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &services, |b, services| {
            b.iter(|| DependencyGraph::build(black_box(services.clone())).unwrap());
        });
    }
    group.finish();
}

fn bench_waves(c: &mut Criterion) {
    let graph = DependencyGraph::build(layered(1_000)).unwrap();
    c.bench_function("dependency_graph_waves_1000", |b| b.iter(|| black_box(&graph).waves()));
}

criterion_group!(benches, bench_build, bench_waves);
criterion_main!(benches);
