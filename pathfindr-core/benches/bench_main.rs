use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use geo::Point;
use pathfindr_core::prelude::*;
use pathfindr_core::routing::run_to_completion;

fn grid(size: i32) -> RoadGraph {
    let mut graph = RoadGraph::new();
    let mut nodes = Vec::new();
    for row in 0..size {
        for col in 0..size {
            let point = Point::new(
                -0.127_758 + f64::from(col) * 0.001_43,
                51.507_351 + f64::from(row) * 0.000_91,
            );
            nodes.push(graph.add_node(i64::from(row * size + col), point));
        }
    }
    for row in 0..size {
        for col in 0..size {
            let here = nodes[(row * size + col) as usize];
            if col + 1 < size {
                graph.add_edge(here, nodes[(row * size + col + 1) as usize], RoadType::Residential, true);
            }
            if row + 1 < size {
                graph.add_edge(here, nodes[((row + 1) * size + col) as usize], RoadType::Residential, true);
            }
        }
    }
    graph
}

fn bench_algorithms(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    for size in [20, 50] {
        let mut graph = grid(size);
        let start = graph.index_of(0).unwrap();
        let end = graph.index_of(i64::from(size * size - 1)).unwrap();
        for kind in AlgorithmKind::ALL {
            group.bench_with_input(BenchmarkId::new(kind.as_str(), size), &size, |b, _| {
                b.iter(|| {
                    let mut algorithm = create_algorithm(kind);
                    run_to_completion(
                        algorithm.as_mut(),
                        &mut graph,
                        black_box(start),
                        black_box(end),
                        usize::MAX,
                        None,
                    )
                });
            });
        }
    }
    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut graph = grid(30);
    let start = graph.index_of(0).unwrap();
    let end = graph.index_of(899).unwrap();
    c.bench_function("record_astar_replay", |b| {
        b.iter(|| {
            let mut executor = StepExecutor::new(ExecutorConfig {
                max_steps: usize::MAX,
                ..ExecutorConfig::default()
            });
            executor
                .start(create_algorithm(AlgorithmKind::AStar), &mut graph, start, end)
                .unwrap();
            executor.run_to_end(&mut graph);
            black_box(executor.timeline().total_duration())
        });
    });
}

criterion_group!(benches, bench_algorithms, bench_replay);
criterion_main!(benches);
