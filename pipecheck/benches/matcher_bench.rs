//! Benchmarks for stage-tree matching.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pipecheck::expectation::{ExpectationTree, StageExpectation};
use pipecheck::matcher::compare;
use pipecheck::trace::{StageNode, StageStatus, StageTree};

fn wide_tree(stages: usize, children: usize) -> (StageTree, ExpectationTree) {
    let actual = (0..stages)
        .map(|i| {
            let mut node = StageNode::new(format!("stage-{i}"), StageStatus::Success);
            for j in 0..children {
                node = node.with_child(StageNode::new(
                    format!("step-{i}-{j}"),
                    StageStatus::Success,
                ));
            }
            node
        })
        .collect();
    let expected = (0..stages)
        .map(|i| {
            let mut node = StageExpectation::new(format!("stage-{i}"));
            for j in 0..children {
                node = node.with_child(StageExpectation::new(format!("step-{i}-{j}")));
            }
            node
        })
        .collect();
    (StageTree::new(actual), ExpectationTree::new(expected))
}

fn matcher_benchmark(c: &mut Criterion) {
    let (actual, expected) = wide_tree(50, 10);
    c.bench_function("compare_matching_550_stages", |b| {
        b.iter(|| compare(black_box(&actual), black_box(&expected)))
    });

    let (mut diverged, expected) = wide_tree(50, 10);
    diverged.stages[25].status = StageStatus::Failure;
    c.bench_function("compare_with_discrepancy", |b| {
        b.iter(|| compare(black_box(&diverged), black_box(&expected)))
    });
}

criterion_group!(benches, matcher_benchmark);
criterion_main!(benches);
