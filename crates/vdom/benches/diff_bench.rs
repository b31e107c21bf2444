use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::rc::Rc;
use vdom::node::{VNode, keyed, node, text};
use vdom::{attr, diff};

const SMALL_ROWS: usize = 64;
const LARGE_ROWS: usize = 4_096;

fn row(i: usize, label: &str) -> Rc<VNode> {
    node(
        "li",
        vec![attr("data-row", i.to_string())],
        vec![text(format!("{label} {i}"))],
    )
}

fn list(rows: usize, label: &str) -> Rc<VNode> {
    node(
        "ul",
        vec![],
        (0..rows).map(|i| row(i, label)).collect(),
    )
}

fn keyed_list(order: &[usize]) -> Rc<VNode> {
    keyed(
        "ul",
        vec![],
        order
            .iter()
            .map(|i| (format!("k{i}").into(), row(*i, "row")))
            .collect(),
    )
}

fn bench_diff_equal_small(c: &mut Criterion) {
    let a = list(SMALL_ROWS, "row");
    let b = list(SMALL_ROWS, "row");
    c.bench_function("bench_diff_equal_small", |bench| {
        bench.iter(|| {
            let patches = diff(black_box(&a), black_box(&b));
            black_box(patches.len());
        });
    });
}

fn bench_diff_text_churn_large(c: &mut Criterion) {
    let a = list(LARGE_ROWS, "row");
    let b = list(LARGE_ROWS, "ROW");
    c.bench_function("bench_diff_text_churn_large", |bench| {
        bench.iter(|| {
            let patches = diff(black_box(&a), black_box(&b));
            black_box(patches.len());
        });
    });
}

fn bench_diff_keyed_rotate(c: &mut Criterion) {
    let before: Vec<usize> = (0..LARGE_ROWS).collect();
    let mut after = before.clone();
    after.rotate_left(1);
    let a = keyed_list(&before);
    let b = keyed_list(&after);
    c.bench_function("bench_diff_keyed_rotate", |bench| {
        bench.iter(|| {
            let patches = diff(black_box(&a), black_box(&b));
            black_box(patches.len());
        });
    });
}

criterion_group!(
    benches,
    bench_diff_equal_small,
    bench_diff_text_churn_large,
    bench_diff_keyed_rotate
);
criterion_main!(benches);
