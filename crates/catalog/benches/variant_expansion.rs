use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use storefront_catalog::{AttributeDomains, expand};

/// `attributes` attributes with `values` values each.
fn domains(attributes: usize, values: usize) -> AttributeDomains {
    let rows = (0..attributes).flat_map(|a| {
        (0..values).map(move |v| (format!("attr-{a}"), format!("value-{a}-{v}")))
    });
    AttributeDomains::from_rows(rows)
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("variant_expansion");

    for (attributes, values) in [(2, 4), (3, 5), (4, 6)] {
        let d = domains(attributes, values);
        let combinations = (values as u64).pow(attributes as u32);
        group.throughput(Throughput::Elements(combinations));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{attributes}x{values}")),
            &d,
            |b, d| b.iter(|| expand(black_box(d))),
        );
    }

    group.finish();
}

fn bench_group_rows(c: &mut Criterion) {
    let rows: Vec<(String, String)> = (0..200)
        .map(|i| (format!("attr-{}", i % 4), format!("value-{i}")))
        .collect();

    c.bench_function("group_rows_200", |b| {
        b.iter(|| AttributeDomains::from_rows(black_box(rows.clone())))
    });
}

criterion_group!(benches, bench_expand, bench_group_rows);
criterion_main!(benches);
