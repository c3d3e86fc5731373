use criterion::{criterion_group, criterion_main, Criterion};
use jsonc_syntax::Writer;

fn bench_writer(c: &mut Criterion) {
    c.bench_function("write_flat_array", |b| {
        b.iter(|| {
            let mut w = Writer::default();
            w.array_begin(None);
            for i in 0..20 {
                w.int(i, None);
            }
            w.array_end();
            w.get().unwrap().len()
        });
    });

    c.bench_function("write_nested_object", |b| {
        b.iter(|| {
            let mut w = Writer::default();
            w.object_begin(None);
            w.object_begin(Some(b"a"));
            w.string(b"another branch", Some(b"d"));
            w.int(12345, Some(b"e"));
            w.object_end();
            w.object_end();
            w.get().unwrap().len()
        });
    });
}

criterion_group!(benches, bench_writer);
criterion_main!(benches);
