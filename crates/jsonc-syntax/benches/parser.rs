use criterion::{criterion_group, criterion_main, Criterion};
use jsonc_syntax::Parser;

const FLAT_ARRAY: &[u8] = b"[1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17,18,19,20]";
const NESTED_OBJECT: &[u8] =
    br#"{"a":{"b":{"c":[1,2,3,"leaf"]}},"d":"another branch","e":12345}"#;

fn bench_parser(c: &mut Criterion) {
    let mut p = Parser::default();
    c.bench_function("parse_flat_array", |b| {
        b.iter(|| p.parse(FLAT_ARRAY).unwrap());
    });

    let mut p = Parser::default();
    c.bench_function("parse_nested_object", |b| {
        b.iter(|| p.parse(NESTED_OBJECT).unwrap());
    });
}

criterion_group!(benches, bench_parser);
criterion_main!(benches);
