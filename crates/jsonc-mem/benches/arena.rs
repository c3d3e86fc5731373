use criterion::{Criterion, black_box, criterion_group, criterion_main};
use jsonc_mem::BoundedArena;

fn bump_alloc(c: &mut Criterion) {
    c.bench_function("arena_bump_alloc_32b", |b| {
        let arena = BoundedArena::default();
        b.iter(|| {
            black_box(arena.alloc(32).unwrap());
        });
    });
}

fn returnable_alloc_free(c: &mut Criterion) {
    c.bench_function("arena_returnable_alloc_free_32b", |b| {
        let arena = BoundedArena::default();
        b.iter(|| {
            let ptr = arena.alloc_rt(32).unwrap();
            arena.free_rt(black_box(ptr)).unwrap();
        });
    });
}

criterion_group!(benches, bump_alloc, returnable_alloc_free);
criterion_main!(benches);
