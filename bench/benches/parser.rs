use criterion::{criterion_group, criterion_main, Criterion};
use flint::{codegen::interface::CompileOptions, compile_to_ir, parser::parse_program};
use std::hint::black_box;

static INPUT: &str = include_str!("../data/big.fl");

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("parser", |b| {
        b.iter(|| {
            let program = parse_program(black_box(INPUT)).unwrap();
            _ = black_box(program);
        })
    });

    let options = CompileOptions::default();
    c.bench_function("codegen", |b| {
        b.iter(|| {
            let ir = compile_to_ir(black_box(INPUT), &options).unwrap();
            _ = black_box(ir);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
