use criterion::{criterion_group, criterion_main, Criterion};
use flint::{lexer, token::TokenKind};
use std::hint::black_box;

static INPUT: &str = include_str!("../data/big.fl");

fn lex(input: &str) {
    let tokens = lexer::lex(input).unwrap();
    let identifiers = tokens
        .iter()
        .filter(|token| token.kind == TokenKind::Identifier)
        .count();
    black_box(identifiers);
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lexer", |b| {
        b.iter(|| {
            black_box(lex(black_box(INPUT)));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
