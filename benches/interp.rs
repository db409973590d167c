use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use spackel::codegen;
use spackel::program::Program;
use spackel::vm;

/// A program that pushes 0, adds 1 to it `n` times, then drops it.
fn counting_source(n: usize) -> String {
    let mut source = String::from("0");
    for _ in 0..n {
        source.push_str(" 1 +");
    }
    source.push_str(" drop");
    source
}

/// A program that doubles 1 through a macro `n` times, then drops it.
fn doubling_source(n: usize) -> String {
    format!("macro double dup + end 1{} drop", " double".repeat(n))
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut parse_group = c.benchmark_group("parse");
    for n in [1_000, 100_000] {
        let source = counting_source(n);
        parse_group.bench_function(BenchmarkId::from_parameter(n), |bencher: &mut criterion::Bencher<'_>| {
            bencher.iter(|| Program::parse(black_box(source.as_bytes())).unwrap());
        });
    }
    {
        let source = doubling_source(10_000);
        parse_group.bench_function(BenchmarkId::from_parameter("macros-10000"), |bencher: &mut criterion::Bencher<'_>| {
            bencher.iter(|| Program::parse(black_box(source.as_bytes())).unwrap());
        });
    }
    parse_group.finish();

    let mut run_group = c.benchmark_group("interpret");
    for n in [1_000, 100_000] {
        let program = Program::parse(counting_source(n).as_bytes()).unwrap();
        run_group.bench_function(BenchmarkId::from_parameter(n), |bencher: &mut criterion::Bencher<'_>| {
            bencher.iter(|| vm::run(black_box(&program), std::io::sink()).unwrap());
        });
    }
    run_group.finish();

    let mut compile_group = c.benchmark_group("compile");
    compile_group.sample_size(20);
    let program = Program::parse(counting_source(1_000).as_bytes()).unwrap();
    compile_group.bench_function(BenchmarkId::from_parameter(1_000), |bencher: &mut criterion::Bencher<'_>| {
        bencher.iter(|| codegen::compile_to_bytes(black_box(&program), None).unwrap());
    });
    compile_group.finish();
}

criterion_group!(name = benches; config = Criterion::default(); targets = criterion_benchmark);
criterion_main!(benches);
