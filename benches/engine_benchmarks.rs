//! Benchmarks for the per-line protocol work done on the controller task.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use uci_session::uci::{EngineMessage, UciCommand};
use uci_session::{BestMove, SearchLimit};

const INFO_LINE: &str =
    "info depth 22 seldepth 31 multipv 1 score cp 34 nodes 4812399 nps 1603466 hashfull 412 tbhits 0 time 3001 pv e2e4 e7e5 g1f3 b8c6 f1b5";

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    group.bench_function("info", |b| {
        b.iter(|| EngineMessage::parse(black_box(INFO_LINE)))
    });
    group.bench_function("bestmove", |b| {
        b.iter(|| EngineMessage::parse(black_box("bestmove e2e4 ponder e7e5")))
    });
    group.bench_function("readyok", |b| {
        b.iter(|| EngineMessage::parse(black_box("readyok")))
    });

    group.finish();
}

fn bench_best_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_move");

    group.bench_function("with_ponder", |b| {
        b.iter(|| BestMove::parse(black_box("bestmove e2e4 ponder e7e5")))
    });
    group.bench_function("promotion", |b| {
        b.iter(|| BestMove::parse(black_box("bestmove e7e8q")))
    });

    group.finish();
}

fn bench_format(c: &mut Criterion) {
    let position = UciCommand::position("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
    let go = UciCommand::Go(SearchLimit::MoveTime(500));

    c.bench_function("format_position", |b| b.iter(|| black_box(&position).to_string()));
    c.bench_function("format_go", |b| b.iter(|| black_box(&go).to_string()));
}

criterion_group!(benches, bench_classify, bench_best_move, bench_format);
criterion_main!(benches);
