//! Criterion benchmarks for the newline line decoder.
//!
//! Run with:
//! ```bash
//! cargo bench --package chat-core --bench framing_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use chat_core::protocol::framing::{encode_frame, LineDecoder};

fn make_stream(lines: usize, line_len: usize) -> Vec<u8> {
    let line = "x".repeat(line_len);
    let mut buf = Vec::with_capacity(lines * (line_len + 1));
    for _ in 0..lines {
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }
    buf
}

fn bench_decode_whole_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_whole_buffer");
    for &line_len in &[16usize, 128, 1024] {
        let stream = make_stream(256, line_len);
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(line_len), &stream, |b, s| {
            b.iter(|| {
                let mut dec = LineDecoder::new();
                dec.push(black_box(s));
                let mut n = 0;
                while dec.next_line().is_some() {
                    n += 1;
                }
                black_box(n)
            })
        });
    }
    group.finish();
}

fn bench_decode_small_chunks(c: &mut Criterion) {
    // TCP often delivers a line in several pieces; feed 7-byte chunks.
    let stream = make_stream(256, 128);
    c.bench_function("decode_7_byte_chunks", |b| {
        b.iter(|| {
            let mut dec = LineDecoder::new();
            let mut n = 0;
            for chunk in stream.chunks(7) {
                dec.push(black_box(chunk));
                while dec.next_line().is_some() {
                    n += 1;
                }
            }
            black_box(n)
        })
    });
}

fn bench_encode_frame(c: &mut Criterion) {
    let text = "[1700000000000] 127.0.0.1:50000: [12:00:00] Anon: hello everyone";
    c.bench_function("encode_frame", |b| {
        b.iter(|| encode_frame(black_box(text)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_decode_whole_buffer,
    bench_decode_small_chunks,
    bench_encode_frame
);
criterion_main!(benches);
