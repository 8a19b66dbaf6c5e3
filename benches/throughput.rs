//! Throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serdebug_core::core::codec::{convert_pending, decode_received, parse_hex, render_hex};
use serdebug_core::{ChannelSink, Encoding, FramingEngine, LineConfig, LoopbackTransport, Poll};

fn codec_benchmark(c: &mut Criterion) {
    let data: Vec<u8> = (0..1024).map(|i| (i % 256) as u8).collect();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("render_hex", |b| {
        b.iter(|| black_box(render_hex(black_box(&data))))
    });

    group.bench_function("parse_hex", |b| {
        let hex_str = render_hex(&data);
        b.iter(|| black_box(parse_hex(black_box(&hex_str)).unwrap()))
    });

    group.bench_function("decode_ascii", |b| {
        let text: Vec<u8> = b"OK +CSQ: 21,99\r\n".repeat(64);
        b.iter(|| black_box(decode_received(black_box(&text), Encoding::Ascii)))
    });

    group.bench_function("convert_pending", |b| {
        let text = "The quick brown fox jumps over the lazy dog".repeat(16);
        b.iter(|| black_box(convert_pending(black_box(&text), Encoding::Ascii, Encoding::Hex)))
    });

    group.finish();
}

fn framing_benchmark(c: &mut Criterion) {
    let burst = vec![b'A'; 4096];

    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(burst.len() as u64));

    group.bench_function("burst_to_chunk", |b| {
        let (transport, handle) = LoopbackTransport::pair();
        let (sink, events) = ChannelSink::new();
        let mut engine = FramingEngine::new(Box::new(transport), Box::new(sink));
        engine.open(LineConfig::new("bench", 115_200)).unwrap();

        b.iter(|| {
            handle.push_rx(&burst);
            while !matches!(engine.poll(), Poll::Flushed { .. }) {}
            black_box(events.try_recv().unwrap())
        })
    });

    group.bench_function("idle_poll", |b| {
        let (transport, _handle) = LoopbackTransport::pair();
        let (sink, _events) = ChannelSink::new();
        let mut engine = FramingEngine::new(Box::new(transport), Box::new(sink));
        engine.open(LineConfig::new("bench", 115_200)).unwrap();

        b.iter(|| black_box(engine.poll()))
    });

    group.finish();
}

criterion_group!(benches, codec_benchmark, framing_benchmark);
criterion_main!(benches);
