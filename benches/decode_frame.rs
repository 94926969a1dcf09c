/// Benchmarks for turning completed receives into observer messages.
///
/// Every inbound frame goes through `ReceivedFrame::decode` on the event loop, so its cost bounds
/// how fast a busy connection can be drained.
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use observed_ws::ws::{Opcode, OutboundFrame, ReceivedFrame, SocketMessage};

const SIZES: [usize; 3] = [64, 4 * 1024, 256 * 1024];

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");

    for size in SIZES {
        let text = "a".repeat(size);
        let binary = vec![0x5a_u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("text", size), &text, |b, text| {
            b.iter(|| {
                let frame = ReceivedFrame::with_opcode(Opcode::Text, text.as_str());
                std::hint::black_box(frame.decode())
            });
        });

        group.bench_with_input(BenchmarkId::new("binary", size), &binary, |b, binary| {
            b.iter(|| {
                let frame = ReceivedFrame::with_opcode(Opcode::Binary, binary.clone());
                std::hint::black_box(frame.decode())
            });
        });
    }

    // Invalid UTF-8 is scanned in full before being dropped
    let invalid = {
        let mut bytes = vec![b'a'; 4 * 1024];
        bytes.push(0xff);
        bytes
    };
    group.bench_function("text/invalid_utf8", |b| {
        b.iter(|| {
            let frame = ReceivedFrame::with_opcode(Opcode::Text, invalid.clone());
            std::hint::black_box(frame.decode())
        });
    });

    group.finish();
}

fn bench_outbound(c: &mut Criterion) {
    let mut group = c.benchmark_group("outbound_frame");

    let text = "a".repeat(4 * 1024);
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("from_text", |b| {
        b.iter(|| {
            let message = SocketMessage::text(std::hint::black_box(text.as_str()));
            std::hint::black_box(OutboundFrame::from(message))
        });
    });

    group.bench_function("ping", |b| b.iter(OutboundFrame::ping));

    group.finish();
}

criterion_group!(frame_benches, bench_decode, bench_outbound);
criterion_main!(frame_benches);
