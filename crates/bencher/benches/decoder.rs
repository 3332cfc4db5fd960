use bencher::{TestCase, chunked_body, request_head};
use bytes::BytesMut;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_wire::buffer::{InputBuffer, drain};
use micro_wire::codec::line::LineScanner;
use micro_wire::codec::websocket::{Frame, FrameDecoder, FrameEncoder};
use micro_wire::protocol::body::RequestBody;
use micro_wire::protocol::{PayloadSize, RequestHead};
use std::hint::black_box;
use std::io::Cursor;
use tokio::runtime::Runtime;
use tokio_util::codec::Encoder;

fn frames(count: usize, size: usize) -> Vec<u8> {
    let mut encoder = FrameEncoder::masked([0x37, 0xfa, 0x21, 0x3d]);
    let mut buf = BytesMut::new();
    for _ in 0..count {
        encoder.encode(Frame::binary(vec![0x5a; size]), &mut buf).expect("frame should encode");
    }
    buf.to_vec()
}

fn benchmark_line_scanner(criterion: &mut Criterion) {
    let rt = Runtime::new().expect("runtime should start");
    let test_cases = vec![TestCase::small("small_header", request_head(2)), TestCase::large("large_header", request_head(60))];
    let mut group = criterion.benchmark_group("request_head");

    for case in test_cases {
        group.throughput(Throughput::Bytes(case.input().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.to_async(&rt).iter(|| async {
                let mut input = InputBuffer::with_capacity(16 * 1024, case.input());
                let head = RequestHead::read(&mut input, &mut LineScanner::new()).await;
                black_box(head.expect("input should be a valid request head"));
            });
        });
    }
    group.finish();
}

fn benchmark_chunked_reader(criterion: &mut Criterion) {
    let rt = Runtime::new().expect("runtime should start");
    let test_cases =
        vec![TestCase::small("small_chunks", chunked_body(64 * 1024, 256)), TestCase::normal("large_chunks", chunked_body(64 * 1024, 8192))];
    let mut group = criterion.benchmark_group("chunked_reader");

    for case in test_cases {
        group.throughput(Throughput::Bytes(case.input().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.to_async(&rt).iter(|| async {
                let mut input = InputBuffer::new(Cursor::new(case.input().to_vec()));
                let mut body = RequestBody::new(&mut input, PayloadSize::Chunked);
                black_box(drain(&mut body).await.expect("input should be a valid chunked body"));
            });
        });
    }
    group.finish();
}

fn benchmark_frame_decoder(criterion: &mut Criterion) {
    let test_cases = vec![TestCase::small("small_frames", frames(256, 16)), TestCase::large("large_frames", frames(4, 70_000))];
    let mut group = criterion.benchmark_group("frame_decoder");

    for case in test_cases {
        group.throughput(Throughput::Bytes(case.input().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched_ref(
                FrameDecoder::new,
                |decoder| {
                    let mut data = case.input();
                    while !data.is_empty() {
                        let (used, frame) = decoder.decode_slice(data).expect("input should be valid frames");
                        black_box(frame);
                        data = &data[used..];
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(decoder, benchmark_line_scanner, benchmark_chunked_reader, benchmark_frame_decoder);
criterion_main!(decoder);
