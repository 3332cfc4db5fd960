use async_trait::async_trait;
use bytes::BytesMut;
use criterion::{Criterion, criterion_group, criterion_main};
use http::StatusCode;
use micro_wire::buffer::InputBuffer;
use micro_wire::codec::header::HeaderEncoder;
use micro_wire::codec::line::LineScanner;
use micro_wire::connection::{HttpConnection, HttpContext};
use micro_wire::content::BytesContent;
use micro_wire::handler::{Handler, HandlerError};
use micro_wire::protocol::{PayloadSize, RequestHead, status_response};
use micro_wire::server::{ServerConfig, ServerState};
use micro_wire::websocket::SessionStore;
use std::hint::black_box;
use std::sync::Arc;
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::runtime::Runtime;
use tokio_util::codec::Encoder;

// Mock IO for testing
#[derive(Clone)]
struct MockIO {
    read_data: Vec<u8>,
    read_pos: usize,
    written: usize,
}

impl MockIO {
    fn new(read_data: Vec<u8>) -> Self {
        Self { read_data, read_pos: 0, written: 0 }
    }
}

impl AsyncRead for MockIO {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let remaining = &self.read_data[self.read_pos..];
        let amt = std::cmp::min(remaining.len(), buf.remaining());
        buf.put_slice(&remaining[..amt]);
        self.read_pos += amt;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockIO {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        self.written += buf.len();
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }
}

struct HelloWorld;

#[async_trait]
impl Handler for HelloWorld {
    async fn handle(&self, ctx: &mut HttpContext<'_>) -> Result<(), HandlerError> {
        ctx.set_content(BytesContent::text("Hello World!"));
        Ok(())
    }
}

const SIMPLE_REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";

fn bench_request_head(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("read_simple_request_head", |b| {
        b.to_async(&rt).iter(|| async {
            let mut input = InputBuffer::new(SIMPLE_REQUEST);
            let mut scanner = LineScanner::new();
            black_box(RequestHead::read(&mut input, &mut scanner).await.unwrap());
        });
    });
}

fn bench_header_encoder(c: &mut Criterion) {
    c.bench_function("encode_simple_response_head", |b| {
        b.iter(|| {
            let mut bytes = BytesMut::new();
            let head = status_response(StatusCode::OK);
            HeaderEncoder.encode((head, PayloadSize::Length(12)), &mut bytes).unwrap();
            black_box(bytes);
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let state = rt.block_on(async {
        ServerState::new(Arc::new(ServerConfig::default()), Arc::new(HelloWorld), SessionStore::new())
    });

    let keep_alive = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n".repeat(16);

    c.bench_function("process_simple_request", |b| {
        b.to_async(&rt).iter(|| async {
            let mock_io = MockIO::new(SIMPLE_REQUEST.to_vec());
            let (reader, writer) = (mock_io.clone(), mock_io);
            let connection = HttpConnection::new(reader, writer, Arc::clone(&state));
            black_box(connection.process().await.unwrap());
        });
    });

    c.bench_function("process_keep_alive_requests", |b| {
        b.to_async(&rt).iter(|| async {
            let mock_io = MockIO::new(keep_alive.clone());
            let (reader, writer) = (mock_io.clone(), mock_io);
            let connection = HttpConnection::new(reader, writer, Arc::clone(&state));
            black_box(connection.process().await.unwrap());
        });
    });
}

criterion_group!(benches, bench_request_head, bench_header_encoder, bench_http_connection);
criterion_main!(benches);
