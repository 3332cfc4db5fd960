//! Benchmark inputs: wire-format fixtures built in memory.

use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    input: Vec<u8>,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, input: Vec<u8>) -> Self {
        Self { name, group, input }
    }

    pub fn small(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Small, input)
    }

    pub fn normal(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Normal, input)
    }

    pub fn large(name: &'static str, input: Vec<u8>) -> Self {
        Self::new(name, TestGroup::Large, input)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

/// A `GET` request head carrying `headers` extra fields.
pub fn request_head(headers: usize) -> Vec<u8> {
    let mut head = String::from("GET /index.html?lang=en&page=2 HTTP/1.1\r\nHost: localhost:8080\r\n");
    for i in 0..headers {
        let _ = write!(head, "X-Custom-Header-{i}: value-{i}-{}\r\n", "v".repeat(24));
    }
    head.push_str("\r\n");
    head.into_bytes()
}

/// `total` payload bytes in chunks of `chunk` bytes, terminated by the zero chunk.
pub fn chunked_body(total: usize, chunk: usize) -> Vec<u8> {
    let mut body = Vec::with_capacity(total + total / chunk.max(1) * 8 + 5);
    let mut left = total;
    while left > 0 {
        let n = left.min(chunk);
        body.extend_from_slice(format!("{n:x}\r\n").as_bytes());
        body.extend(std::iter::repeat_n(b'x', n));
        body.extend_from_slice(b"\r\n");
        left -= n;
    }
    body.extend_from_slice(b"0\r\n\r\n");
    body
}

