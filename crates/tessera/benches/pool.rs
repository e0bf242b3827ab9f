// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pool and frame encode benchmarks.
//!
//! - rent/return of pooled serializers against fresh allocation
//! - encoding a request frame into a pooled serializer
//! - decoding a frame header and payload from a pooled deserializer

#![allow(clippy::uninlined_format_args)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tessera::{
    Deserializer, FrameHeader, FrameKind, Message, Pools, SerResult, Serializer,
};

struct Position {
    entity: u32,
    x: f32,
    y: f32,
    label: String,
}

impl Message for Position {
    const TYPE_NAME: &'static str = "bench::Position";
    fn encode(&self, w: &mut Serializer) -> SerResult<()> {
        w.put_u32(self.entity)?;
        w.put_f32(self.x)?;
        w.put_f32(self.y)?;
        w.put_str(&self.label)
    }
    fn decode(r: &mut Deserializer) -> SerResult<Self> {
        Ok(Position {
            entity: r.read_u32()?,
            x: r.read_f32()?,
            y: r.read_f32()?,
            label: r.read_str()?,
        })
    }
}

fn bench_rent_return(c: &mut Criterion) {
    let pools = Pools::new(64, 256, 1 << 20);
    let mut group = c.benchmark_group("pool_rent_return");

    group.bench_function("pooled_writer", |b| {
        b.iter(|| {
            let mut w = pools.writer();
            let _ = w.put_u64(black_box(7));
            black_box(w.len());
        });
    });

    group.bench_function("fresh_writer", |b| {
        b.iter(|| {
            let mut w = Serializer::with_capacity(256);
            let _ = w.put_u64(black_box(7));
            black_box(w.len());
        });
    });

    group.finish();
}

fn bench_frame_encode(c: &mut Criterion) {
    let pools = Pools::new(64, 256, 1 << 20);
    let mut group = c.benchmark_group("frame_encode");

    for label_len in [8usize, 256, 4096] {
        let message = Position {
            entity: 42,
            x: 1.5,
            y: -3.25,
            label: "x".repeat(label_len),
        };
        group.throughput(Throughput::Bytes((label_len + 16) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label_len), &message, |b, m| {
            b.iter(|| {
                let mut w = pools.writer();
                FrameHeader::new(FrameKind::Request, 5)
                    .write(&mut w)
                    .expect("header");
                w.put_u8(black_box(17)).expect("correlation id");
                w.put_message(m).expect("payload");
                black_box(w.as_bytes().len());
            });
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let pools = Pools::new(64, 256, 1 << 20);
    let mut w = Serializer::with_capacity(256);
    FrameHeader::new(FrameKind::Message, 5)
        .write(&mut w)
        .expect("header");
    w.put_message(&Position {
        entity: 1,
        x: 0.0,
        y: 0.0,
        label: "bench".into(),
    })
    .expect("payload");
    let frame = w.as_bytes().to_vec();

    c.bench_function("frame_decode", |b| {
        b.iter(|| {
            let mut r = pools.reader(black_box(&frame)).expect("reader");
            let header = FrameHeader::read(&mut r).expect("header");
            let position: Position = r.read_message().expect("payload");
            black_box((header.type_id, position.entity));
        });
    });
}

criterion_group!(benches, bench_rent_return, bench_frame_encode, bench_frame_decode);
criterion_main!(benches);
