// Benchmark for register frame building and command parsing
// Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};
use dds_host::dds::codec::{self, ModeLayout};
use dds_host::dispatch::parser::parse;
use dds_host::DeviceKey;
use std::hint::black_box;

fn bench_frequency_frames(c: &mut Criterion) {
    let layout = ModeLayout::default();
    let keys: Vec<DeviceKey> = DeviceKey::all().collect();
    c.bench_function("build 1k FTW frames", |b| {
        b.iter(|| {
            for i in 0..1000u32 {
                let key = keys[i as usize % keys.len()];
                let ftw = codec::frequency_to_tuning_word(10e6 + f64::from(i) * 1e5);
                let hex = codec::register_write_hex(codec::REG_FTW, codec::FTW_BYTES, ftw).unwrap();
                black_box(codec::serialize_payload(&hex, key, &layout).unwrap());
            }
        });
    });
}

fn bench_header(c: &mut Criterion) {
    c.bench_function("build header", |b| {
        b.iter(|| codec::build_header(black_box(0x01AB), black_box(6), codec::Direction::Write).unwrap());
    });
}

fn bench_parse(c: &mut Criterion) {
    let lines: Vec<String> = (0..1000)
        .map(|i| match i % 4 {
            0 => format!("FREQ {} 1 {} MHZ", i % 3 + 1, 10 + i % 300),
            1 => format!("AMPL {} 2 {}", i % 3 + 1, i % 1024),
            2 => format!("PHASE {} 1 {}.5", i % 3 + 1, i % 359),
            _ => "OUTPUT 1 1 ?".to_string(),
        })
        .collect();
    c.bench_function("parse 1k commands", |b| {
        b.iter(|| {
            let ok = lines.iter().filter(|line| parse(line).is_ok()).count();
            assert_eq!(ok, 1000);
        });
    });
}

fn bench_phase_code(c: &mut Criterion) {
    c.bench_function("phase to code", |b| {
        b.iter(|| codec::phase_to_code(black_box(123.456)));
    });
}

criterion_group!(benches, bench_frequency_frames, bench_header, bench_parse, bench_phase_code);
criterion_main!(benches);
