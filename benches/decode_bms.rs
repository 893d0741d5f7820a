//! Benchmark for decoding text charts.

use std::fmt::Write;

use bms_timeline::{bms::BmsDecoder, decode::DecodeConfig, rng::RngMock};
use criterion::{Criterion, Throughput};

/// A dense chart with tempo changes and long notes in every measure.
fn synthetic_chart(measures: u32) -> String {
    let mut source = String::from("#TITLE bench\n#BPM 150\n#BPM01 300\n#STOP01 24\n");
    for id in 1..=36 * 2 {
        let _ = writeln!(source, "#WAV{id:02} sound{id}.wav");
    }
    for measure in 0..measures {
        for key in 1..=5 {
            let _ = writeln!(source, "#{measure:03}1{key}:0102030405060708");
        }
        let _ = writeln!(source, "#{measure:03}16:01000000");
        let _ = writeln!(source, "#{measure:03}56:00000101");
        let _ = writeln!(source, "#{measure:03}01:0A0B0C0D");
        if measure % 8 == 0 {
            let _ = writeln!(source, "#{measure:03}08:0001");
            let _ = writeln!(source, "#{measure:03}09:01");
        }
    }
    source
}

fn bench_decode_bms(c: &mut Criterion) {
    let config = DecodeConfig::default();
    let decoder = BmsDecoder::new(&config);
    let files = [
        ("sample_7k", include_str!("../tests/files/sample_7k.bme").to_string()),
        ("synthetic_200", synthetic_chart(200)),
    ];
    let mut group = c.benchmark_group("decode_bms");

    for (name, source) in &files {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_function(*name, |b| {
            b.iter(|| {
                decoder.decode_with_rng(
                    "bench.bms",
                    std::hint::black_box(source.as_bytes()),
                    RngMock([1]),
                )
            });
        });
    }

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default();
    bench_decode_bms(&mut criterion);
}
