use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serial_http_bridge::common::test_utils::stub_link;
use serial_http_bridge::framing::{LineCodec, END_MARKER, START_MARKER};
use serial_http_bridge::{BridgeConfig, ResponseCollector};
use tokio::runtime::Runtime;
use tokio_util::codec::Decoder;

/// Serial output for one exchange: debug chatter, then a framed response
fn device_output(body_lines: usize) -> String {
    let mut output = String::new();
    for i in 0..8 {
        output.push_str(&format!("RX: byte {i} [wifi idle]\r\n"));
    }
    output.push_str(START_MARKER);
    output.push_str(" ===\n");
    output.push_str("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n");
    for i in 0..body_lines {
        output.push_str(&format!("<li>slot {i}: PIKACHU lv.{}</li>\n", i % 100));
    }
    output.push_str(END_MARKER);
    output.push('\n');
    output
}

fn bench_line_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_decoding");

    for body_lines in [16, 128, 1024] {
        let output = device_output(body_lines);
        group.throughput(Throughput::Bytes(output.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode", body_lines), &output, |b, output| {
            b.iter(|| {
                let mut codec = LineCodec::new();
                let mut buffer = BytesMut::from(output.as_bytes());
                let mut count = 0;
                while let Ok(Some(line)) = codec.decode(&mut buffer) {
                    black_box(line);
                    count += 1;
                }
                count
            });
        });
    }

    group.finish();
}

fn bench_frame_collection(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_collection");

    for body_lines in [16, 128, 1024] {
        let output = device_output(body_lines);
        let lines: Vec<&str> = output.lines().collect();
        group.throughput(Throughput::Elements(lines.len() as u64));
        group.bench_with_input(BenchmarkId::new("feed", body_lines), &lines, |b, lines| {
            b.iter(|| {
                let mut collector = ResponseCollector::new();
                for line in lines {
                    black_box(collector.feed(line));
                }
            });
        });
    }

    group.finish();
}

fn bench_exchange_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (link, mut device) = rt.block_on(async { stub_link(&BridgeConfig::default()) });

    rt.spawn(async move {
        while let Ok(Some(request)) = device.next_request().await {
            if device.respond(&["HTTP/1.1 200 OK", "", request.as_str()]).await.is_err() {
                break;
            }
        }
    });

    let correlator = link.correlator();
    c.bench_function("exchange_round_trip", |b| {
        b.iter(|| {
            rt.block_on(async {
                let payload = correlator.exchange("GET /api/pokemon").await.unwrap();
                black_box(payload)
            })
        });
    });
}

criterion_group!(
    benches,
    bench_line_decoding,
    bench_frame_collection,
    bench_exchange_round_trip
);

criterion_main!(benches);
