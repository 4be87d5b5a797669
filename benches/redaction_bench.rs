// Redaction and ingest-parsing benchmarks
//
// 1. Redacting a flat payload
// 2. Redacting a deeply nested payload
// 3. Parsing a 500-event ingest body

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use event_collector::{
    event::{parse_ingest_body, Event, Level},
    redaction::{redact_event, redact_value, RedactionKeys},
};
use serde_json::{json, Value};

fn nested_payload(depth: usize) -> Value {
    let mut value = json!({"password": "hunter2", "safe": "ok", "list": [1, 2, 3]});
    for i in 0..depth {
        value = json!({"level": i, "token": "abc", "child": value, "items": [value.clone()]});
    }
    value
}

fn benchmark_redaction(c: &mut Criterion) {
    let keys = RedactionKeys::parse("email,token,authorization,password");

    let flat = Event::new(0, Level::Info, "signup").with_payload(json!({
        "email": "a@b.com",
        "plan": "pro",
        "referrer": "newsletter",
        "authorization": "Bearer x"
    }));
    c.bench_function("redact_flat_event", |b| {
        b.iter(|| redact_event(black_box(flat.clone()), &keys))
    });

    let nested = nested_payload(8);
    c.bench_function("redact_nested_payload", |b| {
        b.iter(|| redact_value(black_box(&nested), &keys))
    });
}

fn benchmark_parse(c: &mut Criterion) {
    let body = Value::Array(
        (0..500)
            .map(|i| {
                json!({
                    "timestampMs": i,
                    "level": "info",
                    "name": "screen_view",
                    "deviceId": "device-1",
                    "payload": {"index": i, "email": "a@b.com"}
                })
            })
            .collect(),
    )
    .to_string();

    c.bench_function("parse_ingest_body_500", |b| {
        b.iter(|| parse_ingest_body(black_box(body.as_bytes())))
    });
}

criterion_group!(benches, benchmark_redaction, benchmark_parse);
criterion_main!(benches);
