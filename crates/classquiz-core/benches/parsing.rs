use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use classquiz_core::parser::{normalize, normalize_str, validate_questions};

fn generate_questions(n: usize) -> Value {
    let questions: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "question": format!("What is {i} + 1?"),
                "options": [format!("{}", i), format!("{}", i + 1), format!("{}", i + 2)],
                "correct_answer": format!("{}", i + 1),
                "explanation": "Add one."
            })
        })
        .collect();
    Value::Array(questions)
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    let bare = generate_questions(20);
    let nested = json!({ "quiz": generate_questions(20) });
    let encoded = Value::String(nested.to_string());
    let large = generate_questions(500);

    group.bench_function("array_20", |b| b.iter(|| normalize(black_box(&bare))));

    group.bench_function("nested_20", |b| b.iter(|| normalize(black_box(&nested))));

    group.bench_function("encoded_20", |b| {
        b.iter(|| normalize(black_box(&encoded)))
    });

    group.bench_function("array_500", |b| b.iter(|| normalize(black_box(&large))));

    group.bench_function("malformed", |b| {
        b.iter(|| normalize_str(black_box("{\"quiz\": 42")))
    });

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let questions = normalize(&generate_questions(200)).unwrap_or_default();

    c.bench_function("validate_200", |b| {
        b.iter(|| validate_questions(black_box(&questions)))
    });
}

criterion_group!(benches, bench_normalize, bench_validate);
criterion_main!(benches);
