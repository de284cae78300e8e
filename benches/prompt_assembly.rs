use std::hint::black_box;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use hivelink::domain::models::{
    AgentRole, CommunicationPath, Demonstration, OptimizerArtifact, PrincessDomain, Task, TrainingMetadata,
};
use hivelink::services::{CompiledArtifact, PromptBuilder};

fn path() -> CommunicationPath {
    CommunicationPath::new(AgentRole::Queen, AgentRole::Princess(PrincessDomain::Development))
}

fn artifact(demos: usize) -> OptimizerArtifact {
    OptimizerArtifact {
        path: path(),
        instruction: "Split the request into steps a drone can verify alone.".to_string(),
        demonstrations: (0..demos)
            .map(|i| Demonstration {
                input: json!({ "description": format!("feature {i}"), "files": ["src/lib.rs", "src/main.rs"] }),
                reasoning: format!("feature {i} touches the entry point and the library"),
                output: json!({ "steps": ["write test", "implement", "refactor"], "estimate": i }),
            })
            .collect(),
        training_score: 0.85,
        version: 1,
        created_at: Utc::now(),
        metadata: TrainingMetadata::default(),
    }
}

fn task() -> Task {
    Task::new("implement", "add rate limiting to the public API")
        .expect("valid task")
        .with_objective("keep p95 under the latency budget")
        .with_payload(json!({ "endpoints": ["/v1/search", "/v1/ingest"], "limit_per_minute": 600 }))
}

fn benchmark_baseline(c: &mut Criterion) {
    let path = path();
    let task = task();
    c.bench_function("baseline_prompt", |b| {
        b.iter(|| PromptBuilder::baseline(black_box(&path), black_box(&task)));
    });
}

fn benchmark_augment(c: &mut Criterion) {
    let mut group = c.benchmark_group("augment");
    let task = task();

    for demos in [0usize, 4, 16] {
        let compiled = CompiledArtifact::compile(artifact(demos)).expect("valid artifact");
        group.bench_with_input(BenchmarkId::from_parameter(demos), &compiled, |b, compiled| {
            b.iter(|| compiled.augment(black_box(&task)));
        });
    }

    group.finish();
}

fn benchmark_compile(c: &mut Criterion) {
    c.bench_function("compile_artifact", |b| {
        b.iter_batched(
            || artifact(8),
            |a| CompiledArtifact::compile(black_box(a)),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, benchmark_baseline, benchmark_augment, benchmark_compile);
criterion_main!(benches);
