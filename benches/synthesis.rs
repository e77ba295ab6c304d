use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hogtrain::detector::synthesize;
use hogtrain::trainer::{KernelType, SupportVector, SupportVectorModel};

const DIMENSION: usize = 3780;

fn model_with(support_vectors: usize) -> SupportVectorModel {
    let support_vectors = (0..support_vectors)
        .map(|sv| SupportVector {
            weight: if sv % 2 == 0 { 0.01 } else { -0.01 },
            features: (1..=DIMENSION as u32)
                .map(|index| (index, ((index as usize * 31 + sv) % 97) as f64 / 97.0))
                .collect(),
        })
        .collect();
    SupportVectorModel {
        model_version: 1,
        backend: "bench".to_string(),
        kernel: KernelType::Linear,
        feature_len: DIMENSION,
        bias: 0.5,
        support_vectors,
    }
}

fn bench_synthesize(c: &mut Criterion) {
    for count in [100usize, 1_000] {
        let model = model_with(count);
        c.bench_with_input(BenchmarkId::new("synthesize", count), &model, |b, model| {
            b.iter(|| synthesize(black_box(model), DIMENSION).expect("synthesize"));
        });
    }
}

criterion_group!(benches, bench_synthesize);
criterion_main!(benches);
