//! Criterion benchmarks for vectorization, fitting, and sampling.
//!
//! Run with: `cargo bench --bench vectorize_bench`
//!
//! ## Benchmarks
//!
//! 1. **Encode**: windows to one-hot `(x, y)` at several corpus sizes
//! 2. **Fit**: count model over a full encoded batch
//! 3. **Reweight + draw**: one sampling step at several alphabet sizes
//! 4. **Generate**: 100 characters from a fitted model

use chargen::{draw_index, encode, extract_windows, generate, reweight, Alphabet, CountModel};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthetic corpus of `len` characters over a prose-like alphabet.
fn synthetic_corpus(len: usize, seed: u64) -> Vec<char> {
    const SYMBOLS: &str = "abcdefghijklmnopqrstuvwxyz    .,;'\n";
    let symbols: Vec<char> = SYMBOLS.chars().collect();
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| symbols[rng.gen_range(0..symbols.len())])
        .collect()
}

fn random_distribution(n: usize, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let raw: Array1<f64> = (0..n).map(|_| rng.gen_range(0.01..1.0)).collect();
    let total = raw.sum();
    raw / total
}

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.sample_size(20);

    for corpus_len in [5_000, 20_000, 50_000] {
        let corpus = synthetic_corpus(corpus_len, 1);
        let alphabet = Alphabet::from_corpus(&corpus).expect("non-empty corpus");
        let windows = extract_windows(&corpus, 60, 3).expect("valid params");
        group.throughput(Throughput::Elements(windows.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("maxlen60_step3", corpus_len),
            &corpus_len,
            |b, _| {
                b.iter(|| {
                    encode(black_box(windows.clone()), black_box(&alphabet))
                        .expect("encode failed")
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark: Fit
// ============================================================================

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    let corpus = synthetic_corpus(30_000, 2);
    let alphabet = Alphabet::from_corpus(&corpus).expect("non-empty corpus");
    let batch = encode(
        extract_windows(&corpus, 40, 3).expect("valid params"),
        &alphabet,
    )
    .expect("encode failed");

    for order in [1, 3, 5] {
        group.bench_with_input(BenchmarkId::new("order", order), &order, |b, &order| {
            b.iter(|| {
                let mut model =
                    CountModel::new(alphabet.size(), order, 0.01).expect("valid model");
                model
                    .fit(black_box(batch.x.view()), black_box(batch.y.view()))
                    .expect("fit failed")
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Reweight + Draw
// ============================================================================

fn bench_sample_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_step");

    for size in [30, 60, 120] {
        let probs = random_distribution(size, 3);
        group.bench_with_input(BenchmarkId::new("alphabet", size), &size, |b, _| {
            let mut rng = StdRng::seed_from_u64(4);
            b.iter(|| {
                let q = reweight(black_box(&probs), black_box(0.5)).expect("reweight failed");
                draw_index(&q, &mut rng).expect("draw failed")
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Generate
// ============================================================================

fn bench_generate(c: &mut Criterion) {
    let corpus = synthetic_corpus(20_000, 5);
    let alphabet = Alphabet::from_corpus(&corpus).expect("non-empty corpus");
    let maxlen = 40;
    let batch = encode(
        extract_windows(&corpus, maxlen, 3).expect("valid params"),
        &alphabet,
    )
    .expect("encode failed");
    let mut model = CountModel::new(alphabet.size(), 3, 0.01).expect("valid model");
    model
        .fit(batch.x.view(), batch.y.view())
        .expect("fit failed");
    let seed: String = corpus[..maxlen].iter().collect();

    c.bench_function("generate_100_chars", |b| {
        let mut rng = StdRng::seed_from_u64(6);
        b.iter(|| {
            generate(
                black_box(&model),
                black_box(&seed),
                &alphabet,
                maxlen,
                0.5,
                100,
                &mut rng,
            )
            .expect("generate failed")
        });
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_fit,
    bench_sample_step,
    bench_generate,
);
criterion_main!(benches);
