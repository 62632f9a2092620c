//! Surrogate hot paths.
//!
//! 1. Pair construction from an evaluated pool (`combine`)
//! 2. Comparator inference over a batch of candidate/reference pairs
//! 3. One offspring draw from the genetic engine

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use pairsearch::design::{Design, ParamSpace};
use pairsearch::evolve::{Bounds, GeneticConfig, OffspringGenerator};
use pairsearch::neural::data::normalize::Normalizer;
use pairsearch::neural::data::pairs::combine;
use pairsearch::neural::inference::{Comparator, PairJudge};
use pairsearch::neural::model::comparator::ComparatorConfig;

use burn::backend::NdArray;

type B = NdArray;

/// Evaluated designs on a 7-parameter grid with a smooth cost.
fn synthetic_pool(n: usize) -> Vec<Design> {
    (0..n)
        .map(|i| {
            let params: Vec<usize> = (0..7).map(|d| (i * (d + 3) + d) % 16).collect();
            let cost = params.iter().map(|&p| (p as f64 - 7.5).powi(2)).sum();
            Design::evaluated(params, cost)
        })
        .collect()
}

fn bench_combine(c: &mut Criterion) {
    let pool = synthetic_pool(200);
    let mut group = c.benchmark_group("combine");
    for k_top in [10, 20, 50] {
        group.bench_function(format!("n200_k{}", k_top), |b| {
            let mut rng = ChaCha8Rng::seed_from_u64(10);
            b.iter(|| combine(black_box(&pool), k_top, &mut rng))
        });
    }
    group.finish();
}

fn bench_judge_batch(c: &mut Criterion) {
    let device = Default::default();
    let model = ComparatorConfig::new().init::<B>(7, &device);
    let pool = synthetic_pool(256);
    let normalizer = Normalizer::fit(pool.iter().map(Design::params), 7);
    let judge = Comparator::new(model, normalizer, device);

    let reference = pool[0].params();
    let pairs: Vec<(&[usize], &[usize])> = pool.iter().map(|d| (d.params(), reference)).collect();

    c.bench_function("judge_batch_256", |b| {
        b.iter(|| judge.judge_batch(black_box(&pairs)))
    });
    c.bench_function("judge_single", |b| {
        b.iter(|| judge.judge(black_box(pool[1].params()), black_box(reference)))
    });
}

fn bench_offspring(c: &mut Criterion) {
    let space = ParamSpace::from_lengths(&[16; 7]).unwrap_or_else(|e| panic!("{}", e));
    let engine = OffspringGenerator::tournament(GeneticConfig::new(), Bounds::from_space(&space))
        .unwrap_or_else(|e| panic!("{}", e));
    let population = synthetic_pool(40);
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    c.bench_function("offspring_draw_pop40", |b| {
        b.iter(|| engine.generate(black_box(&population), &mut rng))
    });
}

criterion_group!(benches, bench_combine, bench_judge_batch, bench_offspring);
criterion_main!(benches);
