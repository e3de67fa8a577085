use std::hint::black_box;

use chrono::NaiveDate;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use markowitz::portfolio::compute_statistics;
use markowitz::portfolio::ConstraintMode;
use markowitz::portfolio::FrontierSolver;
use markowitz::portfolio::ReturnMatrix;
use markowitz::portfolio::TangencyPortfolioSolver;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;

const PERIODS: usize = 120;

fn returns(assets: usize) -> ReturnMatrix {
  let mut rng = StdRng::seed_from_u64(17);
  let mut values = DMatrix::zeros(PERIODS, assets);
  for j in 0..assets {
    let normal = Normal::new(0.003 + 0.001 * j as f64, 0.02 + 0.005 * j as f64).unwrap();
    for i in 0..PERIODS {
      values[(i, j)] = normal.sample(&mut rng);
    }
  }
  let periods = (0..PERIODS)
    .map(|i| NaiveDate::from_ymd_opt(2010 + (i / 12) as i32, 1 + (i % 12) as u32, 1).unwrap())
    .collect();
  let names = (0..assets).map(|j| format!("A{j}")).collect();
  ReturnMatrix::new(periods, names, values).unwrap()
}

fn bench_frontier(c: &mut Criterion) {
  let mut group = c.benchmark_group("Frontier");
  group.sample_size(10);

  for assets in [3, 5, 10] {
    let stats = compute_statistics(&returns(assets), 0.04).unwrap();

    group.bench_with_input(BenchmarkId::new("sequential", assets), &stats, |b, stats| {
      let solver = FrontierSolver::default();
      b.iter(|| black_box(solver.compute_frontier(stats, ConstraintMode::Bounded, 100)))
    });

    group.bench_with_input(BenchmarkId::new("parallel", assets), &stats, |b, stats| {
      let solver = FrontierSolver::default().parallel(true);
      b.iter(|| black_box(solver.compute_frontier(stats, ConstraintMode::Bounded, 100)))
    });
  }

  group.finish();
}

fn bench_tangency(c: &mut Criterion) {
  let stats = compute_statistics(&returns(5), 0.04).unwrap();
  let frontier = FrontierSolver::default()
    .compute_frontier(&stats, ConstraintMode::Unbounded, 100)
    .unwrap();
  let solver = TangencyPortfolioSolver::default();

  c.bench_function("tangency_unbounded_5", |b| {
    b.iter(|| {
      black_box(solver.compute_tangency(&frontier, 0.04, &stats, ConstraintMode::Unbounded))
    })
  });
}

criterion_group!(benches, bench_frontier, bench_tangency);
criterion_main!(benches);
