use gaussfocus::{
    measure_batch, Accumulation, Kernel, MomentEvaluator, OwnedImage, PeakLocator, SigmaSolver,
    SolverConfig, StarSeed,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

const SKY: i64 = 1000;

fn make_field(size: usize, spacing: usize, sigma: f64) -> (OwnedImage<u16>, Vec<StarSeed>) {
    let mut seeds = Vec::new();
    let mut centers = Vec::new();
    let mut y = spacing / 2;
    while y + spacing / 2 <= size {
        let mut x = spacing / 2;
        while x + spacing / 2 <= size {
            centers.push((x as f64 + 0.3, y as f64 - 0.2));
            seeds.push(StarSeed { x, y, sky: SKY });
            x += spacing;
        }
        y += spacing;
    }
    let image = OwnedImage::from_fn(size, size, |px, py| {
        let mut v = SKY as f64;
        for &(cx, cy) in &centers {
            let dx = px as f64 - cx;
            let dy = py as f64 - cy;
            if dx.abs() < 20.0 && dy.abs() < 20.0 {
                v += 25_000.0 * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
            }
        }
        v.round() as u16
    })
    .unwrap();
    (image, seeds)
}

fn bench_focus(c: &mut Criterion) {
    let (field, seeds) = make_field(512, 64, 1.8);
    let view = field.view();
    let seed = seeds[9];

    c.bench_function("kernel_generate_sigma_1_8", |b| {
        b.iter(|| black_box(Kernel::generate(black_box(1.8)).unwrap()));
    });

    let kernel = Kernel::generate(1.8).unwrap();
    let evaluator = MomentEvaluator::new(&kernel);
    c.bench_function("evaluate_moments_wide", |b| {
        b.iter(|| black_box(evaluator.evaluate(view, seed.x, seed.y, SKY).unwrap()));
    });

    let shifted = MomentEvaluator::new(&kernel).with_accumulation(Accumulation::Shifted);
    c.bench_function("evaluate_moments_shifted", |b| {
        b.iter(|| black_box(shifted.evaluate(view, seed.x, seed.y, SKY).unwrap()));
    });

    let locator = PeakLocator::new(&kernel);
    c.bench_function("locate_peak", |b| {
        b.iter(|| black_box(locator.locate(view, seed.x, seed.y, SKY).unwrap()));
    });

    let solver = SigmaSolver::new(SolverConfig::default());
    c.bench_function("solve_sigma_default_guess", |b| {
        b.iter(|| black_box(solver.solve(view, seed.x, seed.y, SKY).unwrap()));
    });

    let config = SolverConfig::default();
    c.bench_function("measure_batch_64_sources", |b| {
        b.iter(|| black_box(measure_batch(view, &seeds, &config).unwrap()));
    });

    #[cfg(feature = "rayon")]
    c.bench_function("measure_batch_64_sources_parallel", |b| {
        b.iter(|| black_box(gaussfocus::measure_batch_par(view, &seeds, &config).unwrap()));
    });
}

criterion_group!(benches, bench_focus);
criterion_main!(benches);
