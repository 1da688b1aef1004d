use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mvtrack::multiview::homography_2d_robust;
use mvtrack::{track_region, FloatImage, RansacConfig, TrackRegionOptions, TrackerMode};

fn make_homography_fixture(n: usize, outlier_ratio: f64, seed: u64) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    let h = Matrix3::new(1.02, 0.05, 12.0, -0.03, 0.98, -7.0, 1e-4, -2e-4, 1.0);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x1 = Vec::with_capacity(n);
    let mut x2 = Vec::with_capacity(n);
    for i in 0..n {
        let p = [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)];
        let q = if (i as f64) < outlier_ratio * n as f64 {
            [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)]
        } else {
            let v = h * nalgebra::Vector3::new(p[0], p[1], 1.0);
            [v.x / v.z, v.y / v.z]
        };
        x1.push(p);
        x2.push(q);
    }
    (x1, x2)
}

fn texture(x: f64, y: f64) -> f32 {
    (0.35 + 0.12 * (0.30 * x + 0.12 * y).sin()
        + 0.10 * (0.10 * x - 0.26 * y + 0.7).cos()
        + 0.07 * (0.17 * x + 0.21 * y + 1.3).sin()) as f32
}

fn make_tracking_fixture(size: usize, shift: [f64; 2]) -> (FloatImage, FloatImage) {
    let img1 = FloatImage::from_fn(size, size, |x, y| texture(x as f64, y as f64));
    let img2 = FloatImage::from_fn(size, size, |x, y| {
        texture(x as f64 - shift[0], y as f64 - shift[1])
    });
    (img1, img2)
}

fn bench_homography(c: &mut Criterion) {
    let (x1, x2) = make_homography_fixture(200, 0.3, 7);
    let config = RansacConfig::default();

    c.bench_function("homography_robust_200pts_30pct", |b| {
        b.iter(|| {
            let est = homography_2d_robust(black_box(&x1), black_box(&x2), 1.0, &config);
            black_box(est.map(|e| e.inliers.len()).unwrap_or(0))
        })
    });
}

fn bench_track_region(c: &mut Criterion) {
    let (img1, img2) = make_tracking_fixture(64, [2.6, -1.7]);
    let c0 = [32.0, 32.0];
    let r = 5.0;
    let x = [
        [c0[0] - r, c0[1] - r],
        [c0[0] + r, c0[1] - r],
        [c0[0] + r, c0[1] + r],
        [c0[0] - r, c0[1] + r],
        c0,
    ];

    for mode in [TrackerMode::Brute, TrackerMode::Gradient, TrackerMode::Hybrid] {
        let options = TrackRegionOptions {
            mode,
            ..Default::default()
        };
        c.bench_function(&format!("track_region_64px_{:?}", mode).to_lowercase(), |b| {
            b.iter(|| {
                let out = track_region(black_box(&img1), black_box(&img2), &x, &x, &options);
                black_box(out.map(|o| o.points[4]).ok())
            })
        });
    }
}

criterion_group!(hotpaths, bench_homography, bench_track_region);
criterion_main!(hotpaths);
