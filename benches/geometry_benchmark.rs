use criterion::{black_box, criterion_group, criterion_main, Criterion};

use skyrotor::geometry::{RotatorModel, RotatorParams};

fn bench_to_real(c: &mut Criterion) {
    let model = RotatorModel::new(RotatorParams {
        tilt_az: 35.0,
        tilt_angle: 1.4,
        lateral_tilt: 0.3,
        ..RotatorParams::default()
    });
    c.bench_function("to_real with cached tilt quaternions", |b| {
        b.iter(|| {
            let (az, el) = black_box(model.to_real(black_box(123.4), black_box(56.7), true));
            az + el
        })
    });
}

fn bench_to_motor(c: &mut Criterion) {
    let model = RotatorModel::new(RotatorParams {
        tilt_az: 35.0,
        tilt_angle: 1.4,
        lateral_tilt: 0.3,
        ..RotatorParams::default()
    });
    c.bench_function("to_motor with cached tilt quaternions", |b| {
        b.iter(|| {
            let (az, el) = black_box(model.to_motor(black_box(123.4), black_box(56.7), true));
            az + el
        })
    });
}

fn bench_to_real_cold_cache(c: &mut Criterion) {
    c.bench_function("to_real with a fresh model per call", |b| {
        b.iter(|| {
            let model = RotatorModel::new(RotatorParams {
                tilt_az: black_box(35.0),
                tilt_angle: black_box(1.4),
                lateral_tilt: black_box(0.3),
                ..RotatorParams::default()
            });
            let (az, el) = model.to_real(123.4, 56.7, true);
            az + el
        })
    });
}

criterion_group!(benches, bench_to_real, bench_to_motor, bench_to_real_cold_cache);
criterion_main!(benches);
