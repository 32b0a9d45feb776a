use criterion::Criterion;

use rmfeature::{
    ContinuumLorentz, ContinuumVoigt, FeatureRemover, LineParams, Profile, ProfileModel, Region,
    RemovalConfig, Spectrum,
};

fn synthetic(model: &dyn ProfileModel, truth: &LineParams, n: usize) -> Spectrum {
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    Spectrum::new(model.predict(truth, &x))
}

fn lorentz_fitting(c: &mut Criterion) {
    let truth = LineParams::new(100.0, 0.05, -30.0, 250.0, 12.0, None);
    let spectrum = synthetic(&ContinuumLorentz, &truth, 500);
    let region = Region::new(150, 350, spectrum.len()).unwrap();
    let remover = FeatureRemover::new(RemovalConfig::default().profile(Profile::Lorentz));
    c.bench_function("lorentz_fit", |b| {
        b.iter(|| remover.fit(&spectrum, region).unwrap())
    });
}

fn voigt_fitting(c: &mut Criterion) {
    let truth = LineParams::new(80.0, -0.02, -400.0, 240.0, 6.0, Some(8.0));
    let spectrum = synthetic(&ContinuumVoigt, &truth, 480);
    let region = Region::new(140, 340, spectrum.len()).unwrap();
    let remover = FeatureRemover::new(RemovalConfig::default().profile(Profile::Voigt));
    c.bench_function("voigt_two_stage_fit", |b| {
        b.iter(|| remover.fit(&spectrum, region).unwrap())
    });
}

fn fitting(c: &mut Criterion) {
    lorentz_fitting(c);
    voigt_fitting(c);
}

criterion::criterion_group!(benches, fitting);
criterion::criterion_main!(benches);
