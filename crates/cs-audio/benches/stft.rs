use criterion::{Criterion, black_box, criterion_group, criterion_main};
use cs_audio::StftEngine;
use cs_core::AudioSignal;

fn bench_stft(c: &mut Criterion) {
    let sample_rate = 250_000;
    let samples: Vec<f32> = (0..sample_rate as usize)
        .map(|i| (i as f32 * 0.37).sin() * 0.25)
        .collect();
    let signal = AudioSignal::new(samples, sample_rate);
    let mut engine = StftEngine::new(sample_rate);

    c.bench_function("stft_1s_250khz", |b| {
        b.iter(|| black_box(engine.process(black_box(&signal))));
    });
}

criterion_group!(benches, bench_stft);
criterion_main!(benches);
