use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spectral_profiler::audio::messages::{Message, ToneBatch};
use spectral_profiler::spectrum::{hann_window, FftEngine};
use spectral_profiler::{EngineConfig, Level, RetryPolicy, TransferEngine};

const BLOCK: usize = 512;

fn bench_engine_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer_engine");

    // Steady-state generation with varying batch sizes
    for bins in [1usize, 8, 32] {
        group.bench_with_input(BenchmarkId::new("process_512", bins), &bins, |b, &count| {
            let (mut engine, mut handle) = TransferEngine::new(&EngineConfig::default()).unwrap();
            let frequencies: Vec<f32> = (0..count).map(|i| 100.0 + 500.0 * i as f32).collect();
            handle
                .send(
                    &Message::StartToneBatch(ToneBatch::new(Level::Hi, &frequencies)),
                    &RetryPolicy::default(),
                )
                .unwrap();

            let input = vec![0.0f32; BLOCK];
            let mut output = vec![0.0f32; BLOCK];

            b.iter(|| {
                engine.process(black_box(&input), &mut output);
                // Drop results so the channel never fills
                while handle.receive().is_some() {}
            });
        });
    }

    // Analysis of one full capture
    group.bench_function("transform_windowed_32768", |b| {
        let fft_size = EngineConfig::default().fft_size();
        let mut fft = FftEngine::new(fft_size);
        let window = hann_window(fft_size);
        let signal: Vec<f32> = (0..fft_size).map(|n| (n as f32 * 0.01).sin()).collect();

        b.iter(|| {
            let spectrum = fft.transform_windowed(black_box(&signal), &window).unwrap();
            black_box(spectrum[0]);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_engine_process);
criterion_main!(benches);
