//! Full sweeps driven by the scheduler against a simulated unity path

mod common;

use common::{Loopback, BLOCK};
use spectral_profiler::constants::SWEEP_LENGTH;
use spectral_profiler::sweep::{nth_bin_position, PlotData, SweepObserver};
use spectral_profiler::{EngineConfig, Level, SweepConfig, SweepScheduler, TransferEngine};
use std::sync::{Arc, Mutex};

const MAX_CALLBACKS: usize = 4000;

#[derive(Debug, Default)]
struct Seen {
    progress: Vec<f64>,
    phases: Vec<Option<Level>>,
    plots: usize,
}

struct Recorder(Arc<Mutex<Seen>>);

impl SweepObserver for Recorder {
    fn show_progress(&mut self, fraction: f64) {
        self.0.lock().unwrap().progress.push(fraction);
    }

    fn show_plot_data(&mut self, _plot: &PlotData<'_>) {
        self.0.lock().unwrap().plots += 1;
    }

    fn sweep_phase_changed(&mut self, level: Option<Level>) {
        self.0.lock().unwrap().phases.push(level);
    }
}

fn setup(config: SweepConfig) -> (TransferEngine, SweepScheduler, Arc<Mutex<Seen>>) {
    let (engine, handle) = TransferEngine::new(&EngineConfig::default()).unwrap();
    let seen = Arc::new(Mutex::new(Seen::default()));
    let scheduler = SweepScheduler::new(handle, &config, Box::new(Recorder(Arc::clone(&seen))));
    (engine, scheduler, seen)
}

/// Run callbacks and polls until `done` holds
fn run_until(
    engine: &mut TransferEngine,
    scheduler: &mut SweepScheduler,
    path: &mut Loopback,
    done: impl Fn(&SweepScheduler) -> bool,
) {
    for _ in 0..MAX_CALLBACKS {
        path.run(engine);
        scheduler.poll().unwrap();
        if done(scheduler) {
            return;
        }
    }
    panic!("sweep did not finish within {} callbacks", MAX_CALLBACKS);
}

fn assert_flat(scheduler: &SweepScheduler, level: Level) {
    let curve = scheduler.curve(level);
    for (position, (&hz, &db)) in scheduler
        .plot_frequencies()
        .iter()
        .zip(curve.magnitudes_db())
        .enumerate()
    {
        // Low tones of a wide batch sit a couple of FFT bins apart
        if hz < 100.0 {
            continue;
        }
        assert!(db.abs() < 0.1, "position {} at {} Hz reads {} dB", position, hz, db);
        assert!(curve.phases()[position].abs() < 0.02);
    }
}

#[test]
fn test_sweep_covers_both_levels() {
    let (mut engine, mut scheduler, seen) = setup(SweepConfig {
        bins_at_once: 32,
        ..SweepConfig::default()
    });
    let mut path = Loopback::new(0, 1.0);

    scheduler.set_sweep_active(true).unwrap();
    assert_eq!(scheduler.phase(), Some(Level::Lo));

    run_until(&mut engine, &mut scheduler, &mut path, |s| {
        s.phase() == Some(Level::Hi)
    });
    assert_flat(&scheduler, Level::Lo);

    run_until(&mut engine, &mut scheduler, &mut path, |s| {
        s.phase() == Some(Level::Lo)
    });
    assert_flat(&scheduler, Level::Hi);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.phases, vec![Some(Level::Hi), Some(Level::Lo)]);
    assert_eq!(seen.plots, 8);
    // Each completed level hands over to the other with a cleared set
    assert_eq!(
        seen.progress,
        vec![0.0, 0.25, 0.5, 0.75, 0.0, 0.25, 0.5, 0.75, 0.0]
    );

    // Measured frequencies replace the nominal grid
    let measured = scheduler.plot_frequencies();
    let nominal = scheduler.frequency_table().as_slice();
    assert_eq!(measured.len(), SWEEP_LENGTH);
    assert!(measured.iter().zip(nominal).any(|(m, n)| m != n));
    assert!(measured.iter().zip(nominal).all(|(m, n)| (m - n).abs() < 1.0));
}

#[test]
fn test_disabled_levels_stop_the_engine() {
    let (mut engine, mut scheduler, seen) = setup(SweepConfig {
        bins_at_once: 32,
        hi_enabled: false,
        ..SweepConfig::default()
    });
    let mut path = Loopback::new(0, 1.0);

    scheduler.set_sweep_active(true).unwrap();
    path.run(&mut engine);
    assert!(engine.is_active());

    scheduler.set_levels_enabled(false, false).unwrap();
    run_until(&mut engine, &mut scheduler, &mut path, |s| s.phase().is_none());

    path.run(&mut engine);
    assert!(!engine.is_active());
    assert_eq!(seen.lock().unwrap().phases, vec![None]);
}

#[test]
fn test_sweep_exports_profile() {
    let (mut engine, mut scheduler, _seen) = setup(SweepConfig {
        bins_at_once: 32,
        hi_enabled: false,
        ..SweepConfig::default()
    });
    let mut path = Loopback::new(0, 1.0);

    scheduler.set_sweep_active(true).unwrap();
    // Four batches of 32 cover the sweep; the revolution then restarts
    run_until(&mut engine, &mut scheduler, &mut path, |s| {
        s.sweep_index() == 5 && s.progress().count() == 0
    });

    let dir = std::env::temp_dir().join(format!("spectral-profiler-sweep-{}", std::process::id()));
    let written = scheduler.export_profile(&dir).unwrap();
    assert_eq!(written, vec![dir.join("lo.dat")]);

    let contents = std::fs::read_to_string(&written[0]).unwrap();
    assert_eq!(contents.lines().count(), SWEEP_LENGTH);
    for line in contents.lines() {
        let fields: Vec<f64> = line.split(' ').map(|field| field.parse().unwrap()).collect();
        assert_eq!(fields.len(), 3);
    }

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_restart_discards_result_of_abandoned_batch() {
    let (mut engine, mut scheduler, _seen) = setup(SweepConfig {
        bins_at_once: 32,
        hi_enabled: false,
        ..SweepConfig::default()
    });
    let mut path = Loopback::new(0, 1.0);

    // Let the first batch finish without collecting its result
    scheduler.set_sweep_active(true).unwrap();
    for _ in 0..2 * engine.fft_size() / BLOCK + 8 {
        path.run(&mut engine);
    }

    scheduler.set_sweep_active(false).unwrap();
    scheduler.set_sweep_active(true).unwrap();
    assert_eq!(scheduler.sweep_index(), 2);

    assert_eq!(scheduler.poll().unwrap(), 0);
    assert_eq!(scheduler.progress().count(), 0);
    assert_eq!(
        scheduler.plot_frequencies(),
        scheduler.frequency_table().as_slice()
    );

    run_until(&mut engine, &mut scheduler, &mut path, |s| {
        s.progress().count() == 32
    });
    let table = scheduler.frequency_table();
    for nth in 0..32 {
        let position = nth_bin_position(1, nth, 32);
        assert!(scheduler.progress().contains(position));
        let measured = scheduler.plot_frequencies()[position];
        assert!(
            (measured - table.frequency(position)).abs() < 1.0,
            "position {} measured at {} Hz",
            position,
            measured
        );
        if measured >= 100.0 {
            assert!(scheduler.curve(Level::Lo).magnitudes_db()[position].abs() < 0.1);
        }
    }
}
