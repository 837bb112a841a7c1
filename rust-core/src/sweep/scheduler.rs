//! Sweep scheduler
//!
//! Non-real-time driver of the transfer-function engine. Each tick posts the
//! next batch of sweep positions for the current excitation level; each
//! result folds into that level's response curve. Once a level has covered
//! every position, the sweep moves on to the other enabled level.
//!
//! Expected use: call [`SweepScheduler::poll`] from a periodic timer, about
//! every 50 ms.

use super::curve::ResponseCurve;
use super::export::{export_profile, ExportError};
use super::observer::{PlotData, SweepObserver};
use super::progress::ProgressSet;
use super::table::{nth_bin_position, FrequencyTable};
use crate::audio::channel::ChannelError;
use crate::audio::engine::EngineHandle;
use crate::audio::messages::{AnalysisResult, Message, ToneBatch};
use crate::config::{clamp_bins_at_once, RetryPolicy, SweepConfig};
use crate::constants::{MAX_BINS_AT_ONCE, SWEEP_LENGTH};
use crate::level::Level;
use std::path::{Path, PathBuf};

/// Level swept after `current`, given which levels are enabled
///
/// Alternates Lo and Hi while both are enabled, sticks to the only enabled
/// one otherwise, and yields `None` when neither is.
pub fn next_level(current: Option<Level>, lo_enabled: bool, hi_enabled: bool) -> Option<Level> {
    match current {
        _ if !lo_enabled && !hi_enabled => None,
        None | Some(Level::Hi) if lo_enabled => Some(Level::Lo),
        None | Some(Level::Lo) if hi_enabled => Some(Level::Hi),
        other => other,
    }
}

/// Batch posted to the engine and not answered yet
#[derive(Debug, Clone, Copy)]
struct InFlight {
    serial: u32,
    sweep_index: usize,
    level: Level,
}

pub struct SweepScheduler {
    engine: EngineHandle,
    observer: Box<dyn SweepObserver + Send>,
    retry: RetryPolicy,

    table: FrequencyTable,
    /// Frequencies actually measured at each position, for plots and export
    plot_frequencies: [f64; SWEEP_LENGTH],
    lo_curve: ResponseCurve,
    hi_curve: ResponseCurve,

    active: bool,
    sweep_index: usize,
    phase: Option<Level>,
    bins_at_once: usize,
    progress: ProgressSet,
    lo_enabled: bool,
    hi_enabled: bool,

    in_flight: Option<InFlight>,
    next_serial: u32,
    tick_pending: bool,
    stop_posted: bool,
}

impl SweepScheduler {
    pub fn new(
        engine: EngineHandle,
        config: &SweepConfig,
        observer: Box<dyn SweepObserver + Send>,
    ) -> Self {
        let table = FrequencyTable::new();
        let mut plot_frequencies = [0.0; SWEEP_LENGTH];
        plot_frequencies.copy_from_slice(table.as_slice());

        let phase = next_level(None, config.lo_enabled, config.hi_enabled);

        Self {
            engine,
            observer,
            retry: config.retry,
            table,
            plot_frequencies,
            lo_curve: ResponseCurve::new(),
            hi_curve: ResponseCurve::new(),
            active: false,
            sweep_index: 0,
            phase,
            bins_at_once: clamp_bins_at_once(config.bins_at_once),
            progress: ProgressSet::new(),
            lo_enabled: config.lo_enabled,
            hi_enabled: config.hi_enabled,
            in_flight: None,
            next_serial: 0,
            tick_pending: false,
            stop_posted: false,
        }
    }

    /// Start or stop sweeping
    pub fn set_sweep_active(&mut self, active: bool) -> Result<(), ChannelError> {
        if self.active == active {
            return Ok(());
        }
        self.active = active;

        if active {
            log::info!("Sweep started ({:?}, {} bins at once)", self.phase, self.bins_at_once);
            self.progress.clear();
            self.observer.show_progress(0.0);
            self.tick_pending = true;
            self.run_pending_tick()
        } else {
            log::info!("Sweep stopped");
            self.tick_pending = false;
            self.in_flight = None;
            self.progress.clear();
            self.observer.show_progress(0.0);
            self.post_stop()
        }
    }

    /// Choose which excitation levels are measured
    pub fn set_levels_enabled(&mut self, lo: bool, hi: bool) -> Result<(), ChannelError> {
        if lo == self.lo_enabled && hi == self.hi_enabled {
            return Ok(());
        }

        let was_disabled = !self.lo_enabled && !self.hi_enabled;
        self.lo_enabled = lo;
        self.hi_enabled = hi;

        self.progress.clear();
        self.observer.show_progress(0.0);

        if was_disabled {
            if let Some(level) = next_level(self.phase, lo, hi) {
                self.set_phase(Some(level));
                if self.active {
                    self.tick_pending = true;
                    return self.run_pending_tick();
                }
            }
        }
        Ok(())
    }

    /// Number of tones per batch, clamped to 1..=32
    pub fn set_bins_at_once(&mut self, count: usize) {
        let count = clamp_bins_at_once(count);
        if count != self.bins_at_once {
            self.bins_at_once = count;
            self.progress.clear();
            self.observer.show_progress(0.0);
        }
    }

    pub fn set_global_gain(&self, gain: f32) {
        self.engine.set_global_gain(gain);
    }

    /// Consume engine results, schedule the next batch and report levels
    ///
    /// # Returns
    /// Number of results folded into the curves; stale ones are not counted
    pub fn poll(&mut self) -> Result<usize, ChannelError> {
        let mut consumed = 0;
        while let Some(message) = self.engine.receive() {
            match message {
                Message::AnalysisResult(result) => {
                    if self.handle_result(&result) {
                        consumed += 1;
                    }
                }
                other => panic!("unexpected {:?} on the result channel", other.tag()),
            }
        }

        let tick = self.run_pending_tick();

        self.observer
            .show_levels(self.engine.input_level(), self.engine.output_level());

        tick.map(|_| consumed)
    }

    /// Fold a result into its curve if it answers the batch in flight
    fn handle_result(&mut self, result: &AnalysisResult) -> bool {
        let in_flight = match self.in_flight {
            Some(in_flight)
                if in_flight.serial == result.serial() && in_flight.level == result.level() =>
            {
                in_flight
            }
            Some(in_flight) => {
                log::debug!(
                    "Discarding stale result #{} ({:?}), waiting for #{} ({:?})",
                    result.serial(),
                    result.level(),
                    in_flight.serial,
                    in_flight.level
                );
                return false;
            }
            None => {
                log::debug!("Discarding result #{} with no batch in flight", result.serial());
                return false;
            }
        };
        self.in_flight = None;

        let level = in_flight.level;
        let count = result.bin_count();
        let curve = match level {
            Level::Lo => &mut self.lo_curve,
            Level::Hi => &mut self.hi_curve,
        };
        let measured = result.frequencies().iter().zip(result.responses());
        for (nth, (&freq, response)) in measured.enumerate() {
            let position = nth_bin_position(in_flight.sweep_index, nth, count);
            self.plot_frequencies[position] = freq as f64;
            curve.record(position, response);
            self.progress.insert(position);
        }

        let complete = self.progress.is_complete();
        if complete || !self.is_enabled(level) {
            let next = next_level(self.phase, self.lo_enabled, self.hi_enabled);
            if complete && next == self.phase {
                // Same level again: a new revolution starts from zero
                self.progress.clear();
            }
            self.set_phase(next);
        }

        self.observer.show_progress(self.progress.fraction());
        self.replot();

        if self.active {
            self.tick_pending = true;
        }
        true
    }

    fn run_pending_tick(&mut self) -> Result<(), ChannelError> {
        if !self.tick_pending || !self.active {
            return Ok(());
        }
        self.next_sweep_tick()?;
        self.tick_pending = false;
        Ok(())
    }

    fn next_sweep_tick(&mut self) -> Result<(), ChannelError> {
        let level = match self.phase {
            Some(level) => level,
            None => return self.post_stop(),
        };

        let index = self.sweep_index;
        let count = self.bins_at_once;
        let mut frequencies = [0.0f32; MAX_BINS_AT_ONCE];
        for (nth, freq) in frequencies[..count].iter_mut().enumerate() {
            *freq = self.table.frequency(nth_bin_position(index, nth, count)) as f32;
        }

        let serial = self.next_serial;
        let batch = ToneBatch::new(level, &frequencies[..count]).with_serial(serial);
        self.send(&Message::StartToneBatch(batch))?;
        self.stop_posted = false;
        self.next_serial = serial.wrapping_add(1);

        self.in_flight = Some(InFlight {
            serial,
            sweep_index: index,
            level,
        });
        self.sweep_index = (index + 1) % SWEEP_LENGTH;

        self.observer.show_current_frequency(frequencies[0] as f64);
        Ok(())
    }

    fn post_stop(&mut self) -> Result<(), ChannelError> {
        if self.stop_posted {
            return Ok(());
        }
        self.send(&Message::StopGeneration)?;
        self.stop_posted = true;
        Ok(())
    }

    fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        let retry = self.retry;
        self.engine.send(message, &retry).map_err(|err| {
            log::warn!("Could not post {:?} to the engine: {}", message.tag(), err);
            err
        })
    }

    fn set_phase(&mut self, phase: Option<Level>) {
        if self.phase == phase {
            return;
        }
        log::debug!("Sweep phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.progress.clear();
        self.observer.sweep_phase_changed(phase);
    }

    fn is_enabled(&self, level: Level) -> bool {
        match level {
            Level::Lo => self.lo_enabled,
            Level::Hi => self.hi_enabled,
        }
    }

    fn replot(&mut self) {
        let plot = PlotData {
            frequencies: &self.plot_frequencies,
            mark_frequency: self.plot_frequencies[self.sweep_index],
            lo: &self.lo_curve,
            hi: &self.hi_curve,
        };
        self.observer.show_plot_data(&plot);
    }

    /// Write the curves of the enabled levels into a profile directory
    pub fn export_profile(&self, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
        let mut curves = Vec::with_capacity(2);
        if self.lo_enabled {
            curves.push((Level::Lo, &self.lo_curve));
        }
        if self.hi_enabled {
            curves.push((Level::Hi, &self.hi_curve));
        }
        export_profile(dir, &self.plot_frequencies, &curves)
    }

    pub fn curve(&self, level: Level) -> &ResponseCurve {
        match level {
            Level::Lo => &self.lo_curve,
            Level::Hi => &self.hi_curve,
        }
    }

    pub fn frequency_table(&self) -> &FrequencyTable {
        &self.table
    }

    pub fn plot_frequencies(&self) -> &[f64] {
        &self.plot_frequencies
    }

    pub fn phase(&self) -> Option<Level> {
        self.phase
    }

    pub fn progress(&self) -> &ProgressSet {
        &self.progress
    }

    pub fn sweep_index(&self) -> usize {
        self.sweep_index
    }

    pub fn bins_at_once(&self) -> usize {
        self.bins_at_once
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }
}
