//! Presentation callbacks
//!
//! The scheduler reports its state through this trait and never reads
//! anything back from it; a front end that wants to change the sweep goes
//! through the scheduler's own methods like any other caller.

use super::curve::ResponseCurve;
use crate::level::Level;

/// Curve data handed to a plot
#[derive(Debug, Clone, Copy)]
pub struct PlotData<'a> {
    /// Frequency of each sweep position in Hz
    pub frequencies: &'a [f64],

    /// Frequency of the position measured next
    pub mark_frequency: f64,

    pub lo: &'a ResponseCurve,
    pub hi: &'a ResponseCurve,
}

impl PlotData<'_> {
    pub fn count(&self) -> usize {
        self.frequencies.len()
    }
}

/// Fire-and-forget notifications from the sweep scheduler
pub trait SweepObserver {
    /// Measured share of the current revolution, 0..=1
    fn show_progress(&mut self, _fraction: f64) {}

    /// First frequency of the batch just requested, in Hz
    fn show_current_frequency(&mut self, _hz: f64) {}

    /// Smoothed input and output peak levels
    fn show_levels(&mut self, _input: f32, _output: f32) {}

    fn show_plot_data(&mut self, _plot: &PlotData<'_>) {}

    /// The excitation level being swept changed; `None` when both are disabled
    fn sweep_phase_changed(&mut self, _level: Option<Level>) {}
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SweepObserver for NullObserver {}
