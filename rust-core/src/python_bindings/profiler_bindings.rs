//! Python bindings for the sweep profiler

use crate::audio::host::{list_input_devices, list_output_devices, AudioDeviceInfo, AudioHost};
use crate::audio::TransferEngine;
use crate::config::{EngineConfig, SweepConfig};
use crate::constants::DEFAULT_GLOBAL_GAIN;
use crate::level::Level;
use crate::sweep::{PlotData, SweepObserver, SweepScheduler};
use numpy::PyArray1;
use pyo3::exceptions::{PyIOError, PyRuntimeError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Audio device information exposed to Python
#[pyclass(name = "AudioDeviceInfo")]
#[derive(Clone)]
pub struct PyAudioDeviceInfo {
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub sample_rate: u32,
    #[pyo3(get)]
    pub channels: u16,
}

impl From<&AudioDeviceInfo> for PyAudioDeviceInfo {
    fn from(info: &AudioDeviceInfo) -> Self {
        Self {
            name: info.name.clone(),
            sample_rate: info.sample_rate,
            channels: info.channels,
        }
    }
}

/// Latest scheduler notifications, read back by `poll`
#[derive(Debug, Default)]
struct Snapshot {
    progress: f64,
    current_frequency: f64,
    input_level: f32,
    output_level: f32,
    phase: Option<Level>,
    plot: Option<PlotSnapshot>,
}

#[derive(Debug)]
struct PlotSnapshot {
    frequencies: Vec<f64>,
    mark_frequency: f64,
    lo_db: Vec<f64>,
    lo_phase: Vec<f64>,
    hi_db: Vec<f64>,
    hi_phase: Vec<f64>,
}

struct SnapshotObserver(Arc<Mutex<Snapshot>>);

impl SweepObserver for SnapshotObserver {
    fn show_progress(&mut self, fraction: f64) {
        if let Ok(mut snapshot) = self.0.lock() {
            snapshot.progress = fraction;
        }
    }

    fn show_current_frequency(&mut self, hz: f64) {
        if let Ok(mut snapshot) = self.0.lock() {
            snapshot.current_frequency = hz;
        }
    }

    fn show_levels(&mut self, input: f32, output: f32) {
        if let Ok(mut snapshot) = self.0.lock() {
            snapshot.input_level = input;
            snapshot.output_level = output;
        }
    }

    fn show_plot_data(&mut self, plot: &PlotData<'_>) {
        if let Ok(mut snapshot) = self.0.lock() {
            snapshot.plot = Some(PlotSnapshot {
                frequencies: plot.frequencies.to_vec(),
                mark_frequency: plot.mark_frequency,
                lo_db: plot.lo.magnitudes_db().to_vec(),
                lo_phase: plot.lo.phases().to_vec(),
                hi_db: plot.hi.magnitudes_db().to_vec(),
                hi_phase: plot.hi.phases().to_vec(),
            });
        }
    }

    fn sweep_phase_changed(&mut self, level: Option<Level>) {
        if let Ok(mut snapshot) = self.0.lock() {
            snapshot.phase = level;
        }
    }
}

fn runtime_error(e: impl std::fmt::Display) -> PyErr {
    PyErr::new::<PyRuntimeError, _>(e.to_string())
}

/// Frequency response profiler driving the default audio devices
#[pyclass(name = "Profiler", unsendable)]
pub struct PyProfiler {
    host: Option<AudioHost>,
    scheduler: Option<SweepScheduler>,
    snapshot: Arc<Mutex<Snapshot>>,
    sweep: SweepConfig,
    global_gain: f32,
}

#[pymethods]
impl PyProfiler {
    /// Create a profiler; nothing is opened until `start`
    #[new]
    #[pyo3(signature = (bins_at_once=1, lo_enabled=true, hi_enabled=true, global_gain=DEFAULT_GLOBAL_GAIN))]
    fn new(bins_at_once: usize, lo_enabled: bool, hi_enabled: bool, global_gain: f32) -> Self {
        Self {
            host: None,
            scheduler: None,
            snapshot: Arc::new(Mutex::new(Snapshot::default())),
            sweep: SweepConfig {
                bins_at_once,
                lo_enabled,
                hi_enabled,
                ..SweepConfig::default()
            },
            global_gain,
        }
    }

    /// Open the default devices and start the engine
    ///
    /// Returns:
    ///     Tuple of (input device, output device)
    fn start(&mut self) -> PyResult<(PyAudioDeviceInfo, PyAudioDeviceInfo)> {
        self.stop();

        let mut host = AudioHost::open_default().map_err(runtime_error)?;
        let config = EngineConfig {
            global_gain: self.global_gain,
            ..EngineConfig::with_sample_rate(host.sample_rate())
        };
        let (engine, handle) = TransferEngine::new(&config).map_err(runtime_error)?;

        let observer = Box::new(SnapshotObserver(Arc::clone(&self.snapshot)));
        let scheduler = SweepScheduler::new(handle, &self.sweep, observer);
        if let Ok(mut snapshot) = self.snapshot.lock() {
            *snapshot = Snapshot {
                phase: scheduler.phase(),
                ..Snapshot::default()
            };
        }

        host.start(engine).map_err(runtime_error)?;

        let devices = (host.input_info().into(), host.output_info().into());
        self.host = Some(host);
        self.scheduler = Some(scheduler);
        Ok(devices)
    }

    /// Stop the sweep and close the devices
    fn stop(&mut self) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            // The streams go away right after, a lost stop command is harmless
            let _ = scheduler.set_sweep_active(false);
        }
        if let Some(host) = self.host.as_mut() {
            host.stop();
        }
        self.host = None;
        self.scheduler = None;
    }

    /// Pause both audio streams; the engine keeps its state
    fn pause(&self) -> PyResult<()> {
        match self.host.as_ref() {
            Some(host) => host.pause().map_err(runtime_error),
            None => Ok(()),
        }
    }

    /// Resume streams paused with `pause`
    fn resume(&self) -> PyResult<()> {
        match self.host.as_ref() {
            Some(host) => host.resume().map_err(runtime_error),
            None => Ok(()),
        }
    }

    fn set_sweep_active(&mut self, active: bool) -> PyResult<()> {
        self.running()?.set_sweep_active(active).map_err(runtime_error)
    }

    /// Choose which excitation levels are measured
    fn set_sweep_enabled(&mut self, lo: bool, hi: bool) -> PyResult<()> {
        self.sweep.lo_enabled = lo;
        self.sweep.hi_enabled = hi;
        match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.set_levels_enabled(lo, hi).map_err(runtime_error),
            None => Ok(()),
        }
    }

    fn set_bins_at_once(&mut self, count: usize) {
        self.sweep.bins_at_once = count;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_bins_at_once(count);
        }
    }

    fn set_global_gain(&mut self, gain: f32) {
        self.global_gain = gain;
        if let Some(scheduler) = self.scheduler.as_ref() {
            scheduler.set_global_gain(gain);
        }
    }

    /// Advance the sweep; call periodically (about every 50 ms)
    ///
    /// Returns:
    ///     Dictionary with keys: 'results', 'progress', 'current_frequency',
    ///     'input_level', 'output_level', 'phase' and, once anything has
    ///     been measured, 'frequencies', 'mark_frequency', 'lo_db',
    ///     'lo_phase', 'hi_db', 'hi_phase'
    fn poll<'py>(&mut self, py: Python<'py>) -> PyResult<PyObject> {
        let results = self.running()?.poll().map_err(runtime_error)?;

        let dict = PyDict::new(py);
        dict.set_item("results", results)?;

        let snapshot = self
            .snapshot
            .lock()
            .map_err(|_| runtime_error("profiler state poisoned"))?;
        dict.set_item("progress", snapshot.progress)?;
        dict.set_item("current_frequency", snapshot.current_frequency)?;
        dict.set_item("input_level", snapshot.input_level)?;
        dict.set_item("output_level", snapshot.output_level)?;
        dict.set_item("phase", snapshot.phase.map(Level::name))?;

        if let Some(plot) = &snapshot.plot {
            dict.set_item("frequencies", PyArray1::from_slice(py, &plot.frequencies))?;
            dict.set_item("mark_frequency", plot.mark_frequency)?;
            dict.set_item("lo_db", PyArray1::from_slice(py, &plot.lo_db))?;
            dict.set_item("lo_phase", PyArray1::from_slice(py, &plot.lo_phase))?;
            dict.set_item("hi_db", PyArray1::from_slice(py, &plot.hi_db))?;
            dict.set_item("hi_phase", PyArray1::from_slice(py, &plot.hi_phase))?;
        }

        Ok(dict.into())
    }

    /// Write lo.dat / hi.dat for the enabled levels into `directory`
    ///
    /// Returns:
    ///     Paths of the written files
    fn save_profile(&self, directory: &str) -> PyResult<Vec<String>> {
        let scheduler = self
            .scheduler
            .as_ref()
            .ok_or_else(|| runtime_error("profiler is not running"))?;
        let written = scheduler
            .export_profile(Path::new(directory))
            .map_err(|e| PyErr::new::<PyIOError, _>(e.to_string()))?;
        Ok(written
            .iter()
            .map(|path| path.display().to_string())
            .collect())
    }

    /// Analysis block length, or None before `start`
    fn fft_size(&self) -> Option<usize> {
        self.scheduler
            .as_ref()
            .map(|scheduler| scheduler.engine().fft_size())
    }

    fn is_running(&self) -> bool {
        self.host.as_ref().map_or(false, AudioHost::is_running)
    }

    #[staticmethod]
    fn list_input_devices() -> PyResult<Vec<PyAudioDeviceInfo>> {
        let devices = list_input_devices().map_err(runtime_error)?;
        Ok(devices.iter().map(PyAudioDeviceInfo::from).collect())
    }

    #[staticmethod]
    fn list_output_devices() -> PyResult<Vec<PyAudioDeviceInfo>> {
        let devices = list_output_devices().map_err(runtime_error)?;
        Ok(devices.iter().map(PyAudioDeviceInfo::from).collect())
    }
}

impl PyProfiler {
    fn running(&mut self) -> PyResult<&mut SweepScheduler> {
        self.scheduler
            .as_mut()
            .ok_or_else(|| runtime_error("profiler is not running"))
    }
}
