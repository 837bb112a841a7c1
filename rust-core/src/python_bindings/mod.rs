//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod profiler_bindings;

/// Python module definition
#[pymodule]
fn spectral_profiler(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<profiler_bindings::PyProfiler>()?;
    m.add_class::<profiler_bindings::PyAudioDeviceInfo>()?;
    Ok(())
}
