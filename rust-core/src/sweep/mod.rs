//! Frequency sweep: position table, scheduling, result curves and export

pub mod curve;
pub mod export;
pub mod observer;
pub mod progress;
pub mod scheduler;
pub mod table;

pub use curve::ResponseCurve;
pub use export::{export_profile, ExportError};
pub use observer::{NullObserver, PlotData, SweepObserver};
pub use progress::ProgressSet;
pub use scheduler::{next_level, SweepScheduler};
pub use table::{nth_bin_position, FrequencyTable};
