//! Profile export
//!
//! A profile is a directory holding one `<level>.dat` file per measured
//! excitation level. Each line is `frequency magnitude phase`: frequency in
//! Hz, linear magnitude ratio, phase in radians, in ascending sweep order.

use super::curve::ResponseCurve;
use crate::level::Level;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Could not write profile data to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write one curve as text lines
pub fn write_curve<W: Write>(
    writer: &mut W,
    frequencies: &[f64],
    curve: &ResponseCurve,
) -> io::Result<()> {
    for (&freq, response) in frequencies.iter().zip(curve.responses()) {
        writeln!(
            writer,
            "{:.10e} {:.10e} {:.10e}",
            freq,
            response.norm() as f64,
            response.arg() as f64
        )?;
    }
    writer.flush()
}

/// Write a profile directory
///
/// # Arguments
/// * `dir` - Profile directory, created if missing
/// * `frequencies` - Frequency of each sweep position in Hz
/// * `curves` - Curves to write, one file each
///
/// # Returns
/// Paths of the written files
pub fn export_profile(
    dir: &Path,
    frequencies: &[f64],
    curves: &[(Level, &ResponseCurve)],
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(ExportError::io(dir))?;

    let mut written = Vec::with_capacity(curves.len());
    for &(level, curve) in curves {
        let path = dir.join(format!("{}.dat", level.name()));
        let file = File::create(&path).map_err(ExportError::io(&path))?;
        let mut writer = BufWriter::new(file);
        write_curve(&mut writer, frequencies, curve).map_err(ExportError::io(&path))?;

        log::info!("Saved {} profile to {}", level.name(), path.display());
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SWEEP_LENGTH;
    use crate::sweep::table::FrequencyTable;
    use num_complex::Complex32;

    fn parse_line(line: &str) -> (f64, f64, f64) {
        let values: Vec<f64> = line
            .split(' ')
            .map(|v| v.parse().expect("numeric column"))
            .collect();
        assert_eq!(values.len(), 3);
        (values[0], values[1], values[2])
    }

    #[test]
    fn test_write_curve_lines() {
        let table = FrequencyTable::new();
        let mut curve = ResponseCurve::new();
        curve.record(0, Complex32::new(0.0, -2.0));
        curve.record(1, Complex32::new(0.5, 0.0));

        let mut out = Vec::new();
        write_curve(&mut out, table.as_slice(), &curve).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), SWEEP_LENGTH);

        let (freq, mag, phase) = parse_line(lines[0]);
        assert!((freq - 10.0).abs() < 1e-6);
        assert!((mag - 2.0).abs() < 1e-6);
        assert!((phase + std::f64::consts::FRAC_PI_2).abs() < 1e-6);

        let (freq, mag, phase) = parse_line(lines[1]);
        assert!(freq > 10.0);
        assert!((mag - 0.5).abs() < 1e-6);
        assert_eq!(phase, 0.0);

        // Ascending frequency order
        let freqs: Vec<f64> = lines.iter().map(|l| parse_line(l).0).collect();
        assert!(freqs.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_export_profile_writes_one_file_per_curve() {
        let dir = std::env::temp_dir().join(format!("profile-export-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let table = FrequencyTable::new();
        let lo = ResponseCurve::new();
        let hi = ResponseCurve::new();
        let written = export_profile(
            &dir.join("nested"),
            table.as_slice(),
            &[(Level::Lo, &lo), (Level::Hi, &hi)],
        )
        .unwrap();

        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("lo.dat"));
        assert!(written[1].ends_with("hi.dat"));
        let text = fs::read_to_string(&written[1]).unwrap();
        assert_eq!(text.lines().count(), SWEEP_LENGTH);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_export_reports_unwritable_directory() {
        let blocker = std::env::temp_dir().join(format!("profile-blocker-{}", std::process::id()));
        fs::write(&blocker, b"not a directory").unwrap();

        let table = FrequencyTable::new();
        let curve = ResponseCurve::new();
        let err = export_profile(&blocker, table.as_slice(), &[(Level::Lo, &curve)]).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));

        fs::remove_file(&blocker).unwrap();
    }
}
