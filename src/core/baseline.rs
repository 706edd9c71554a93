//! The persisted reference rates and their one-line file format.
//!
//! The file holds a single line `"<upload>,<download>"` in bytes/sec, with no
//! units and no trailing newline. Absence of the file means "not calibrated".

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;

/// Average upload/download rate recorded at calibration time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaselineRecord {
    pub upload_bytes_per_sec: f64,
    pub download_bytes_per_sec: f64,
}

/// Render a record in the on-disk format.
pub fn serialize_baseline(record: &BaselineRecord) -> String {
    // `Display` for f64 is the shortest representation that parses back exactly.
    format!(
        "{},{}",
        record.upload_bytes_per_sec, record.download_bytes_per_sec
    )
}

/// Parse the on-disk format. Only the first line is considered.
///
/// Anything other than exactly two finite, non-negative floats separated by a
/// comma is rejected; the error string says what was wrong.
pub fn parse_baseline(text: &str) -> Result<BaselineRecord, String> {
    let line = text.lines().next().unwrap_or("");
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 2 {
        return Err(format!("expected 2 comma-separated fields, found {}", fields.len()));
    }
    let upload = parse_rate("upload", fields[0])?;
    let download = parse_rate("download", fields[1])?;
    Ok(BaselineRecord {
        upload_bytes_per_sec: upload,
        download_bytes_per_sec: download,
    })
}

fn parse_rate(name: &str, field: &str) -> Result<f64, String> {
    let value: f64 = field
        .parse()
        .map_err(|_| format!("{name} rate {field:?} is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{name} rate {field:?} is not a finite non-negative number"));
    }
    Ok(value)
}

/// File-backed storage for a single [`BaselineRecord`].
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and parse the persisted baseline.
    pub fn load(&self) -> Result<BaselineRecord, AppError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::MissingBaseline {
                    path: self.path.clone(),
                })
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(AppError::CorruptBaseline {
                    path: self.path.clone(),
                    reason: "file is not valid UTF-8".to_string(),
                })
            }
            Err(e) => {
                return Err(AppError::io(
                    format!("reading baseline {}", self.path.display()),
                    e,
                ))
            }
        };
        parse_baseline(&text).map_err(|reason| AppError::CorruptBaseline {
            path: self.path.clone(),
            reason,
        })
    }

    /// Write the baseline, creating parent directories as needed.
    pub fn save(&self, record: &BaselineRecord) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::io(format!("creating directory {}", parent.display()), e)
            })?;
        }
        fs::write(&self.path, serialize_baseline(record))
            .map_err(|e| AppError::io(format!("writing baseline {}", self.path.display()), e))?;
        tracing::info!("Baseline saved to {}", self.path.display());
        Ok(())
    }

    /// Delete the baseline. Returns whether a file was actually removed.
    pub fn remove(&self) -> Result<bool, AppError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Baseline removed from {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::io(
                format!("removing baseline {}", self.path.display()),
                e,
            )),
        }
    }
}
