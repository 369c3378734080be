use std::{
    fs,
    path::{Path, PathBuf},
};

use api_types::export::ExportFormat;
use chrono::NaiveDate;

use crate::error::Result;

/// Persists downloaded bytes under a suggested file name.
pub trait FileSink: Send + Sync {
    fn persist(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes files into a single directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSink for DirectorySink {
    fn persist(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        // Names come from the backend path or our own pattern; keep only the
        // last component so nothing escapes the export directory.
        let name = Path::new(file_name)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "download.bin".into());
        let path = self.dir.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// `receipts_YYYYMMDD.<ext>`
pub fn export_file_name(today: NaiveDate, format: ExportFormat) -> String {
    format!("receipts_{}.{}", today.format("%Y%m%d"), format.extension())
}

/// `receipt_<id>.pdf`
pub fn receipt_file_name(receipt_id: i64) -> String {
    format!("receipt_{receipt_id}.pdf")
}
