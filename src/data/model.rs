use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::MonthMatch;

// ---------------------------------------------------------------------------
// Partition – one physical source file holding one month of data
// ---------------------------------------------------------------------------

/// A monthly partition file, e.g. `fhvhv_tripdata_2024-01.parquet`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition {
    pub path: PathBuf,
    /// `YYYY-MM`.
    pub month_key: String,
}

impl Partition {
    pub fn new(path: impl Into<PathBuf>, month_key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            month_key: month_key.into(),
        }
    }

    /// Recognise `<prefix>_<YYYY>-<MM>.<extension>` and extract the month key.
    pub fn from_path(path: &Path, prefix: &str, extension: &str) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if !ext.eq_ignore_ascii_case(extension) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let month = stem.strip_prefix(prefix)?.strip_prefix('_')?;
        if !is_month_key(month) {
            return None;
        }
        Some(Self::new(path, month))
    }

    /// File name for log messages.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Whether a caller-supplied month token selects this partition.
    pub fn matches(&self, token: &str, mode: MonthMatch) -> bool {
        match mode {
            MonthMatch::Substring => {
                self.month_key.contains(token) || self.file_name().contains(token)
            }
            MonthMatch::Exact => self.month_key == token,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.file_name(), self.month_key)
    }
}

/// `YYYY-MM` with a month in 01..=12.
pub fn is_month_key(s: &str) -> bool {
    let Some((year, month)) = s.split_once('-') else {
        return false;
    };
    if year.len() != 4 || month.len() != 2 {
        return false;
    }
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    matches!(month.parse::<u8>(), Ok(1..=12))
}
