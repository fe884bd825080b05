use std::fmt;
use std::fs;
use std::path::Path;

pub const PROGRESS_FILE_NAME: &str = "progress.txt";

/// Coarse pipeline checkpoint written next to the output model so external
/// watchers (web frontend, batch wrappers) can poll reconstruction status.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressStatus {
    Percent(u8),
    Failure(String),
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProgressStatus::Percent(value) => write!(f, "{value}"),
            ProgressStatus::Failure(message) => write!(f, "{message}"),
        }
    }
}

/// Best-effort write; a reconstruction run must never abort because the
/// progress file could not be updated.
pub fn save_progress(output_folder: &Path, status: &ProgressStatus) {
    let path = output_folder.join(PROGRESS_FILE_NAME);
    if let Err(e) = fs::write(&path, format!("{status}\n")) {
        eprintln!("Could not write progress file '{}': {e}", path.display());
    }
}
