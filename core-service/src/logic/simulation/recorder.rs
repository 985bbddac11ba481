//! Run log: one sealed `SimulationRun` per JSON line, size-rotated files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;

use super::types::SimulationRun;

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderStats {
    pub files: usize,
    pub size_bytes: u64,
    pub latest_file: Option<String>,
}

pub struct RunRecorder {
    file: Mutex<Option<File>>,
    base_dir: PathBuf,
    max_file_size: u64,
}

impl RunRecorder {
    pub fn new(base_dir: PathBuf) -> Self {
        Self::with_max_file_size(base_dir, MAX_FILE_SIZE)
    }

    pub fn with_max_file_size(base_dir: PathBuf, max_file_size: u64) -> Self {
        if let Err(e) = fs::create_dir_all(&base_dir) {
            log::warn!("Failed to create run log directory {}: {}", base_dir.display(), e);
        }

        Self {
            file: Mutex::new(None),
            base_dir,
            max_file_size,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Append one run, rotating to a new file once the current one is full.
    pub fn append(&self, run: &SimulationRun) -> io::Result<()> {
        let mut guard = self.file.lock();

        let reuse = match guard.as_ref() {
            Some(f) => f.metadata()?.len() < self.max_file_size,
            None => false,
        };

        if !reuse {
            let latest = if guard.is_none() { self.find_latest_log_file()? } else { None };
            let file = match latest {
                Some(path) if fs::metadata(&path)?.len() < self.max_file_size => {
                    OpenOptions::new().create(true).append(true).open(&path)?
                }
                _ => self.create_new_file()?,
            };
            *guard = Some(file);
        }

        if let Some(file) = guard.as_mut() {
            let json = serde_json::to_string(run)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }

    pub fn stats(&self) -> io::Result<RecorderStats> {
        let files = self.log_files()?;
        let mut size_bytes = 0u64;
        for path in &files {
            if let Ok(meta) = fs::metadata(path) {
                size_bytes += meta.len();
            }
        }

        Ok(RecorderStats {
            files: files.len(),
            size_bytes,
            latest_file: files
                .last()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(str::to_string),
        })
    }

    fn create_new_file(&self) -> io::Result<File> {
        // runs-YYYY-MM-DD-HHMMSS.mmm-NNN.jsonl; NNN only moves on collision
        let stamp = Utc::now().format("%Y-%m-%d-%H%M%S%.3f").to_string();
        let mut seq = 0u32;
        let mut path = self.base_dir.join(format!("runs-{}-{:03}.jsonl", stamp, seq));
        while path.exists() {
            seq += 1;
            path = self.base_dir.join(format!("runs-{}-{:03}.jsonl", stamp, seq));
        }

        log::debug!("Opening run log {}", path.display());
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn find_latest_log_file(&self) -> io::Result<Option<PathBuf>> {
        Ok(self.log_files()?.pop())
    }

    /// Sorted by name (timestamp order).
    fn log_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.base_dir)?
            .filter_map(|res| res.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "jsonl"))
            .collect::<Vec<_>>();
        entries.sort();
        Ok(entries)
    }
}
