//! Append-only text journals.
//!
//! Three line-oriented UTF-8 files under one directory:
//!
//! | File                 | Content                                 |
//! |----------------------|-----------------------------------------|
//! | `received_data.txt`  | hex of every valid frame, one per line  |
//! | `formatted_data.txt` | one labelled block per record           |
//! | `mac_data.txt`       | peer MAC lines (18-field sessions only) |
//!
//! Each append opens, writes and closes, so a crash never leaves a handle
//! dangling and a full disk only costs the line being written.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::app::ports::{JournalPort, StorageError};

pub const FRAME_JOURNAL: &str = "received_data.txt";
pub const RECORD_JOURNAL: &str = "formatted_data.txt";
pub const MAC_JOURNAL: &str = "mac_data.txt";

pub struct FileJournal {
    dir: PathBuf,
}

impl FileJournal {
    /// Create the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(map_io)?;
        Ok(Self { dir })
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn append(&self, file: &str, text: &str) -> Result<(), StorageError> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(file))
            .map_err(map_io)?;
        f.write_all(text.as_bytes()).map_err(map_io)?;
        debug!("JOURNAL: +{} bytes to {}", text.len(), file);
        Ok(())
    }
}

fn map_io(e: std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::IoError,
    }
}

impl JournalPort for FileJournal {
    fn append_frame(&mut self, hex_line: &str) -> Result<(), StorageError> {
        self.append(FRAME_JOURNAL, &format!("{}\n", hex_line))
    }

    fn append_record(&mut self, report: &str) -> Result<(), StorageError> {
        self.append(RECORD_JOURNAL, report)
    }

    fn append_peer_mac(&mut self, line: &str) -> Result<(), StorageError> {
        self.append(MAC_JOURNAL, line)
    }
}
