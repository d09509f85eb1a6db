//! Sequential log reader used for replay on open
//!
//! Any checksum failure or truncated tail aborts the replay.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::record::{LogRecord, MIN_RECORD_SIZE};
use crate::store::errors::{StoreError, StoreResult};

/// Reads log records front to back.
pub struct LogReader {
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl LogReader {
    /// Opens the log at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = File::open(path).map_err(|e| {
            StoreError::Io(format!("Failed to open store log {}: {}", path.display(), e))
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| StoreError::Io(format!("Failed to read log metadata: {}", e)))?
            .len();

        Ok(Self {
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    /// Byte offset of the next record.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Reads the next record, `Ok(None)` at end of log.
    pub fn read_next(&mut self) -> StoreResult<Option<LogRecord>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let offset = self.current_offset;
        let remaining = self.file_size - offset;
        if remaining < MIN_RECORD_SIZE as u64 {
            return Err(corruption_at(offset, format!(
                "Truncated log: {} bytes remaining, minimum record size is {}",
                remaining, MIN_RECORD_SIZE
            )));
        }

        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(|e| corruption_at(offset, format!("Failed to read record length: {}", e)))?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < MIN_RECORD_SIZE as u64 || record_length > remaining {
            return Err(corruption_at(offset, format!(
                "Invalid record length {} with {} bytes remaining",
                record_length, remaining
            )));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[0..4].copy_from_slice(&len_buf);
        self.reader
            .read_exact(&mut record_buf[4..])
            .map_err(|e| corruption_at(offset, format!("Failed to read record body: {}", e)))?;

        let (record, consumed) =
            LogRecord::deserialize(&record_buf).map_err(|e| corruption_at(offset, e.to_string()))?;
        self.current_offset += consumed as u64;

        Ok(Some(record))
    }
}

fn corruption_at(offset: u64, reason: String) -> StoreError {
    StoreError::Corruption(format!("byte_offset {}: {}", offset, reason))
}
