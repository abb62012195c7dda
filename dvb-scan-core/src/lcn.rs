//! Logical channel number side file: a flat, fixed-width ASCII index kept
//! alongside the database because it is cheap to grep and diff by hand.
//!
//! Record format (exactly 39 bytes, including the trailing newline):
//! `%08x:%04x:%04x:%04x:%05d:%08d\n` for
//! (namespace, onid, tsid, sid, lcn, signal). Records are keyed by their
//! first 23 bytes (`namespace:onid:tsid:sid`); a write with a matching key
//! overwrites that record in place rather than appending a duplicate.

use crate::error::{Result, ScanError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const RECORD_LEN: usize = 39;
pub const KEY_LEN: usize = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcnRecord {
    pub namespace: u32,
    pub original_network_id: u16,
    pub transport_stream_id: u16,
    pub service_id: u16,
    pub lcn: u16,
    pub signal: u32,
}

impl LcnRecord {
    pub fn format(&self) -> String {
        format!(
            "{:08x}:{:04x}:{:04x}:{:04x}:{:05}:{:08}\n",
            self.namespace, self.original_network_id, self.transport_stream_id, self.service_id, self.lcn, self.signal
        )
    }

    pub fn key(&self) -> String {
        format!(
            "{:08x}:{:04x}:{:04x}:{:04x}",
            self.namespace, self.original_network_id, self.transport_stream_id, self.service_id
        )
    }
}

pub struct LcnWriter {
    file: File,
}

impl LcnWriter {
    /// Opens (creating if necessary) the LCN file for read-modify-write
    /// access. If the existing file's length is not a multiple of
    /// `RECORD_LEN`, it is treated as corrupt from an interrupted write:
    /// truncated to the last full record, with a warning, rather than
    /// rejecting the scan outright.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ScanError::Lcn(e.to_string()))?;

        let len = file.metadata().map_err(|e| ScanError::Lcn(e.to_string()))?.len() as usize;
        let remainder = len % RECORD_LEN;
        if remainder != 0 {
            tracing::warn!(
                trailing_bytes = remainder,
                "LCN file length is not a multiple of the record size; truncating partial trailing record"
            );
            file.set_len((len - remainder) as u64).map_err(|e| ScanError::Lcn(e.to_string()))?;
        }

        Ok(LcnWriter { file })
    }

    /// Truncates the file to empty, used when `start` is called with
    /// `scanRemoveServices` set.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0).map_err(|e| ScanError::Lcn(e.to_string()))?;
        self.file.seek(SeekFrom::Start(0)).map_err(|e| ScanError::Lcn(e.to_string()))?;
        Ok(())
    }

    /// Writes a record, overwriting in place if a record with the same key
    /// already exists, appending otherwise.
    pub fn write_record(&mut self, record: &LcnRecord) -> Result<()> {
        let formatted = record.format();
        debug_assert_eq!(formatted.len(), RECORD_LEN);
        let key = record.key();

        let mut buf = Vec::new();
        self.file.seek(SeekFrom::Start(0)).map_err(|e| ScanError::Lcn(e.to_string()))?;
        self.file.read_to_end(&mut buf).map_err(|e| ScanError::Lcn(e.to_string()))?;

        let mut offset = 0;
        while offset + RECORD_LEN <= buf.len() {
            if buf[offset..offset + KEY_LEN] == *key.as_bytes() {
                self.file.seek(SeekFrom::Start(offset as u64)).map_err(|e| ScanError::Lcn(e.to_string()))?;
                self.file.write_all(formatted.as_bytes()).map_err(|e| ScanError::Lcn(e.to_string()))?;
                return Ok(());
            }
            offset += RECORD_LEN;
        }

        self.file.seek(SeekFrom::End(0)).map_err(|e| ScanError::Lcn(e.to_string()))?;
        self.file.write_all(formatted.as_bytes()).map_err(|e| ScanError::Lcn(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn record(sid: u16, lcn: u16) -> LcnRecord {
        LcnRecord {
            namespace: 0xEEEE0000,
            original_network_id: 0x0001,
            transport_stream_id: 0x0002,
            service_id: sid,
            lcn,
            signal: 50,
        }
    }

    #[test]
    fn record_is_exactly_39_bytes() {
        assert_eq!(record(1, 1).format().len(), RECORD_LEN);
    }

    #[test]
    fn key_is_exactly_23_bytes() {
        assert_eq!(record(1, 1).key().len(), KEY_LEN);
    }

    #[test]
    fn write_then_overwrite_in_place() {
        let dir = std::env::temp_dir().join(format!("lcn-test-{:?}", std::time::Duration::from_nanos(1)));
        let _ = std::fs::remove_file(&dir);
        let mut writer = LcnWriter::open(&dir).unwrap();

        writer.write_record(&record(1, 5)).unwrap();
        writer.write_record(&record(2, 6)).unwrap();
        writer.write_record(&record(1, 99)).unwrap();

        let mut contents = String::new();
        File::open(&dir).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.len(), RECORD_LEN * 2);
        assert!(contents.contains(":00099:"));
        assert!(!contents.contains(":00005:"));

        std::fs::remove_file(&dir).ok();
    }
}
