//! File-replay demux: feeds a captured transport-stream file through the PSI
//! section reassembler instead of talking to a kernel DVB API. This is the
//! only `Demux` implementation this crate ships; there is no physical
//! adapter driver here.

use dvb_scan_core::error::{Result, ScanError};
use dvb_scan_core::frontend::{Demux, FilterOutcome, SectionFilter};
use dvb_scan_core::psi::section::SectionCollector;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

const TS_PACKET_LEN: usize = 188;
const SYNC_BYTE: u8 = 0x47;

struct CapturedSection {
    table_id: u8,
    table_id_extension: u16,
    data: Vec<u8>,
}

/// A demux backed by every complete PSI section found in a capture file,
/// grouped by PID. Sections are reassembled once up front; `open_filter`
/// serves them back out of those per-PID pools, matching on table id and
/// (when the caller cares) table id extension.
pub struct TsCaptureDemux {
    sections_by_pid: HashMap<u16, Vec<CapturedSection>>,
}

impl TsCaptureDemux {
    /// Reads `path` as a raw MPEG transport stream and reassembles every PSI
    /// section it can find. Packets with a bad sync byte or a mid-stream
    /// resync are skipped; this mirrors how a live demux just drops garbage
    /// rather than failing the whole capture.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to read capture file");
            ScanError::NoDemux
        })?;
        let mut collectors: HashMap<u16, SectionCollector> = HashMap::new();
        let mut sections_by_pid: HashMap<u16, Vec<CapturedSection>> = HashMap::new();

        for packet in bytes.chunks_exact(TS_PACKET_LEN) {
            if packet[0] != SYNC_BYTE {
                continue;
            }
            let payload_unit_start = packet[1] & 0x40 != 0;
            let pid = (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16;
            let adaptation_field_control = (packet[3] >> 4) & 0x03;
            let continuity_counter = packet[3] & 0x0F;

            if pid == 0x1FFF || adaptation_field_control == 0 || adaptation_field_control == 2 {
                continue;
            }

            let payload_start = if adaptation_field_control == 3 {
                let adaptation_len = packet[4] as usize;
                5 + adaptation_len
            } else {
                4
            };
            if payload_start >= TS_PACKET_LEN {
                continue;
            }
            let payload = &packet[payload_start..];

            let collector = collectors.entry(pid).or_default();
            if collector.add_data(payload, continuity_counter, payload_unit_start) {
                if let Some(section) = collector.get_section() {
                    if let Ok(parsed) = dvb_scan_core::psi::section::PsiSection::parse(section) {
                        sections_by_pid.entry(pid).or_default().push(CapturedSection {
                            table_id: parsed.header.table_id,
                            table_id_extension: parsed.header.table_id_extension,
                            data: section.to_vec(),
                        });
                    }
                }
                collector.clear();
            }
        }

        Ok(TsCaptureDemux { sections_by_pid })
    }
}

struct ReplayFilter {
    pending: Option<Vec<u8>>,
}

impl SectionFilter for ReplayFilter {
    fn poll(&mut self, _elapsed: Duration) -> FilterOutcome {
        if self.pending.is_some() {
            FilterOutcome::Ready
        } else {
            FilterOutcome::TimedOut
        }
    }

    fn take_section(&mut self) -> Option<Vec<u8>> {
        self.pending.take()
    }
}

impl Demux for TsCaptureDemux {
    fn open_filter(&mut self, pid: u16, table_id: u8, table_id_extension: Option<u16>) -> Result<Box<dyn SectionFilter>> {
        let pending = self.sections_by_pid.get_mut(&pid).and_then(|sections| {
            let index = sections.iter().position(|s| {
                s.table_id == table_id && table_id_extension.map(|ext| ext == s.table_id_extension).unwrap_or(true)
            })?;
            Some(sections.remove(index).data)
        });
        Ok(Box::new(ReplayFilter { pending }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc_append(mut section: Vec<u8>) -> Vec<u8> {
        let crc = dvb_scan_core::psi::section::crc32_mpeg2(&section);
        section.extend_from_slice(&crc.to_be_bytes());
        section
    }

    fn make_ts_packet(pid: u16, payload_unit_start: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
        let mut packet = vec![0xFFu8; TS_PACKET_LEN];
        packet[0] = SYNC_BYTE;
        packet[1] = (if payload_unit_start { 0x40 } else { 0 }) | ((pid >> 8) as u8 & 0x1F);
        packet[2] = (pid & 0xFF) as u8;
        packet[3] = 0x10 | (cc & 0x0F);
        let mut body = vec![0u8]; // pointer field
        body.extend_from_slice(payload);
        body.resize(184, 0xFF);
        packet[4..].copy_from_slice(&body);
        packet
    }

    #[test]
    fn reassembles_single_packet_pat_from_capture_bytes() {
        // table_id=0x00 (PAT), section_length covers table_id_extension(2)+version(1)+
        // section_number(1)+last_section_number(1)+one program entry(4) = 9, plus CRC(4)=13
        let mut section = vec![0x00u8, 0x80, 0x09 + 4, 0x00, 0x01, 0x01, 0x00, 0x00];
        section.extend_from_slice(&[0x00, 0x01, 0xE0, 0x20]); // program 1 -> pid 0x0020
        let section = crc_append(section);

        let packet = make_ts_packet(0x0000, true, 0, &section);
        let dir = std::env::temp_dir().join(format!("dvb-scan-cli-test-{}.ts", std::process::id()));
        std::fs::write(&dir, &packet).unwrap();

        let mut demux = TsCaptureDemux::from_file(&dir).unwrap();
        std::fs::remove_file(&dir).ok();

        let mut filter = demux.open_filter(0x0000, 0x00, None).unwrap();
        assert_eq!(filter.poll(Duration::from_millis(0)), FilterOutcome::Ready);
        assert!(filter.take_section().is_some());
    }

    #[test]
    fn open_filter_on_empty_pid_times_out() {
        let mut demux = TsCaptureDemux { sections_by_pid: HashMap::new() };
        let mut filter = demux.open_filter(0x0010, 0x40, None).unwrap();
        assert_eq!(filter.poll(Duration::from_millis(0)), FilterOutcome::TimedOut);
    }
}
