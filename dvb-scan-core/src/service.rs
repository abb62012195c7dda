//! Service records and per-transponder scan state.

use crate::ident::ServiceRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub provider_name: String,
    pub ca_system_ids: Vec<u16>,
    pub new_found: bool,
    pub hold_name: bool,
    pub no_sdt: bool,
}

impl Service {
    pub fn is_scrambled(&self) -> bool {
        !self.ca_system_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmtEntry {
    pub pmt_pid: u16,
    pub service_type: u8,
    pub scrambled: bool,
}

bitflags::bitflags! {
    // bitflags 1.x already derives Debug/Clone/Copy/PartialEq/Eq for the
    // generated struct; only Default needs adding here.
    #[derive(Default)]
    pub struct ReadyFlags: u8 {
        const READY_PAT = 0b0000_0001;
        const READY_SDT = 0b0000_0010;
        const READY_NIT = 0b0000_0100;
        const READY_BAT = 0b0000_1000;
        const VALID_PAT = 0b0001_0000;
        const VALID_SDT = 0b0010_0000;
        const VALID_NIT = 0b0100_0000;
        const VALID_BAT = 0b1000_0000;
    }
}

/// Per-transponder scan bookkeeping: filter readiness, the sequential PMT
/// cursor, and the `clearToScanOnFirstNIT` bookkeeping.
#[derive(Debug, Default)]
pub struct ScanState {
    pub ready: ReadyFlags,
    pub ready_all: ReadyFlags,
    pub pmts_to_read: BTreeMap<u16, PmtEntry>,
    pub pmt_cursor: VecDeque<u16>,
    pub abort_current_pmt: bool,
    pub clear_to_scan_on_first_nit: bool,
}

impl ScanState {
    pub fn reset(&mut self, required: ReadyFlags, clear_to_scan_on_first_nit: bool) {
        self.ready = ReadyFlags::empty();
        self.ready_all = required;
        self.pmts_to_read.clear();
        self.pmt_cursor.clear();
        self.abort_current_pmt = false;
        self.clear_to_scan_on_first_nit = clear_to_scan_on_first_nit;
    }

    pub fn is_complete(&self) -> bool {
        self.ready.contains(self.ready_all) && self.pmt_cursor.is_empty() && self.pmts_to_read.is_empty()
    }

    pub fn queue_pmts(&mut self, entries: BTreeMap<u16, PmtEntry>) {
        self.pmt_cursor = entries.keys().copied().collect();
        self.pmts_to_read = entries;
    }

    pub fn next_pmt(&mut self) -> Option<(u16, PmtEntry)> {
        while let Some(program_number) = self.pmt_cursor.pop_front() {
            if let Some(entry) = self.pmts_to_read.get(&program_number).copied() {
                return Some((program_number, entry));
            }
        }
        None
    }

    pub fn remove_pmt(&mut self, program_number: u16) {
        self.pmts_to_read.remove(&program_number);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceKey(pub ServiceRef);
