//! Section filter orchestrator: the explicit per-transponder state machine
//! that starts PAT/SDT/NIT/BAT/PMT filters in the required order and
//! reports when a transponder is done.
//!
//! This is deliberately an explicit state machine (`OrchestratorState` plus
//! a single `advance` entry point) rather than the reentrant
//! feed-bytes-then-poll-a-bitset pattern: the bitset (`ScanState::ready`) is
//! kept only as bookkeeping inside `Filtering`, not as what drives
//! transitions.

use crate::frontend::{Demux, FilterOutcome, SectionFilter, FILTER_TIMEOUT};
use crate::psi::pat::PatTable;
use crate::psi::sdt::SdtTable;
use crate::service::{PmtEntry, ReadyFlags, ScanState};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Cable transponders whose SDT's TSID diverges from the PAT-derived one;
/// force SDT to start with "any TSID" on these. Values are (tsid, center
/// frequency Hz, tolerance Hz).
const KABELBW_WORKAROUNDS: [(u16, u32, u32); 2] = [(0x00d7, 618_000_000, 2_000_000), (0x00d8, 626_000_000, 2_000_000)];

pub fn needs_kabelbw_any_tsid_workaround(tsid: u16, frequency_hz: u32) -> bool {
    KABELBW_WORKAROUNDS
        .iter()
        .any(|&(wa_tsid, wa_freq, tol)| tsid == wa_tsid && (frequency_hz as i64 - wa_freq as i64).unsigned_abs() < tol as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Pat,
    Sdt,
    Nit,
    Bat,
    Pmt(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Tuning,
    Locked,
    Filtering,
    Done,
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanFlags {
    pub use_pat: bool,
    pub scan_network_search: bool,
    pub scan_search_bat: bool,
    pub scan_only_free: bool,
    pub clear_to_scan_on_first_nit: bool,
}

impl Default for ScanFlags {
    fn default() -> Self {
        ScanFlags {
            use_pat: true,
            scan_network_search: true,
            scan_search_bat: false,
            scan_only_free: false,
            clear_to_scan_on_first_nit: false,
        }
    }
}

#[derive(Debug)]
pub enum OrchestratorEvent {
    FilterReady(FilterKind, Vec<u8>),
    FilterTimedOut(FilterKind),
    TransponderDone,
}

struct ActiveFilter {
    filter: Box<dyn SectionFilter>,
    started_at: Duration,
}

pub struct Orchestrator {
    pub state: OrchestratorState,
    pub scan_state: ScanState,
    flags: ScanFlags,
    active: HashMap<FilterKind, ActiveFilter>,
}

impl Orchestrator {
    pub fn new(flags: ScanFlags) -> Self {
        Orchestrator {
            state: OrchestratorState::Idle,
            scan_state: ScanState::default(),
            flags,
            active: HashMap::new(),
        }
    }

    fn required_flags(&self) -> ReadyFlags {
        let mut required = ReadyFlags::READY_SDT;
        if self.flags.use_pat {
            required |= ReadyFlags::READY_PAT;
        }
        if self.flags.scan_network_search {
            required |= ReadyFlags::READY_NIT;
        }
        if self.flags.scan_search_bat {
            required |= ReadyFlags::READY_BAT;
        }
        required
    }

    /// Transitions Idle -> Tuning.
    pub fn begin_tuning(&mut self) {
        self.state = OrchestratorState::Tuning;
        self.scan_state.reset(self.required_flags(), self.flags.clear_to_scan_on_first_nit);
        self.active.clear();
    }

    /// Frontend reported lock; Tuning -> Locked -> Filtering, starting the
    /// filters that don't depend on PAT.
    pub fn on_locked(&mut self, demux: &mut dyn Demux, now: Duration) {
        self.state = OrchestratorState::Locked;
        self.state = OrchestratorState::Filtering;

        if self.flags.use_pat {
            self.start_filter(demux, FilterKind::Pat, 0x0000, 0x00, None, now);
        } else {
            self.start_filter(demux, FilterKind::Sdt, crate::psi::pid::SDT_BAT, 0x42, None, now);
        }
        if self.flags.scan_network_search {
            self.start_filter(demux, FilterKind::Nit, crate::psi::pid::NIT, 0x40, None, now);
        }
        if self.flags.scan_search_bat {
            self.start_filter(demux, FilterKind::Bat, crate::psi::pid::SDT_BAT, 0x4A, None, now);
        }
    }

    /// Frontend reported failure; Tuning -> Unavailable.
    pub fn on_tune_failed(&mut self) {
        self.state = OrchestratorState::Unavailable;
        self.active.clear();
    }

    fn start_filter(
        &mut self,
        demux: &mut dyn Demux,
        kind: FilterKind,
        pid: u16,
        table_id: u8,
        table_id_extension: Option<u16>,
        now: Duration,
    ) {
        if let Ok(filter) = demux.open_filter(pid, table_id, table_id_extension) {
            self.active.insert(kind, ActiveFilter { filter, started_at: now });
        }
    }

    /// Starts SDT after PAT completes, applying the KabelBW any-TSID
    /// workaround and arming the sequential PMT cursor from PAT's program
    /// list.
    pub fn on_pat_ready(&mut self, demux: &mut dyn Demux, pat: &PatTable, current_frequency_hz: u32, now: Duration) {
        self.scan_state.ready.insert(ReadyFlags::READY_PAT | ReadyFlags::VALID_PAT);

        let force_any_tsid = needs_kabelbw_any_tsid_workaround(pat.transport_stream_id, current_frequency_hz);
        let table_id_extension = if force_any_tsid { None } else { Some(pat.transport_stream_id) };
        self.start_filter(demux, FilterKind::Sdt, crate::psi::pid::SDT_BAT, 0x42, table_id_extension, now);

        let entries: BTreeMap<u16, PmtEntry> = pat
            .programs
            .iter()
            .map(|p| {
                (
                    p.program_number,
                    PmtEntry { pmt_pid: p.pid, service_type: 0, scrambled: false },
                )
            })
            .collect();
        self.scan_state.queue_pmts(entries);
        self.advance_pmt(demux, now);
    }

    pub fn on_pat_timed_out(&mut self, demux: &mut dyn Demux, now: Duration) {
        self.scan_state.ready.insert(ReadyFlags::READY_PAT);
        self.start_filter(demux, FilterKind::Sdt, crate::psi::pid::SDT_BAT, 0x42, None, now);
    }

    /// Starts the next outstanding PMT filter, if any; a program whose PMT
    /// is aborted by `abort_current_pmt` (set by the SDT processor) is
    /// treated as timed out and removed without starting a new filter for
    /// it.
    fn advance_pmt(&mut self, demux: &mut dyn Demux, now: Duration) {
        if self.active.keys().any(|k| matches!(k, FilterKind::Pmt(_))) {
            return;
        }
        while let Some((program_number, entry)) = self.scan_state.next_pmt() {
            if self.scan_state.abort_current_pmt {
                self.scan_state.abort_current_pmt = false;
                self.scan_state.remove_pmt(program_number);
                continue;
            }
            self.start_filter(demux, FilterKind::Pmt(program_number), entry.pmt_pid, 0x02, Some(program_number), now);
            return;
        }
    }

    pub fn on_sdt_ready(&mut self, valid: bool) {
        self.scan_state.ready.insert(ReadyFlags::READY_SDT);
        if valid {
            self.scan_state.ready.insert(ReadyFlags::VALID_SDT);
        }
    }

    /// Returns whether the to-scan queue should be snapshotted before NIT
    /// processing, per `clearToScanOnFirstNIT`.
    pub fn should_snapshot_before_nit(&self) -> bool {
        self.scan_state.clear_to_scan_on_first_nit
    }

    pub fn on_nit_ready(&mut self, valid: bool) {
        self.scan_state.ready.insert(ReadyFlags::READY_NIT);
        if valid {
            self.scan_state.ready.insert(ReadyFlags::VALID_NIT);
        }
    }

    pub fn on_bat_ready(&mut self, valid: bool) {
        self.scan_state.ready.insert(ReadyFlags::READY_BAT);
        if valid {
            self.scan_state.ready.insert(ReadyFlags::VALID_BAT);
        }
    }

    pub fn on_pmt_complete(&mut self, demux: &mut dyn Demux, program_number: u16, now: Duration) {
        self.scan_state.remove_pmt(program_number);
        self.active.remove(&FilterKind::Pmt(program_number));
        self.advance_pmt(demux, now);
    }

    /// Polls every active filter; returns the events produced this tick.
    /// `Filtering` transitions to `Done` once all required bits are set and
    /// no PMT remains outstanding.
    pub fn poll(&mut self, now: Duration) -> Vec<OrchestratorEvent> {
        let mut events = Vec::new();
        let mut to_remove = Vec::new();

        for (kind, active) in self.active.iter_mut() {
            let elapsed = now.saturating_sub(active.started_at);
            match active.filter.poll(elapsed) {
                FilterOutcome::Pending => {}
                FilterOutcome::Ready => {
                    if let Some(data) = active.filter.take_section() {
                        events.push(OrchestratorEvent::FilterReady(*kind, data));
                    }
                    to_remove.push(*kind);
                }
                FilterOutcome::TimedOut => {
                    if elapsed >= FILTER_TIMEOUT {
                        events.push(OrchestratorEvent::FilterTimedOut(*kind));
                        to_remove.push(*kind);
                    }
                }
            }
        }
        for kind in to_remove {
            self.active.remove(&kind);
        }

        if self.state == OrchestratorState::Filtering && self.scan_state.is_complete() {
            self.state = OrchestratorState::Done;
            events.push(OrchestratorEvent::TransponderDone);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kabelbw_workaround_matches_documented_transponders() {
        assert!(needs_kabelbw_any_tsid_workaround(0x00d7, 618_000_000));
        assert!(needs_kabelbw_any_tsid_workaround(0x00d8, 625_500_000));
        assert!(!needs_kabelbw_any_tsid_workaround(0x00d7, 700_000_000));
        assert!(!needs_kabelbw_any_tsid_workaround(0x0001, 618_000_000));
    }

    #[test]
    fn required_flags_include_pat_when_configured() {
        let orch = Orchestrator::new(ScanFlags { use_pat: true, ..ScanFlags::default() });
        assert!(orch.required_flags().contains(ReadyFlags::READY_PAT));
    }

    #[test]
    fn required_flags_always_include_sdt() {
        let orch = Orchestrator::new(ScanFlags { use_pat: false, scan_network_search: false, ..ScanFlags::default() });
        assert!(orch.required_flags().contains(ReadyFlags::READY_SDT));
        assert!(!orch.required_flags().contains(ReadyFlags::READY_PAT));
    }
}
