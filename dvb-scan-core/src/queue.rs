//! The transponder work-item queue: to-scan, scanned, and unavailable lists,
//! with the similarity predicate that collapses near-duplicate transponders.

use crate::tuning::TuningParams;
use std::collections::VecDeque;

/// "Same physical transponder" tolerance, in the units returned by
/// `TuningParams::diff`.
pub const SAME_CHANNEL_TOLERANCE: i64 = 120;

pub fn same_channel(a: &TuningParams, b: &TuningParams, exact: bool) -> bool {
    a.diff(b, exact) < SAME_CHANNEL_TOLERANCE
}

#[derive(Debug, Default)]
pub struct TransponderQueue {
    to_scan: VecDeque<TuningParams>,
    scanned: Vec<TuningParams>,
    unavailable: Vec<TuningParams>,
}

impl TransponderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.to_scan.clear();
        self.scanned.clear();
        self.unavailable.clear();
    }

    pub fn to_scan(&self) -> impl Iterator<Item = &TuningParams> {
        self.to_scan.iter()
    }

    pub fn scanned(&self) -> &[TuningParams] {
        &self.scanned
    }

    pub fn unavailable(&self) -> &[TuningParams] {
        &self.unavailable
    }

    pub fn to_scan_len(&self) -> usize {
        self.to_scan.len()
    }

    /// Snapshot the to-scan queue and clear it, for `clearToScanOnFirstNIT`
    /// semantics: the NIT processor gets a chance to repopulate the queue
    /// from scratch, falling back to the snapshot if it contributed nothing.
    pub fn take_snapshot(&mut self) -> Vec<TuningParams> {
        self.to_scan.drain(..).collect()
    }

    pub fn restore_snapshot(&mut self, snapshot: Vec<TuningParams>) {
        self.to_scan = snapshot.into();
    }

    /// Insert `params` into the to-scan queue, deduplicating against all
    /// three lists. Mirrors `addChannelToScan`: the first match in to-scan
    /// is overwritten in place, later matches are dropped; a match already
    /// scanned or marked unavailable is skipped entirely; otherwise the new
    /// transponder is pushed to the *front* of the queue (so satellite rotor
    /// motion stays monotonic instead of bouncing around).
    pub fn add_to_scan(&mut self, params: TuningParams, currently_tuned: Option<&TuningParams>) {
        if let Some(pos) = self.to_scan.iter().position(|p| same_channel(p, &params, false)) {
            self.to_scan[pos] = params;
            // Drop any further duplicates (dedup the whole queue in one pass).
            let mut i = pos + 1;
            while i < self.to_scan.len() {
                if same_channel(&self.to_scan[i], &self.to_scan[pos], false) {
                    self.to_scan.remove(i);
                } else {
                    i += 1;
                }
            }
            return;
        }
        if self.scanned.iter().any(|p| same_channel(p, &params, true)) {
            return;
        }
        if self.unavailable.iter().any(|p| same_channel(p, &params, true)) {
            return;
        }
        if let Some(current) = currently_tuned {
            if same_channel(current, &params, false) {
                return;
            }
        }
        self.to_scan.push_front(params);
    }

    /// Seeds the to-scan queue from the caller's initial transponder list
    /// at scan start, in input order, deduplicated via
    /// `same_channel(..., exact=true)` — stricter than `add_to_scan`'s own
    /// steady-state `exact=false` dedup against the live queue.
    pub fn seed_to_scan(&mut self, entries: Vec<TuningParams>) {
        for params in entries {
            if self.to_scan.iter().any(|p| same_channel(p, &params, true)) {
                continue;
            }
            self.to_scan.push_back(params);
        }
    }

    pub fn pop_next(&mut self) -> Option<TuningParams> {
        self.to_scan.pop_front()
    }

    pub fn mark_scanned(&mut self, params: TuningParams) {
        self.scanned.push(params);
    }

    pub fn mark_unavailable(&mut self, params: TuningParams) {
        self.unavailable.push(params);
    }
}
