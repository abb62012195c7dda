//! External collaborator interfaces: the tuner frontend and the demux's
//! section filters. No physical DVB adapter is driven here; implementors
//! wrap whatever kernel or vendor API is available. `NullFrontend` and
//! `BufferedDemux` stand in for hardware in tests and the CLI's
//! file-replay mode.

use crate::error::{Result, ScanError};
use crate::tuning::TuningParams;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendState {
    Idle,
    Tuning,
    Locked,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendReading {
    Frequency,
    BitErrorRate,
    SnrValue,
    SignalPower,
}

pub trait Frontend {
    fn tune(&mut self, params: &TuningParams) -> Result<()>;
    fn state(&mut self) -> FrontendState;
    fn current_params(&self) -> Option<TuningParams>;
    fn read(&mut self, reading: FrontendReading) -> i32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Pending,
    Ready,
    TimedOut,
}

/// One outstanding section filter. Implementors deliver complete sections
/// through `take_section`; `poll` reports readiness given how long the
/// filter has been outstanding, so timeouts are driven by an externally
/// supplied clock rather than `std::time::Instant`, keeping tests
/// deterministic.
pub trait SectionFilter {
    fn poll(&mut self, elapsed: Duration) -> FilterOutcome;
    fn take_section(&mut self) -> Option<Vec<u8>>;
}

pub trait Demux {
    fn open_filter(&mut self, pid: u16, table_id: u8, table_id_extension: Option<u16>) -> Result<Box<dyn SectionFilter>>;
}

/// A frontend test double that locks immediately and reports fixed signal
/// readings; useful for driving the orchestrator in tests without hardware.
pub struct NullFrontend {
    current: Option<TuningParams>,
    should_lock: bool,
}

impl NullFrontend {
    pub fn new(should_lock: bool) -> Self {
        NullFrontend { current: None, should_lock }
    }
}

impl Frontend for NullFrontend {
    fn tune(&mut self, params: &TuningParams) -> Result<()> {
        self.current = Some(*params);
        if self.should_lock {
            Ok(())
        } else {
            Err(ScanError::TuneFailed("NullFrontend configured to never lock".into()))
        }
    }

    fn state(&mut self) -> FrontendState {
        if self.current.is_none() {
            FrontendState::Idle
        } else if self.should_lock {
            FrontendState::Locked
        } else {
            FrontendState::Failed
        }
    }

    fn current_params(&self) -> Option<TuningParams> {
        self.current
    }

    fn read(&mut self, _reading: FrontendReading) -> i32 {
        0
    }
}

/// A demux test double that replays pre-recorded section bytes for a given
/// PID rather than talking to a kernel API.
pub struct BufferedDemux {
    sections_by_pid: std::collections::HashMap<u16, VecDeque<Vec<u8>>>,
}

impl BufferedDemux {
    pub fn new() -> Self {
        BufferedDemux { sections_by_pid: std::collections::HashMap::new() }
    }

    pub fn push_section(&mut self, pid: u16, data: Vec<u8>) {
        self.sections_by_pid.entry(pid).or_default().push_back(data);
    }
}

impl Default for BufferedDemux {
    fn default() -> Self {
        Self::new()
    }
}

struct BufferedFilter {
    pending: Option<Vec<u8>>,
}

impl SectionFilter for BufferedFilter {
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

impl Demux for BufferedDemux {
    fn open_filter(&mut self, pid: u16, _table_id: u8, _table_id_extension: Option<u16>) -> Result<Box<dyn SectionFilter>> {
        let pending = self.sections_by_pid.get_mut(&pid).and_then(|q| q.pop_front());
        Ok(Box::new(BufferedFilter { pending }))
    }
}

/// Default 4-second timeout applied to every section filter, per the
/// original scanning engine's `eTimer` arming in `startFilter`.
pub const FILTER_TIMEOUT: Duration = Duration::from_secs(4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::{CableParams, FecInner, Modulation};

    #[test]
    fn null_frontend_locks_when_configured_to() {
        let mut fe = NullFrontend::new(true);
        let params = TuningParams::Cable(CableParams {
            frequency: 618_000_000,
            symbol_rate: 6900,
            fec_inner: FecInner::Auto,
            modulation: Modulation::Auto,
        });
        fe.tune(&params).unwrap();
        assert_eq!(fe.state(), FrontendState::Locked);
    }

    #[test]
    fn buffered_demux_replays_pushed_section() {
        let mut demux = BufferedDemux::new();
        demux.push_section(0x0011, vec![1, 2, 3]);
        let mut filter = demux.open_filter(0x0011, 0x42, None).unwrap();
        assert_eq!(filter.poll(Duration::from_millis(0)), FilterOutcome::Ready);
        assert_eq!(filter.take_section(), Some(vec![1, 2, 3]));
    }
}
