//! Scan driver: the top-level loop that pulls transponders from the queue,
//! drives tuning, feeds the orchestrator, and hands the result off to a
//! channel database.

use crate::error::{Result, ScanError};
use crate::frontend::{Demux, Frontend, FrontendState};
use crate::ident::{ChannelId, ServiceRef, NAMESPACE_CABLE, NAMESPACE_TERRESTRIAL};
use crate::lcn::LcnWriter;
use crate::orchestrator::{FilterKind, Orchestrator, OrchestratorEvent, OrchestratorState, ScanFlags};
use crate::processors::nit::process_nit;
use crate::processors::pmt::classify_pmt;
use crate::processors::sdt::process_sdt;
use crate::psi::nit::NitTable;
use crate::psi::pat::PatTable;
use crate::psi::pmt::PmtTable;
use crate::psi::sdt::SdtTable;
use crate::psi::section::PsiSection;
use crate::queue::TransponderQueue;
use crate::service::Service;
use crate::tuning::TuningParams;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ScanEvent {
    Update(TuningParams),
    NewService(ServiceRef, Service),
    Fail(TuningParams),
    Finish,
}

pub trait ScanObserver {
    fn on_event(&mut self, event: &ScanEvent);
}

/// No-op observer for tests and headless use.
#[derive(Default)]
pub struct NullObserver;
impl ScanObserver for NullObserver {
    fn on_event(&mut self, _event: &ScanEvent) {}
}

/// The channel database this crate hands its results to. Implemented by
/// `dvb-scan-db::Database`; kept as a trait here so the core engine does
/// not depend on a concrete persistence crate.
pub trait ChannelDatabase {
    fn add_channel(&mut self, id: ChannelId, params: &TuningParams) -> std::result::Result<(), Box<dyn std::error::Error>>;
    fn add_service(&mut self, service_ref: ServiceRef, service: &Service) -> std::result::Result<(), Box<dyn std::error::Error>>;
    fn remove_services_by_namespace_prefix(&mut self, namespace_high16: u16) -> std::result::Result<(), Box<dyn std::error::Error>>;
    /// Removes every service ever recorded against a transponder at this
    /// orbital position, regardless of its namespace's high bits — the
    /// polarization fold in `tuning_hash` means namespace prefix alone can't
    /// express this for satellite channels.
    fn remove_services_by_orbital_position(&mut self, orbital_position: u16) -> std::result::Result<(), Box<dyn std::error::Error>>;
    fn remove_services_exact_channel(&mut self, id: ChannelId) -> std::result::Result<(), Box<dyn std::error::Error>>;
    fn set_last_scanned_bouquet(&mut self, services: &[ServiceRef]) -> std::result::Result<(), Box<dyn std::error::Error>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    pub done: usize,
    pub total: usize,
    pub services: usize,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub flags: ScanFlags,
    pub network_id: u16,
    pub scan_remove_services: bool,
    pub scan_dont_remove_unscanned: bool,
    pub scan_dont_remove_feeds: bool,
    pub lcn_path: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            flags: ScanFlags::default(),
            network_id: 0,
            scan_remove_services: false,
            scan_dont_remove_unscanned: false,
            scan_dont_remove_feeds: false,
            lcn_path: None,
        }
    }
}

pub struct ScanDriver<F, D, O> {
    frontend: F,
    demux: D,
    observer: O,
    config: ScanConfig,
    queue: TransponderQueue,
    orchestrator: Orchestrator,
    lcn_writer: Option<LcnWriter>,
    new_channels: HashMap<ChannelId, TuningParams>,
    new_services: HashMap<ServiceRef, Service>,
    current: Option<TuningParams>,
    current_started_at: Duration,
    clock: Duration,
    last_service_name: Option<String>,
    last_service_ref: Option<ServiceRef>,
    stats: ScanStats,
    to_scan_snapshot_pending: Option<Vec<TuningParams>>,
}

impl<F: Frontend, D: Demux, O: ScanObserver> ScanDriver<F, D, O> {
    pub fn new(frontend: F, demux: D, observer: O, config: ScanConfig) -> Self {
        let orchestrator = Orchestrator::new(config.flags);
        ScanDriver {
            frontend,
            demux,
            observer,
            config,
            queue: TransponderQueue::new(),
            orchestrator,
            lcn_writer: None,
            new_channels: HashMap::new(),
            new_services: HashMap::new(),
            current: None,
            current_started_at: Duration::ZERO,
            clock: Duration::ZERO,
            last_service_name: None,
            last_service_ref: None,
            stats: ScanStats::default(),
            to_scan_snapshot_pending: None,
        }
    }

    pub fn get_stats(&self) -> ScanStats {
        self.stats
    }

    pub fn get_last_service_name(&self) -> Option<&str> {
        self.last_service_name.as_deref()
    }

    pub fn get_last_service_ref(&self) -> Option<ServiceRef> {
        self.last_service_ref
    }

    pub fn get_current_transponder(&self) -> Option<&TuningParams> {
        self.current.as_ref()
    }

    pub fn get_frontend(&mut self) -> &mut F {
        &mut self.frontend
    }

    /// Clears every queue and state, seeds the to-scan queue from
    /// `known_transponders` (deduplicated exactly), opens or truncates the
    /// LCN side file, and starts the first transponder.
    pub fn start(&mut self, known_transponders: Vec<TuningParams>) -> Result<()> {
        self.queue.clear();
        self.new_channels.clear();
        self.new_services.clear();
        self.stats = ScanStats { done: 0, total: known_transponders.len(), services: 0 };

        self.queue.seed_to_scan(known_transponders);

        if let Some(path) = self.config.lcn_path.clone() {
            let mut writer = LcnWriter::open(&path)?;
            if self.config.scan_remove_services {
                writer.truncate()?;
            }
            self.lcn_writer = Some(writer);
        }

        self.next_channel()
    }

    /// Pops the next transponder and tunes to it; recurses on tune failure,
    /// emits `Finish` once the queue is empty.
    pub fn next_channel(&mut self) -> Result<()> {
        let Some(params) = self.queue.pop_next() else {
            self.observer.on_event(&ScanEvent::Finish);
            return Ok(());
        };

        self.current = Some(params);
        self.current_started_at = self.clock;
        self.observer.on_event(&ScanEvent::Update(params));
        self.orchestrator.begin_tuning();

        match self.frontend.tune(&params) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.queue.mark_unavailable(params);
                self.observer.on_event(&ScanEvent::Fail(params));
                self.stats.done += 1;
                self.next_channel()
            }
        }
    }

    /// Advances the clock by `tick` and drives the orchestrator and
    /// frontend one step. Callers loop this until `is_finished` returns
    /// true.
    pub fn tick(&mut self, tick: Duration) -> Result<()> {
        self.clock += tick;

        if self.orchestrator.state == OrchestratorState::Tuning {
            match self.frontend.state() {
                FrontendState::Locked => {
                    self.orchestrator.on_locked(&mut self.demux, self.clock);
                }
                FrontendState::Failed => {
                    self.orchestrator.on_tune_failed();
                    if let Some(params) = self.current.take() {
                        self.queue.mark_unavailable(params);
                        self.observer.on_event(&ScanEvent::Fail(params));
                    }
                    self.stats.done += 1;
                    return self.next_channel();
                }
                FrontendState::Idle | FrontendState::Tuning => {}
            }
            return Ok(());
        }

        if self.orchestrator.state != OrchestratorState::Filtering {
            return Ok(());
        }

        let events = self.orchestrator.poll(self.clock);
        for event in events {
            self.handle_event(event)?;
        }

        if self.orchestrator.state == OrchestratorState::Done {
            if let Some(params) = self.current.take() {
                self.queue.mark_scanned(params);
            }
            self.stats.done += 1;
            return self.next_channel();
        }

        Ok(())
    }

    fn handle_event(&mut self, event: OrchestratorEvent) -> Result<()> {
        match event {
            OrchestratorEvent::FilterTimedOut(FilterKind::Pat) => {
                self.orchestrator.on_pat_timed_out(&mut self.demux, self.clock);
            }
            OrchestratorEvent::FilterTimedOut(FilterKind::Sdt) => {
                self.orchestrator.on_sdt_ready(false);
            }
            OrchestratorEvent::FilterTimedOut(FilterKind::Nit) => {
                self.orchestrator.on_nit_ready(false);
            }
            OrchestratorEvent::FilterTimedOut(FilterKind::Bat) => {
                self.orchestrator.on_bat_ready(false);
            }
            OrchestratorEvent::FilterTimedOut(FilterKind::Pmt(pn)) => {
                self.orchestrator.on_pmt_complete(&mut self.demux, pn, self.clock);
            }
            OrchestratorEvent::FilterReady(FilterKind::Pat, data) => {
                self.process_pat(&data)?;
            }
            OrchestratorEvent::FilterReady(FilterKind::Sdt, data) => {
                self.process_sdt_section(&data)?;
            }
            OrchestratorEvent::FilterReady(FilterKind::Nit, data) => {
                self.process_nit_section(&data)?;
            }
            OrchestratorEvent::FilterReady(FilterKind::Bat, _data) => {
                self.orchestrator.on_bat_ready(true);
            }
            OrchestratorEvent::FilterReady(FilterKind::Pmt(pn), data) => {
                self.process_pmt_section(pn, &data)?;
            }
            OrchestratorEvent::TransponderDone => {}
        }
        Ok(())
    }

    fn process_pat(&mut self, data: &[u8]) -> Result<()> {
        let section = PsiSection::parse(data)?;
        if let Ok(pat) = PatTable::parse(&section) {
            let frequency = self.current.map(|c| c.frequency()).unwrap_or(0);
            self.orchestrator.on_pat_ready(&mut self.demux, &pat, frequency, self.clock);
        } else {
            self.orchestrator.on_pat_timed_out(&mut self.demux, self.clock);
        }
        Ok(())
    }

    fn process_sdt_section(&mut self, data: &[u8]) -> Result<()> {
        let section = PsiSection::parse(data)?;
        let Ok(sdt) = SdtTable::parse(&section) else {
            self.orchestrator.on_sdt_ready(false);
            return Ok(());
        };

        let Some(current) = self.current else {
            self.orchestrator.on_sdt_ready(false);
            return Ok(());
        };
        let position = current.orbital_position();
        let tuning_hash = current.tuning_hash();

        let result = process_sdt(
            &sdt,
            tuning_hash,
            position,
            self.config.flags.scan_only_free,
            self.config.flags.use_pat,
            &mut self.orchestrator.scan_state,
        );
        self.new_channels.entry(result.channel_id).or_insert(current);

        for (service_ref, service) in result.services {
            self.last_service_name = Some(service.name.clone());
            self.last_service_ref = Some(service_ref);
            self.observer.on_event(&ScanEvent::NewService(service_ref, service.clone()));
            self.new_services.insert(service_ref, service);
            self.stats.services += 1;
        }

        self.orchestrator.on_sdt_ready(true);
        Ok(())
    }

    fn process_nit_section(&mut self, data: &[u8]) -> Result<()> {
        let section = PsiSection::parse(data)?;
        let Ok(nit) = NitTable::parse(&section) else {
            self.orchestrator.on_nit_ready(false);
            return Ok(());
        };

        let Some(current) = self.current else {
            self.orchestrator.on_nit_ready(false);
            return Ok(());
        };

        if self.orchestrator.should_snapshot_before_nit() && self.to_scan_snapshot_pending.is_none() {
            self.to_scan_snapshot_pending = Some(self.queue.take_snapshot());
        }

        let result = process_nit(&nit, &current);
        for discovered in result.discovered_transponders {
            self.queue.add_to_scan(discovered, self.current.as_ref());
        }

        if let Some(writer) = self.lcn_writer.as_mut() {
            let position = current.orbital_position();
            let tuning_hash = current.tuning_hash();
            for mut record in result.lcn_records {
                record.namespace = crate::ident::build_namespace(position, record.original_network_id, record.transport_stream_id, tuning_hash);
                record.signal = self.frontend.read(crate::frontend::FrontendReading::SignalPower) as u32;
                if let Err(e) = writer.write_record(&record) {
                    tracing::warn!(error = %e, "failed to write LCN record");
                }
            }
        }

        if let Some(snapshot) = self.to_scan_snapshot_pending.take() {
            if self.queue.to_scan_len() == 0 {
                self.queue.restore_snapshot(snapshot);
            }
        }

        self.orchestrator.on_nit_ready(true);
        Ok(())
    }

    fn process_pmt_section(&mut self, program_number: u16, data: &[u8]) -> Result<()> {
        let section = PsiSection::parse(data)?;
        if let Ok(pmt) = PmtTable::parse(&section) {
            let classification = classify_pmt(&pmt);
            if let Some(entry) = self.orchestrator.scan_state.pmts_to_read.get_mut(&program_number) {
                entry.service_type = classification.service_type() as u8;
                entry.scrambled = classification.scrambled;
            }
        }
        self.orchestrator.on_pmt_complete(&mut self.demux, program_number, self.clock);
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.current.is_none() && self.queue.to_scan_len() == 0
    }

    /// Applies the insertion policy from the external database interface
    /// and hands off every discovered channel and service.
    pub fn insert_into(&mut self, db: &mut dyn ChannelDatabase) -> std::result::Result<(), Box<dyn std::error::Error>> {
        if self.config.scan_remove_services {
            self.purge_scanned_delivery_systems(db)?;
        }

        for (id, params) in &self.new_channels {
            db.add_channel(*id, params)?;
        }
        for (service_ref, service) in &self.new_services {
            db.add_service(*service_ref, service)?;
        }

        let refs: Vec<ServiceRef> = self.new_services.keys().copied().collect();
        db.set_last_scanned_bouquet(&refs)?;

        Ok(())
    }

    fn purge_scanned_delivery_systems(&self, db: &mut dyn ChannelDatabase) -> std::result::Result<(), Box<dyn std::error::Error>> {
        if self.config.scan_dont_remove_unscanned {
            for params in self.queue.scanned() {
                if let Some(id) = self.channel_id_for(params) {
                    db.remove_services_exact_channel(id)?;
                }
            }
            return Ok(());
        }

        let mut touched_cable = false;
        let mut touched_terrestrial = false;
        let mut touched_positions: Vec<u16> = Vec::new();

        for params in self.queue.scanned().iter().chain(self.queue.unavailable()) {
            match params {
                TuningParams::Cable(_) => touched_cable = true,
                TuningParams::Terrestrial(_) => touched_terrestrial = true,
                TuningParams::Satellite(s) => {
                    if !touched_positions.contains(&s.orbital_position) {
                        touched_positions.push(s.orbital_position);
                    }
                }
            }
        }

        if touched_cable {
            db.remove_services_by_namespace_prefix((NAMESPACE_CABLE >> 16) as u16)?;
        }
        if touched_terrestrial {
            db.remove_services_by_namespace_prefix((NAMESPACE_TERRESTRIAL >> 16) as u16)?;
        }
        for position in touched_positions {
            if self.config.scan_dont_remove_feeds {
                db.remove_services_by_namespace_prefix(position)?;
            } else {
                db.remove_services_by_orbital_position(position)?;
            }
        }

        Ok(())
    }

    fn channel_id_for(&self, params: &TuningParams) -> Option<ChannelId> {
        self.new_channels.iter().find(|(_, p)| crate::queue::same_channel(p, params, true)).map(|(id, _)| *id)
    }
}

impl From<crate::error::SectionError> for ScanError {
    fn from(e: crate::error::SectionError) -> Self {
        ScanError::Section(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{BufferedDemux, NullFrontend};
    use crate::tuning::{CableParams, FecInner, Modulation};

    fn cable(freq: u32) -> TuningParams {
        TuningParams::Cable(CableParams { frequency: freq, symbol_rate: 6900, fec_inner: FecInner::Auto, modulation: Modulation::Auto })
    }

    #[test]
    fn start_populates_queue_and_tunes_first_transponder() {
        let mut driver = ScanDriver::new(NullFrontend::new(true), BufferedDemux::new(), NullObserver, ScanConfig::default());
        driver.start(vec![cable(618_000_000), cable(700_000_000)]).unwrap();
        assert!(driver.get_current_transponder().is_some());
    }

    #[test]
    fn empty_queue_finishes_immediately() {
        let mut driver = ScanDriver::new(NullFrontend::new(true), BufferedDemux::new(), NullObserver, ScanConfig::default());
        driver.start(vec![]).unwrap();
        assert!(driver.get_current_transponder().is_none());
    }

    #[test]
    fn tune_failure_marks_unavailable_and_advances() {
        let mut driver = ScanDriver::new(NullFrontend::new(false), BufferedDemux::new(), NullObserver, ScanConfig::default());
        driver.start(vec![cable(618_000_000), cable(700_000_000)]).unwrap();
        // Both transponders fail to lock; queue drains to empty.
        assert!(driver.get_current_transponder().is_none() || driver.queue.to_scan_len() <= 1);
    }
}
