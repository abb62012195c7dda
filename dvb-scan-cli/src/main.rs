mod cli;
mod logging;
mod replay;

use clap::Parser;
use cli::{BroadcastType, Cli, Commands};
use dvb_scan_core::frontend::NullFrontend;
use dvb_scan_core::orchestrator::ScanFlags;
use dvb_scan_core::scan::{ChannelDatabase, ScanConfig, ScanDriver, ScanEvent, ScanObserver};
use dvb_scan_core::tuning::{
    CableParams, FecInner, GuardInterval, Modulation, Polarization, SatelliteParams, TerrestrialParams,
    TransmissionMode, TuningParams,
};
use replay::TsCaptureDemux;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on simulated-clock ticks per transponder, guarding against a
/// stuck orchestrator rather than hanging the process.
const MAX_TICKS: usize = 1_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Scan {
            device,
            broadcast_type,
            database,
            timeout,
            lnb: _lnb,
            continue_on_error,
            scan_only_free,
            scan_remove_services,
            lcn_file,
            verbose,
        } => run_scan(
            device,
            broadcast_type,
            database,
            timeout,
            continue_on_error,
            scan_only_free,
            scan_remove_services,
            lcn_file,
            verbose,
        ),
    }
}

fn seed_transponder(broadcast_type: BroadcastType) -> TuningParams {
    match broadcast_type {
        BroadcastType::Terrestrial => TuningParams::Terrestrial(TerrestrialParams {
            frequency: 473_000_000,
            bandwidth_hz: 6_000_000,
            modulation: Modulation::Auto,
            guard_interval: GuardInterval::Auto,
            transmission_mode: TransmissionMode::Auto,
            hierarchy_auto: true,
            inversion_unknown: true,
        }),
        BroadcastType::Cable => TuningParams::Cable(CableParams {
            frequency: 303_000_000,
            symbol_rate: 6_952_000,
            fec_inner: FecInner::Auto,
            modulation: Modulation::Auto,
        }),
        BroadcastType::Satellite => TuningParams::Satellite(SatelliteParams {
            frequency: 11_727_000,
            orbital_position: 1100,
            west_east_flag: true,
            polarization: Polarization::Horizontal,
            symbol_rate: 27_500,
            fec_inner: FecInner::Auto,
            modulation: Modulation::Auto,
        }),
    }
}

struct LoggingObserver {
    verbose: bool,
}

impl ScanObserver for LoggingObserver {
    fn on_event(&mut self, event: &ScanEvent) {
        if !self.verbose {
            return;
        }
        match event {
            ScanEvent::Update(params) => tracing::info!(frequency = params.frequency(), "tuning"),
            ScanEvent::NewService(service_ref, service) => {
                tracing::info!(service_id = service_ref.service_id, name = %service.name, "found service")
            }
            ScanEvent::Fail(params) => tracing::warn!(frequency = params.frequency(), "transponder unavailable"),
            ScanEvent::Finish => tracing::info!("scan finished"),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_scan(
    device: String,
    broadcast_type: BroadcastType,
    database: Option<String>,
    timeout_secs: u64,
    continue_on_error: bool,
    scan_only_free: bool,
    scan_remove_services: bool,
    lcn_file: Option<String>,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(None, verbose)?;

    let demux = TsCaptureDemux::from_file(&PathBuf::from(&device))?;
    let frontend = NullFrontend::new(true);
    let observer = LoggingObserver { verbose };

    let config = ScanConfig {
        flags: ScanFlags { scan_only_free, ..ScanFlags::default() },
        network_id: 0,
        scan_remove_services,
        scan_dont_remove_unscanned: false,
        scan_dont_remove_feeds: false,
        lcn_path: lcn_file.map(PathBuf::from),
    };

    let mut driver = ScanDriver::new(frontend, demux, observer, config);
    driver.start(vec![seed_transponder(broadcast_type)])?;

    let tick_step = Duration::from_secs(timeout_secs.max(1));
    let mut ticks = 0;
    while !driver.is_finished() {
        driver.tick(tick_step)?;
        ticks += 1;
        if ticks > MAX_TICKS {
            tracing::error!("scan did not converge within the tick budget, aborting");
            if !continue_on_error {
                return Err("scan exceeded tick budget".into());
            }
            break;
        }
    }

    let stats = driver.get_stats();
    tracing::info!(done = stats.done, total = stats.total, services = stats.services, "scan complete");

    let mut db: Box<dyn ChannelDatabase> = match database {
        Some(path) => Box::new(dvb_scan_db::Database::open(path)?),
        None => Box::new(dvb_scan_db::Database::open_in_memory()?),
    };
    driver.insert_into(db.as_mut())?;

    Ok(())
}
