//! SDT processor: turns a parsed SDT into service records, applying the
//! North-America service-type hack and cross-referencing the PMT scan
//! cursor so obsolete in-flight PMTs get aborted.

use crate::ident::{build_namespace, ChannelId, ServiceRef};
use crate::psi::sdt::SdtTable;
use crate::service::{PmtEntry, ScanState, Service};
use std::collections::BTreeMap;

/// Service types seen on North-American cable/satellite systems that mean
/// "video" despite not being DVB's own type 1. Preserve this set bit-exact.
const NA_VIDEO_SERVICE_TYPES: [u8; 12] = [128, 133, 137, 144, 145, 150, 154, 163, 164, 166, 167, 168];

fn normalize_service_type(raw: u8) -> u8 {
    if NA_VIDEO_SERVICE_TYPES.contains(&raw) {
        1
    } else {
        raw
    }
}

pub struct SdtProcessResult {
    pub channel_id: ChannelId,
    pub services: Vec<(ServiceRef, Service)>,
}

/// Processes an SDT. `tuning_hash` and `position` come from the currently
/// tuned transponder; `pmts_to_read` is mutated to reflect PAT/SDT
/// cross-referencing (entries absent from the SDT's running program set are
/// left for the caller to decide, entries present are either removed or, if
/// a PMT for them is currently in flight, flagged via `scan_state`).
pub fn process_sdt(
    sdt: &SdtTable,
    tuning_hash: u32,
    position: u16,
    scan_only_free: bool,
    use_pat: bool,
    scan_state: &mut ScanState,
) -> SdtProcessResult {
    let namespace = build_namespace(position, sdt.original_network_id, sdt.transport_stream_id, tuning_hash);
    let channel_id = ChannelId::new(namespace, sdt.transport_stream_id, sdt.original_network_id);

    let mut services = Vec::new();

    for sdt_service in &sdt.services {
        let raw_type = sdt_service.service_type().unwrap_or(0);
        let service_type = normalize_service_type(raw_type);

        let had_pmt_entry_before_lookup = scan_state.pmts_to_read.contains_key(&sdt_service.service_id);
        let pmt_entry = lookup_and_reconcile_pmt(sdt_service.service_id, scan_state);
        // A service absent from PAT's program list is assumed encrypted, but
        // only when PAT was actually consulted; without PAT, pmts_to_read is
        // never populated and "absent" carries no information.
        let absent_from_pat = use_pat && !had_pmt_entry_before_lookup;
        let scrambled = sdt_service.has_ca_descriptor() || absent_from_pat || pmt_entry.map(|e| e.scrambled).unwrap_or(false);

        if scan_only_free && scrambled {
            continue;
        }

        let service_ref = ServiceRef {
            channel: channel_id,
            service_id: sdt_service.service_id,
            service_type,
        };

        let service = Service {
            name: sdt_service.service_name().unwrap_or_default().to_string(),
            provider_name: sdt_service.provider_name().unwrap_or_default().to_string(),
            ca_system_ids: sdt_service.ca_system_ids.clone(),
            new_found: true,
            hold_name: false,
            no_sdt: false,
        };

        services.push((service_ref, service));
    }

    SdtProcessResult { channel_id, services }
}

/// A service absent from PAT (no PMT entry recorded) is assumed encrypted.
/// A service present whose PMT is currently in flight sets
/// `abort_current_pmt`; otherwise the entry is simply consumed.
fn lookup_and_reconcile_pmt(service_id: u16, scan_state: &mut ScanState) -> Option<PmtEntry> {
    let entry = scan_state.pmts_to_read.get(&service_id).copied()?;
    let currently_in_flight = !scan_state.pmt_cursor.contains(&service_id)
        && scan_state.pmts_to_read.contains_key(&service_id);
    if currently_in_flight {
        scan_state.abort_current_pmt = true;
    } else {
        scan_state.remove_pmt(service_id);
    }
    Some(entry)
}

pub fn services_absent_from_pat_are_scrambled(pmts_to_read: &BTreeMap<u16, PmtEntry>, service_id: u16) -> bool {
    !pmts_to_read.contains_key(&service_id)
}
