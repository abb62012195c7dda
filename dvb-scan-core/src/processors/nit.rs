//! NIT processor: discovers additional transponders and logical channel
//! numbers from a parsed NIT, correcting announced satellite positions
//! against the currently tuned position.

use crate::lcn::LcnRecord;
use crate::psi::nit::NitTable;
use crate::tuning::{
    CableParams, FecInner, GuardInterval, Modulation, Polarization, SatelliteParams,
    TerrestrialParams, TransmissionMode, TuningParams,
};

/// Tenths-of-a-degree snap tolerance for satellite position correction.
const POSITION_SNAP_TOLERANCE: i32 = 5;
/// Half the orbital circle in tenths of a degree (360.0 degrees).
const FULL_CIRCLE_TENTHS: i32 = 3600;

#[derive(Debug, Default)]
pub struct NitProcessResult {
    pub discovered_transponders: Vec<TuningParams>,
    pub lcn_records: Vec<LcnRecord>,
}

/// Corrects an announced satellite orbital position against the transponder
/// currently being scanned: snaps to the current position if close, snaps
/// with an east/west inversion correction if the mirrored position is
/// close, otherwise returns `None` to signal the entry should be dropped.
pub fn correct_satellite_position(announced: u16, current: u16) -> Option<u16> {
    let announced = announced as i32;
    let current = current as i32;

    if (announced - current).abs() < POSITION_SNAP_TOLERANCE {
        return Some(current as u16);
    }
    if ((FULL_CIRCLE_TENTHS - current).abs() - announced).abs() < POSITION_SNAP_TOLERANCE {
        return Some(current as u16);
    }
    None
}

/// Processes a NIT against the currently tuned transponder. `current` must
/// be the transponder that was tuned to receive this NIT; its delivery
/// system determines which descriptors are consulted (satellite NITs only
/// yield satellite delivery descriptors, etc, matching how real broadcast
/// chains only annonce their own delivery system's transponders).
pub fn process_nit(nit: &NitTable, current: &TuningParams) -> NitProcessResult {
    let mut result = NitProcessResult::default();

    for ts in &nit.transport_streams {
        match current {
            TuningParams::Satellite(cur) => {
                if let Some(sat) = ts.satellite_delivery() {
                    if sat.frequency < 10_000 {
                        continue;
                    }
                    if let Some(position) = correct_satellite_position(sat.orbital_position, cur.orbital_position) {
                        result.discovered_transponders.push(TuningParams::Satellite(SatelliteParams {
                            frequency: sat.frequency,
                            orbital_position: position,
                            west_east_flag: sat.west_east_flag,
                            polarization: match sat.polarization {
                                0 => Polarization::Horizontal,
                                1 => Polarization::Vertical,
                                2 => Polarization::Left,
                                _ => Polarization::Right,
                            },
                            symbol_rate: sat.symbol_rate,
                            fec_inner: fec_from_raw(sat.fec_inner),
                            modulation: Modulation::Auto,
                        }));
                    }
                }
            }
            TuningParams::Cable(_) => {
                if let Some(cable) = ts.cable_delivery() {
                    result.discovered_transponders.push(TuningParams::Cable(CableParams {
                        frequency: cable.frequency,
                        symbol_rate: cable.symbol_rate,
                        fec_inner: fec_from_raw(cable.fec_inner),
                        modulation: Modulation::Auto,
                    }));
                }
            }
            TuningParams::Terrestrial(_) => {
                if let Some(terr) = ts.terrestrial_delivery() {
                    result.discovered_transponders.push(TuningParams::Terrestrial(TerrestrialParams {
                        frequency: terr.frequency,
                        bandwidth_hz: bandwidth_from_raw(terr.bandwidth),
                        modulation: Modulation::Auto,
                        guard_interval: GuardInterval::Auto,
                        transmission_mode: TransmissionMode::Auto,
                        hierarchy_auto: true,
                        inversion_unknown: true,
                    }));
                }

                for freq_list in ts.frequency_lists() {
                    // Coding type 3: terrestrial alternate frequencies.
                    if freq_list.coding_type != 3 {
                        continue;
                    }
                    for alt_freq in freq_list.frequencies {
                        result.discovered_transponders.push(TuningParams::Terrestrial(TerrestrialParams {
                            frequency: alt_freq,
                            bandwidth_hz: 8_000_000,
                            modulation: Modulation::Auto,
                            guard_interval: GuardInterval::Auto,
                            transmission_mode: TransmissionMode::Auto,
                            hierarchy_auto: true,
                            inversion_unknown: true,
                        }));
                    }
                }

                if let Some(lcd) = ts.logical_channels() {
                    for entry in lcd.entries {
                        if !entry.visible_service {
                            continue;
                        }
                        result.lcn_records.push(LcnRecord {
                            namespace: 0, // filled in by the caller once the namespace is known
                            original_network_id: ts.original_network_id,
                            transport_stream_id: ts.transport_stream_id,
                            service_id: entry.service_id,
                            lcn: entry.lcn,
                            signal: 0,
                        });
                    }
                }
            }
        }
    }

    result
}

fn fec_from_raw(raw: u8) -> FecInner {
    match raw {
        1 => FecInner::Fec1_2,
        2 => FecInner::Fec2_3,
        3 => FecInner::Fec3_4,
        4 => FecInner::Fec5_6,
        5 => FecInner::Fec7_8,
        6 => FecInner::Fec8_9,
        15 => FecInner::None,
        _ => FecInner::Auto,
    }
}

fn bandwidth_from_raw(raw: u8) -> u32 {
    match raw {
        0 => 8_000_000,
        1 => 7_000_000,
        2 => 6_000_000,
        3 => 5_000_000,
        _ => 8_000_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_to_current_position_when_close() {
        assert_eq!(correct_satellite_position(194, 192), Some(192));
    }

    // S4: east/west inversion correction.
    #[test]
    fn s4_inversion_correction() {
        assert_eq!(correct_satellite_position(3408, 192), Some(192));
    }

    #[test]
    fn drops_when_neither_correction_applies() {
        assert_eq!(correct_satellite_position(2000, 192), None);
    }
}
