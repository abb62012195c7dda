//! Channel identity: namespaces, channel ids, and service references.
//!
//! The namespace folding rule and the per-ONID validation table are ported
//! bit-exact from the scanning engine this crate descends from; do not
//! "clean up" the table without checking a real capture against it first.

use serde::{Deserialize, Serialize};

/// Reserved namespace high half for terrestrial channels, any position.
pub const NAMESPACE_TERRESTRIAL: u32 = 0xEEEE0000;
/// Reserved namespace high half for cable channels, any position.
pub const NAMESPACE_CABLE: u32 = 0xFFFF0000;

pub type Namespace = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub namespace: Namespace,
    pub transport_stream_id: u16,
    pub original_network_id: u16,
}

impl ChannelId {
    pub fn new(namespace: Namespace, tsid: u16, onid: u16) -> Self {
        ChannelId {
            namespace,
            transport_stream_id: tsid,
            original_network_id: onid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRef {
    pub channel: ChannelId,
    pub service_id: u16,
    pub service_type: u8,
}

/// Returns whether `(onid, tsid)` identifies a transponder independently of
/// frequency, at the given orbital position (tenths of a degree; 0xFFFF /
/// 0xEEEE stand in for "terrestrial" / "cable" respectively, where position
/// is meaningless).
///
/// This table enumerates known real-world collisions where the same
/// (onid, tsid) pair is reused across physically distinct transponders.
/// Preserve it bit-exact.
pub fn is_valid_onid_tsid(position: u16, onid: u16, tsid: u16) -> bool {
    if position == 0xFFFF || position == 0xEEEE {
        return true;
    }
    match onid {
        0 | 0x1111 => false,
        0x013E => !(position == 130 && tsid == 0x0578),
        1 => position == 192,
        0x00B1 => tsid != 0x00B0,
        0x00EB => tsid != 0x4321,
        0x0002 => !(position.abs_diff(282) < 6 && tsid == 2019),
        0x2000 => tsid != 0x1000,
        0x005E => !(position.abs_diff(48) < 3 && tsid == 1),
        10100 => !(position == 360 && tsid == 10187),
        42 => !(position == 420 && matches!(tsid, 2 | 5 | 8 | 55)),
        100 => !((position == 685 || position == 3560) && tsid == 1),
        70 => !(position.abs_diff(3592) < 3 && tsid == 46),
        32 => !(position == 3195 && tsid == 21),
        _ => onid < 0xFF00,
    }
}

/// Folds a transponder tuning hash into the namespace for a given
/// (onid, tsid). When the pair is trusted to identify the transponder
/// independent of frequency, the low 16 bits (a frequency sub-network
/// discriminator) are cleared so that re-tuning the same transponder at a
/// slightly different frequency still maps to the same namespace.
pub fn build_namespace(position: u16, onid: u16, tsid: u16, tuning_hash: u32) -> Namespace {
    if is_valid_onid_tsid(position, onid, tsid) {
        tuning_hash & 0xFFFF0000
    } else {
        tuning_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terrestrial_and_cable_always_valid() {
        assert!(is_valid_onid_tsid(0xEEEE, 0, 0));
        assert!(is_valid_onid_tsid(0xFFFF, 0x1111, 0xFFFF));
    }

    #[test]
    fn zero_and_broadcast_onid_always_invalid() {
        assert!(!is_valid_onid_tsid(100, 0, 5));
        assert!(!is_valid_onid_tsid(100, 0x1111, 5));
    }

    #[test]
    fn onid_1_requires_position_192() {
        assert!(is_valid_onid_tsid(192, 1, 99));
        assert!(!is_valid_onid_tsid(402, 1, 42));
    }

    #[test]
    fn onid_2_tsid_2019_collision_window() {
        assert!(!is_valid_onid_tsid(282, 0x0002, 2019));
        assert!(!is_valid_onid_tsid(286, 0x0002, 2019));
        assert!(is_valid_onid_tsid(290, 0x0002, 2019));
        assert!(is_valid_onid_tsid(282, 0x0002, 2020));
    }

    #[test]
    fn default_rule_is_onid_below_ff00() {
        assert!(is_valid_onid_tsid(100, 0x00FE, 1));
        assert!(!is_valid_onid_tsid(100, 0xFF01, 1));
    }

    // S1 from the testable-properties scenarios: namespace folding.
    #[test]
    fn s1_namespace_folding() {
        let h = 0x01920ABCu32;
        // position = 0x0192 = 402, not 192: onid 1's rule (valid iff
        // position == 192) makes this pair invalid, so the hash is kept
        // unfolded.
        assert!(!is_valid_onid_tsid(0x0192, 1, 42));
        assert_eq!(build_namespace(0x0192, 1, 42, h), h);

        let h2 = 0x00C00ABCu32;
        // position == 192 makes the pair valid, so the low 16 bits fold away.
        assert!(is_valid_onid_tsid(192, 1, 42));
        assert_eq!(build_namespace(192, 1, 42, h2), 0x00C00000);
    }

    #[test]
    fn namespace_folding_is_idempotent_over_frequency_subnetwork() {
        let onid = 7;
        let tsid = 55;
        let position = 100;
        assert!(is_valid_onid_tsid(position, onid, tsid));
        let h1 = 0xABCD_1234u32;
        let h2 = 0xABCD_0000u32;
        assert_eq!(
            build_namespace(position, onid, tsid, h1),
            build_namespace(position, onid, tsid, h2)
        );
    }
}
