//! PMT classifier: decides whether a program carries video, audio, both, or
//! neither, and whether it is scrambled.
//!
//! The descriptor inspection in the fallthrough cases mirrors the original
//! C++ switch literally, including that the CA-descriptor scan runs for
//! every recognized stream type regardless of whether the type alone
//! already decided video/audio, not just for the "inspect descriptors"
//! cases. Don't "simplify" this into an early return per stream type.

use crate::psi::descriptors::{find_descriptor, parse_descriptor_loop, parse_registration_descriptor, tag};
use crate::psi::pmt::{stream_type, PmtStream, PmtTable};

pub const MPEG4_VISUAL: u8 = 0x10;

const VIDEO_DESCRIPTOR_TAGS: [u8; 3] = [0x1B, 0x28, tag::VIDEO_STREAM];
const AUDIO_DESCRIPTOR_TAGS: [u8; 6] = [0x1C, 0x2B, tag::AAC, tag::AC3, tag::DTS, tag::AUDIO_STREAM];

const AUDIO_FORMAT_IDENTIFIERS: [u32; 4] = [
    0x4454_5331, // "DTS1"
    0x4454_5332, // "DTS2"
    0x4454_5333, // "DTS3"
    0x4143_2d33, // "AC-3"
];
const BSSD_FORMAT_IDENTIFIER: u32 = 0x4253_5344;
const VC1_FORMAT_IDENTIFIER: u32 = 0x5643_2d31;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifiedStream {
    pub is_video: bool,
    pub is_audio: bool,
}

/// Classifies one elementary stream. Runs the descriptor inspection
/// (including the CA-descriptor scrambled check) for every recognized
/// stream type, applying the re-classification from descriptor tags only
/// when the stream type itself did not already force video or audio.
pub fn classify_stream(stream: &PmtStream) -> (ClassifiedStream, bool) {
    let mut forced_video = matches!(
        stream.stream_type,
        stream_type::MPEG1_VIDEO | stream_type::MPEG2_VIDEO | MPEG4_VISUAL | stream_type::H264_VIDEO
    );
    let mut forced_audio = matches!(
        stream.stream_type,
        stream_type::MPEG1_AUDIO | stream_type::MPEG2_AUDIO | stream_type::AAC_AUDIO | stream_type::AAC_LATM
    );

    let inspectable = forced_video
        || forced_audio
        || matches!(
            stream.stream_type,
            stream_type::PES_PRIVATE_DATA | stream_type::USER_PRIVATE_81 | stream_type::SMPTE_VC1
        );

    let mut scrambled = false;

    if inspectable {
        for (tag_value, payload) in parse_descriptor_loop(&stream.descriptors) {
            if tag_value == tag::CA {
                scrambled = true;
                continue;
            }
            if forced_video || forced_audio {
                continue;
            }
            if AUDIO_DESCRIPTOR_TAGS.contains(&tag_value) {
                forced_audio = true;
            } else if VIDEO_DESCRIPTOR_TAGS.contains(&tag_value) {
                forced_video = true;
            } else if tag_value == tag::REGISTRATION {
                if let Some(format_id) = parse_registration_descriptor(&payload) {
                    if AUDIO_FORMAT_IDENTIFIERS.contains(&format_id) || format_id == BSSD_FORMAT_IDENTIFIER {
                        forced_audio = true;
                    } else if format_id == VC1_FORMAT_IDENTIFIER {
                        forced_video = true;
                    }
                }
            }
        }
    }

    (
        ClassifiedStream {
            is_video: forced_video,
            is_audio: forced_audio,
        },
        scrambled,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmtServiceType {
    Video = 1,
    Audio = 2,
    Data = 100,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PmtClassification {
    pub has_video: bool,
    pub has_audio: bool,
    pub scrambled: bool,
}

impl PmtClassification {
    pub fn service_type(&self) -> PmtServiceType {
        if self.has_video {
            PmtServiceType::Video
        } else if self.has_audio {
            PmtServiceType::Audio
        } else {
            PmtServiceType::Data
        }
    }
}

/// Classifies a whole PMT: aggregate video/audio presence across all
/// elementary streams, plus scrambled if any per-ES or program-level CA
/// descriptor is present.
pub fn classify_pmt(pmt: &PmtTable) -> PmtClassification {
    let mut result = PmtClassification::default();

    if find_descriptor(&pmt.program_info, tag::CA).is_some() {
        result.scrambled = true;
    }

    for stream in &pmt.streams {
        let (classified, scrambled) = classify_stream(stream);
        result.has_video |= classified.is_video;
        result.has_audio |= classified.is_audio;
        result.scrambled |= scrambled;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(stream_type: u8, descriptors: Vec<u8>) -> PmtStream {
        PmtStream {
            stream_type,
            elementary_pid: 0x100,
            descriptors,
        }
    }

    // S5: h264 + mpeg2 audio -> video wins.
    #[test]
    fn s5_video_and_audio_stream_types_classify_as_video() {
        let pmt = PmtTable {
            program_number: 1,
            version_number: 0,
            pcr_pid: 0x100,
            program_info: vec![],
            streams: vec![
                stream(stream_type::H264_VIDEO, vec![]),
                stream(stream_type::MPEG2_AUDIO, vec![]),
            ],
        };
        assert_eq!(classify_pmt(&pmt).service_type(), PmtServiceType::Video);
    }

    #[test]
    fn s5_private_stream_with_ac3_registration_classifies_as_audio() {
        let mut descriptors = vec![tag::REGISTRATION, 4];
        descriptors.extend_from_slice(b"AC-3");
        let pmt = PmtTable {
            program_number: 1,
            version_number: 0,
            pcr_pid: 0x100,
            program_info: vec![],
            streams: vec![stream(stream_type::MPEG2_AUDIO, vec![]), stream(stream_type::PES_PRIVATE_DATA, descriptors)],
        };
        assert_eq!(classify_pmt(&pmt).service_type(), PmtServiceType::Audio);
    }

    #[test]
    fn private_stream_with_ac3_descriptor_tag_classifies_as_audio() {
        let descriptors = vec![tag::AC3, 1, 0x00];
        let pmt = PmtTable {
            program_number: 1,
            version_number: 0,
            pcr_pid: 0x100,
            program_info: vec![],
            streams: vec![stream(stream_type::PES_PRIVATE_DATA, descriptors)],
        };
        assert_eq!(classify_pmt(&pmt).service_type(), PmtServiceType::Audio);
    }

    #[test]
    fn private_stream_with_video_stream_descriptor_tag_classifies_as_video() {
        let descriptors = vec![tag::VIDEO_STREAM, 1, 0x00];
        let pmt = PmtTable {
            program_number: 1,
            version_number: 0,
            pcr_pid: 0x100,
            program_info: vec![],
            streams: vec![stream(stream_type::USER_PRIVATE_81, descriptors)],
        };
        assert_eq!(classify_pmt(&pmt).service_type(), PmtServiceType::Video);
    }

    #[test]
    fn s5_private_stream_with_no_recognizable_descriptor_is_data() {
        let pmt = PmtTable {
            program_number: 1,
            version_number: 0,
            pcr_pid: 0x100,
            program_info: vec![],
            streams: vec![stream(stream_type::PES_PRIVATE_DATA, vec![])],
        };
        assert_eq!(classify_pmt(&pmt).service_type(), PmtServiceType::Data);
    }

    #[test]
    fn ca_descriptor_on_video_stream_still_marks_scrambled() {
        let mut descriptors = vec![tag::CA, 4, 0x09, 0x00, 0xE0, 0x30];
        descriptors.truncate(6);
        let pmt = PmtTable {
            program_number: 1,
            version_number: 0,
            pcr_pid: 0x100,
            program_info: vec![],
            streams: vec![stream(stream_type::H264_VIDEO, descriptors)],
        };
        let c = classify_pmt(&pmt);
        assert!(c.scrambled);
        assert_eq!(c.service_type(), PmtServiceType::Video);
    }
}
