//! PMT (Program Map Table) parsing. One PMT per program number, located at
//! the PID the PAT pointed to.

use super::section::PsiSection;
use super::table_id;

pub mod stream_type {
    pub const MPEG1_VIDEO: u8 = 0x01;
    pub const MPEG2_VIDEO: u8 = 0x02;
    pub const MPEG1_AUDIO: u8 = 0x03;
    pub const MPEG2_AUDIO: u8 = 0x04;
    pub const PRIVATE_SECTIONS: u8 = 0x05;
    pub const PES_PRIVATE_DATA: u8 = 0x06;
    pub const AAC_AUDIO: u8 = 0x0F;
    pub const AAC_LATM: u8 = 0x11;
    pub const H264_VIDEO: u8 = 0x1B;
    pub const H265_VIDEO: u8 = 0x24;
    pub const USER_PRIVATE_81: u8 = 0x81;
    pub const SMPTE_VC1: u8 = 0xEA;
}

#[derive(Debug, Clone, Default)]
pub struct PmtStream {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: Vec<u8>,
}

impl PmtStream {
    pub fn stream_type_name(&self) -> &'static str {
        use stream_type::*;
        match self.stream_type {
            MPEG1_VIDEO => "MPEG-1 video",
            MPEG2_VIDEO => "MPEG-2 video",
            MPEG1_AUDIO => "MPEG-1 audio",
            MPEG2_AUDIO => "MPEG-2 audio",
            PRIVATE_SECTIONS => "private sections",
            PES_PRIVATE_DATA => "PES private data",
            AAC_AUDIO => "AAC audio",
            AAC_LATM => "AAC LATM audio",
            H264_VIDEO => "H.264 video",
            H265_VIDEO => "H.265 video",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PmtTable {
    pub program_number: u16,
    pub version_number: u8,
    pub pcr_pid: u16,
    pub program_info: Vec<u8>,
    pub streams: Vec<PmtStream>,
}

impl PmtTable {
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        if section.header.table_id != table_id::PMT {
            return Err("not a PMT section");
        }

        let data = section.data;
        if data.len() < 4 {
            return Err("PMT data too short");
        }

        let pcr_pid = ((data[0] as u16 & 0x1F) << 8) | data[1] as u16;
        let program_info_length = ((data[2] as usize & 0x0F) << 8) | data[3] as usize;

        if 4 + program_info_length > data.len() {
            return Err("PMT program info length overruns section");
        }
        let program_info = data[4..4 + program_info_length].to_vec();

        let mut pmt = PmtTable {
            program_number: section.header.table_id_extension,
            version_number: section.header.version_number,
            pcr_pid,
            program_info,
            streams: Vec::new(),
        };

        let mut offset = 4 + program_info_length;
        while offset + 5 <= data.len() {
            let stream_type = data[offset];
            let elementary_pid = ((data[offset + 1] as u16 & 0x1F) << 8) | data[offset + 2] as u16;
            let es_info_length = ((data[offset + 3] as usize & 0x0F) << 8) | data[offset + 4] as usize;
            offset += 5;
            if offset + es_info_length > data.len() {
                break;
            }
            let descriptors = data[offset..offset + es_info_length].to_vec();
            offset += es_info_length;

            pmt.streams.push(PmtStream {
                stream_type,
                elementary_pid,
                descriptors,
            });
        }

        Ok(pmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::section::PsiHeader;

    #[test]
    fn parse_pmt_with_video_and_audio_stream() {
        let data = [
            0xE1, 0x00, // PCR PID
            0x00, 0x00, // program_info_length = 0
            stream_type::H264_VIDEO, 0xE1, 0x01, 0x00, 0x00,
            stream_type::MPEG2_AUDIO, 0xE1, 0x02, 0x00, 0x00,
        ];
        let header = PsiHeader {
            table_id: table_id::PMT,
            section_syntax_indicator: true,
            section_length: (data.len() + 5 + 4) as u16,
            table_id_extension: 0x0010,
            version_number: 0,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
        };
        let section = PsiSection { header, data: &data, crc32: 0 };
        let pmt = PmtTable::parse(&section).unwrap();

        assert_eq!(pmt.program_number, 0x0010);
        assert_eq!(pmt.pcr_pid, 0x0100);
        assert_eq!(pmt.streams.len(), 2);
        assert_eq!(pmt.streams[0].stream_type, stream_type::H264_VIDEO);
        assert_eq!(pmt.streams[1].stream_type, stream_type::MPEG2_AUDIO);
    }
}
