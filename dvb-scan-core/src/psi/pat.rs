//! PAT (Program Association Table) parsing. Carried on PID 0x0000; lists
//! every program number in the transport stream along with its PMT PID.

use super::section::PsiSection;
use super::table_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pid: u16,
}

#[derive(Debug, Clone, Default)]
pub struct PatTable {
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub programs: Vec<PatEntry>,
    pub nit_pid: Option<u16>,
}

impl PatTable {
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        if section.header.table_id != table_id::PAT {
            return Err("not a PAT section");
        }

        let mut pat = PatTable {
            transport_stream_id: section.header.table_id_extension,
            version_number: section.header.version_number,
            programs: Vec::new(),
            nit_pid: None,
        };

        let data = section.data;
        if data.len() % 4 != 0 {
            return Err("invalid PAT data length");
        }

        for chunk in data.chunks(4) {
            let program_number = ((chunk[0] as u16) << 8) | chunk[1] as u16;
            let pid = ((chunk[2] as u16 & 0x1F) << 8) | chunk[3] as u16;

            if program_number == 0 {
                pat.nit_pid = Some(pid);
            } else {
                pat.programs.push(PatEntry { program_number, pid });
            }
        }

        Ok(pat)
    }

    pub fn get_pmt_pid(&self, program_number: u16) -> Option<u16> {
        self.programs.iter().find(|p| p.program_number == program_number).map(|p| p.pid)
    }

    pub fn get_all_program_numbers(&self) -> Vec<u16> {
        self.programs.iter().map(|p| p.program_number).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::section::PsiHeader;

    #[test]
    fn parse_pat_with_two_programs() {
        let data = [0x01, 0x01, 0xE1, 0x00, 0x01, 0x02, 0xE2, 0x00];
        let header = PsiHeader {
            table_id: table_id::PAT,
            section_syntax_indicator: true,
            section_length: 17,
            table_id_extension: 0x1234,
            version_number: 1,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
        };
        let section = PsiSection { header, data: &data, crc32: 0 };
        let pat = PatTable::parse(&section).unwrap();

        assert_eq!(pat.transport_stream_id, 0x1234);
        assert_eq!(pat.programs.len(), 2);
        assert_eq!(pat.get_pmt_pid(0x0101), Some(0x0100));
        assert_eq!(pat.get_pmt_pid(0x0102), Some(0x0200));
    }

    #[test]
    fn pat_with_nit_entry() {
        let data = [0x00, 0x00, 0xE0, 0x10, 0x01, 0x01, 0xE1, 0x00];
        let header = PsiHeader {
            table_id: table_id::PAT,
            section_syntax_indicator: true,
            section_length: 17,
            table_id_extension: 0x1234,
            version_number: 0,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
        };
        let section = PsiSection { header, data: &data, crc32: 0 };
        let pat = PatTable::parse(&section).unwrap();

        assert_eq!(pat.nit_pid, Some(0x0010));
        assert_eq!(pat.programs.len(), 1);
    }
}
