//! SDT (Service Description Table) parsing. Carried on PID 0x0011, table id
//! 0x42 (actual TS) or 0x46 (other TS).

use super::descriptors::{find_all_descriptors, find_descriptor, tag, ServiceDescriptor};
use super::section::PsiSection;
use super::table_id;

#[derive(Debug, Clone, Default)]
pub struct SdtService {
    pub service_id: u16,
    pub eit_schedule_flag: bool,
    pub eit_present_following_flag: bool,
    pub running_status: u8,
    pub free_ca_mode: bool,
    pub descriptors: Vec<u8>,
    pub service_descriptor: Option<ServiceDescriptor>,
    pub ca_system_ids: Vec<u16>,
}

impl SdtService {
    pub fn parse_descriptors(&mut self) {
        if let Some(data) = find_descriptor(&self.descriptors, tag::SERVICE) {
            if let Ok(desc) = ServiceDescriptor::parse(&data) {
                self.service_descriptor = Some(desc);
            }
        }
        self.ca_system_ids = find_all_descriptors(&self.descriptors, tag::CA)
            .iter()
            .filter_map(|d| super::descriptors::CaDescriptor::parse(d).ok())
            .map(|d| d.ca_system_id)
            .collect();
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_descriptor.as_ref().map(|d| d.service_name.as_str())
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.service_descriptor.as_ref().map(|d| d.provider_name.as_str())
    }

    pub fn service_type(&self) -> Option<u8> {
        self.service_descriptor.as_ref().map(|d| d.service_type)
    }

    /// True when a per-service CA descriptor is present (not the only source
    /// of "scrambled"; cross-referencing the PMT entry is done by the SDT
    /// processor).
    pub fn has_ca_descriptor(&self) -> bool {
        !self.ca_system_ids.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SdtTable {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub version_number: u8,
    pub services: Vec<SdtService>,
}

impl SdtTable {
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        if section.header.table_id != table_id::SDT_ACTUAL && section.header.table_id != table_id::SDT_OTHER {
            return Err("not an SDT section");
        }

        let data = section.data;
        if data.len() < 3 {
            return Err("SDT data too short");
        }

        let original_network_id = ((data[0] as u16) << 8) | data[1] as u16;

        let mut sdt = SdtTable {
            transport_stream_id: section.header.table_id_extension,
            original_network_id,
            version_number: section.header.version_number,
            services: Vec::new(),
        };

        let mut offset = 3;
        while offset + 5 <= data.len() {
            let service_id = ((data[offset] as u16) << 8) | data[offset + 1] as u16;
            let eit_schedule_flag = data[offset + 2] & 0x02 != 0;
            let eit_present_following_flag = data[offset + 2] & 0x01 != 0;
            let running_status = (data[offset + 3] >> 5) & 0x07;
            let free_ca_mode = data[offset + 3] & 0x10 != 0;
            let descriptors_length = ((data[offset + 3] as usize & 0x0F) << 8) | data[offset + 4] as usize;

            offset += 5;
            if offset + descriptors_length > data.len() {
                break;
            }

            let descriptors = data[offset..offset + descriptors_length].to_vec();
            offset += descriptors_length;

            let mut service = SdtService {
                service_id,
                eit_schedule_flag,
                eit_present_following_flag,
                running_status,
                free_ca_mode,
                descriptors,
                service_descriptor: None,
                ca_system_ids: Vec::new(),
            };
            service.parse_descriptors();
            sdt.services.push(service);
        }

        Ok(sdt)
    }

    pub fn is_actual(&self, table_id_value: u8) -> bool {
        table_id_value == table_id::SDT_ACTUAL
    }

    pub fn find_service(&self, service_id: u16) -> Option<&SdtService> {
        self.services.iter().find(|s| s.service_id == service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::section::PsiHeader;

    #[test]
    fn parse_sdt_extracts_service_descriptor() {
        let data = [
            0x7F, 0xE0, 0xFF, 0x01, 0x01, 0x01, 0x80, 0x0C, 0x48, 0x0A, 0x01, 0x03, b'A', b'B',
            b'C', 0x04, b'C', b'H', b'0', b'1',
        ];
        let header = PsiHeader {
            table_id: table_id::SDT_ACTUAL,
            section_syntax_indicator: true,
            section_length: 25,
            table_id_extension: 0x7FE1,
            version_number: 1,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
        };
        let section = PsiSection { header, data: &data, crc32: 0 };
        let sdt = SdtTable::parse(&section).unwrap();

        assert_eq!(sdt.transport_stream_id, 0x7FE1);
        assert_eq!(sdt.original_network_id, 0x7FE0);
        assert_eq!(sdt.services.len(), 1);

        let service = &sdt.services[0];
        assert_eq!(service.service_id, 0x0101);
        assert_eq!(service.service_type(), Some(0x01));
        assert_eq!(service.provider_name(), Some("ABC"));
        assert_eq!(service.service_name(), Some("CH01"));
    }
}
