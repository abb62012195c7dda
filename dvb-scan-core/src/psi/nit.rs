//! NIT (Network Information Table) parsing. Carried on PID 0x0010, table id
//! 0x40 (actual network) or 0x41 (other network).

use super::descriptors::{
    self, find_all_descriptors, find_descriptor, parse_descriptor_loop, tag,
    CableDeliveryDescriptor, FrequencyListDescriptor, LogicalChannelDescriptor,
    NetworkNameDescriptor, SatelliteDeliveryDescriptor, TerrestrialDeliveryDescriptor,
};
use super::section::PsiSection;
use super::table_id;

#[derive(Debug, Clone, Default)]
pub struct NitTransportStream {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub descriptors: Vec<u8>,
}

impl NitTransportStream {
    pub fn satellite_delivery(&self) -> Option<SatelliteDeliveryDescriptor> {
        find_descriptor(&self.descriptors, tag::SATELLITE_DELIVERY)
            .and_then(|d| SatelliteDeliveryDescriptor::parse(&d).ok())
    }

    pub fn cable_delivery(&self) -> Option<CableDeliveryDescriptor> {
        find_descriptor(&self.descriptors, tag::CABLE_DELIVERY)
            .and_then(|d| CableDeliveryDescriptor::parse(&d).ok())
    }

    pub fn terrestrial_delivery(&self) -> Option<TerrestrialDeliveryDescriptor> {
        find_descriptor(&self.descriptors, tag::TERRESTRIAL_DELIVERY)
            .and_then(|d| TerrestrialDeliveryDescriptor::parse(&d).ok())
    }

    pub fn frequency_lists(&self) -> Vec<FrequencyListDescriptor> {
        find_all_descriptors(&self.descriptors, tag::FREQUENCY_LIST)
            .iter()
            .filter_map(|d| FrequencyListDescriptor::parse(d).ok())
            .collect()
    }

    pub fn logical_channels(&self) -> Option<LogicalChannelDescriptor> {
        find_descriptor(&self.descriptors, tag::LOGICAL_CHANNEL)
            .and_then(|d| LogicalChannelDescriptor::parse(&d).ok())
    }

    pub fn all_descriptor_tags(&self) -> Vec<u8> {
        parse_descriptor_loop(&self.descriptors).into_iter().map(|(t, _)| t).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NitTable {
    pub network_id: u16,
    pub version_number: u8,
    pub network_descriptors: Vec<u8>,
    pub transport_streams: Vec<NitTransportStream>,
}

impl NitTable {
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        if section.header.table_id != table_id::NIT_ACTUAL && section.header.table_id != table_id::NIT_OTHER {
            return Err("not a NIT section");
        }

        let data = section.data;
        if data.len() < 2 {
            return Err("NIT data too short");
        }

        let network_descriptors_length = ((data[0] as usize & 0x0F) << 8) | data[1] as usize;
        if 2 + network_descriptors_length > data.len() {
            return Err("NIT network descriptor loop overruns section");
        }
        let network_descriptors = data[2..2 + network_descriptors_length].to_vec();

        let mut offset = 2 + network_descriptors_length;
        if offset + 2 > data.len() {
            return Err("NIT missing transport stream loop length");
        }
        let ts_loop_length = ((data[offset] as usize & 0x0F) << 8) | data[offset + 1] as usize;
        offset += 2;
        let ts_loop_end = offset + ts_loop_length;
        if ts_loop_end > data.len() {
            return Err("NIT transport stream loop overruns section");
        }

        let mut transport_streams = Vec::new();
        while offset + 6 <= ts_loop_end {
            let transport_stream_id = ((data[offset] as u16) << 8) | data[offset + 1] as u16;
            let original_network_id = ((data[offset + 2] as u16) << 8) | data[offset + 3] as u16;
            let descriptors_length = ((data[offset + 4] as usize & 0x0F) << 8) | data[offset + 5] as usize;
            offset += 6;
            if offset + descriptors_length > ts_loop_end {
                break;
            }
            let descriptors = data[offset..offset + descriptors_length].to_vec();
            offset += descriptors_length;

            transport_streams.push(NitTransportStream {
                transport_stream_id,
                original_network_id,
                descriptors,
            });
        }

        Ok(NitTable {
            network_id: section.header.table_id_extension,
            version_number: section.header.version_number,
            network_descriptors,
            transport_streams,
        })
    }

    pub fn network_name(&self) -> Option<String> {
        find_descriptor(&self.network_descriptors, tag::NETWORK_NAME)
            .and_then(|d| NetworkNameDescriptor::parse(&d).ok())
            .map(|d| d.network_name)
    }

    pub fn is_actual(&self, table_id_value: u8) -> bool {
        table_id_value == table_id::NIT_ACTUAL
    }
}

pub use descriptors::CaDescriptor;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::section::PsiHeader;

    fn build_nit_section(net_desc: &[u8], ts_descriptors: &[(u16, u16, Vec<u8>)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(0xF0 | ((net_desc.len() >> 8) as u8 & 0x0F));
        data.push(net_desc.len() as u8);
        data.extend_from_slice(net_desc);

        let mut ts_loop = Vec::new();
        for (tsid, onid, descs) in ts_descriptors {
            ts_loop.push((tsid >> 8) as u8);
            ts_loop.push(*tsid as u8);
            ts_loop.push((onid >> 8) as u8);
            ts_loop.push(*onid as u8);
            ts_loop.push(0xF0 | ((descs.len() >> 8) as u8 & 0x0F));
            ts_loop.push(descs.len() as u8);
            ts_loop.extend_from_slice(descs);
        }
        data.push(0xF0 | ((ts_loop.len() >> 8) as u8 & 0x0F));
        data.push(ts_loop.len() as u8);
        data.extend_from_slice(&ts_loop);
        data
    }

    #[test]
    fn parse_nit_with_one_satellite_transport_stream() {
        let mut sat_desc = vec![tag::SATELLITE_DELIVERY, 11];
        // frequency 11727.000 MHz BCD, orbital position 192 (19.2E), pol H, sym rate, fec
        sat_desc.extend_from_slice(&[0x11, 0x72, 0x70, 0x00, 0x01, 0x92, 0x00, 0x27, 0x50, 0x00, 0x02]);

        let data = build_nit_section(&[], &[(0x0001, 0x0002, sat_desc)]);
        let header = PsiHeader {
            table_id: table_id::NIT_ACTUAL,
            section_syntax_indicator: true,
            section_length: (data.len() + 5 + 4) as u16,
            table_id_extension: 0x0042,
            version_number: 0,
            current_next_indicator: true,
            section_number: 0,
            last_section_number: 0,
        };
        let section = PsiSection { header, data: &data, crc32: 0 };
        let nit = NitTable::parse(&section).unwrap();

        assert_eq!(nit.network_id, 0x0042);
        assert_eq!(nit.transport_streams.len(), 1);
        let ts = &nit.transport_streams[0];
        assert_eq!(ts.transport_stream_id, 1);
        assert_eq!(ts.original_network_id, 2);
        let sat = ts.satellite_delivery().unwrap();
        assert_eq!(sat.orbital_position, 192);
    }
}
