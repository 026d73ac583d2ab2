//! Ethernet II header: 6-byte destination MAC, 6-byte source MAC,
//! 2-byte EtherType, 14 bytes total.

use super::require;
use crate::error::PacketError;

pub const HEADER_LEN: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Other(u16),
}

impl EtherType {
    pub fn as_u16(self) -> u16 {
        match self {
            EtherType::Ipv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::Other(v) => v,
        }
    }

    fn from_u16(v: u16) -> Self {
        match v {
            0x0800 => EtherType::Ipv4,
            0x0806 => EtherType::Arp,
            other => EtherType::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: [u8; 6],
    pub source: [u8; 6],
    pub ether_type: EtherType,
}

impl EthernetHeader {
    pub const LEN: usize = HEADER_LEN;

    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        require(bytes, Self::LEN)?;
        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];
        destination.copy_from_slice(&bytes[0..6]);
        source.copy_from_slice(&bytes[6..12]);
        let ether_type = EtherType::from_u16(u16::from_be_bytes([bytes[12], bytes[13]]));
        Ok(EthernetHeader {
            destination,
            source,
            ether_type,
        })
    }

    pub fn write(&self, buf: &mut [u8]) -> Result<usize, PacketError> {
        require(buf, Self::LEN)?;
        buf[0..6].copy_from_slice(&self.destination);
        buf[6..12].copy_from_slice(&self.source);
        buf[12..14].copy_from_slice(&self.ether_type.as_u16().to_be_bytes());
        Ok(Self::LEN)
    }

    pub fn header_length(&self) -> usize {
        Self::LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_parse_write() {
        let header = EthernetHeader {
            destination: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06],
            source: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
            ether_type: EtherType::Ipv4,
        };
        let mut buf = [0u8; HEADER_LEN];
        header.write(&mut buf).unwrap();
        let parsed = EthernetHeader::parse(&buf).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn rejects_short_slice() {
        let buf = [0u8; 13];
        assert!(matches!(
            EthernetHeader::parse(&buf),
            Err(PacketError::PacketTooShort)
        ));
    }

    #[test]
    fn cross_validates_against_etherparse() {
        let header = EthernetHeader {
            destination: [1, 2, 3, 4, 5, 6],
            source: [7, 8, 9, 10, 11, 12],
            ether_type: EtherType::Other(0x88b5),
        };
        let mut buf = [0u8; HEADER_LEN];
        header.write(&mut buf).unwrap();
        match etherparse::SlicedPacket::from_ethernet(&buf) {
            Ok(packet) => {
                let link = packet.link.expect("ethernet link layer present");
                if let etherparse::LinkSlice::Ethernet2(eth) = link {
                    assert_eq!(eth.destination(), header.destination);
                    assert_eq!(eth.source(), header.source);
                    assert_eq!(eth.ether_type().0, header.ether_type.as_u16());
                } else {
                    panic!("expected an Ethernet2 link slice");
                }
            }
            Err(e) => panic!("etherparse failed to parse our header: {e}"),
        }
    }
}
