// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use byteorder::{BigEndian, ByteOrder as _};

use super::FunctionCode;

pub(crate) type TransactionId = u16;
pub(crate) type UnitId = u8;

/// Length of the MBAP header: transaction id, protocol id, length, unit id.
pub const HEADER_LENGTH: usize = 7;

/// Maximum size of a TCP ADU (MBAP header + PDU).
pub const MAX_ADU_LENGTH: usize = 260;

/// The only protocol identifier defined for Modbus.
pub(crate) const PROTOCOL_ID: u16 = 0x0000;

/// Request header plus function code, address and quantity.
pub(crate) const PRESET_REQ_LENGTH: usize = 12;

/// Response header plus function code.
pub(crate) const PRESET_RSP_LENGTH: usize = 8;

/// Number of bytes in front of the MBAP length field's coverage.
pub(crate) const LENGTH_FIELD_END: usize = 6;

/// Byte offsets of the ADU fields.
pub(crate) mod offset {
    pub(crate) const TRANSACTION_ID: usize = 0;
    pub(crate) const PROTOCOL_ID: usize = 2;
    pub(crate) const LENGTH: usize = 4;
    pub(crate) const UNIT_ID: usize = 6;
    pub(crate) const FUNCTION: usize = 7;
    pub(crate) const DATA: usize = 8;
}

/// A decoded MBAP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transaction_id: TransactionId,
    pub protocol_id: u16,
    /// Number of bytes following the length field, i.e. the ADU
    /// length minus 6.
    pub length: u16,
    pub unit_id: UnitId,
}

impl Header {
    /// Decode the header from the first [`HEADER_LENGTH`] bytes of `adu`.
    ///
    /// Returns `None` if `adu` is too short.
    #[must_use]
    pub fn parse(adu: &[u8]) -> Option<Self> {
        if adu.len() < HEADER_LENGTH {
            return None;
        }
        Some(Self {
            transaction_id: BigEndian::read_u16(&adu[offset::TRANSACTION_ID..]),
            protocol_id: BigEndian::read_u16(&adu[offset::PROTOCOL_ID..]),
            length: BigEndian::read_u16(&adu[offset::LENGTH..]),
            unit_id: adu[offset::UNIT_ID],
        })
    }

    /// Encode the header into its wire representation.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut bytes = [0; HEADER_LENGTH];
        BigEndian::write_u16(&mut bytes[offset::TRANSACTION_ID..], self.transaction_id);
        BigEndian::write_u16(&mut bytes[offset::PROTOCOL_ID..], self.protocol_id);
        BigEndian::write_u16(&mut bytes[offset::LENGTH..], self.length);
        bytes[offset::UNIT_ID] = self.unit_id;
        bytes
    }

    /// Total ADU length announced by this header.
    #[must_use]
    pub fn adu_length(&self) -> usize {
        LENGTH_FIELD_END + usize::from(self.length)
    }
}

/// Correlation data carried from a request into its response.
///
/// The transaction id is echoed verbatim, which is what lets a client
/// match the response to its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sft {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
    pub function: FunctionCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header() {
        let adu = [0x12, 0x34, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03];
        let hdr = Header::parse(&adu).unwrap();
        assert_eq!(
            hdr,
            Header {
                transaction_id: 0x1234,
                protocol_id: 0,
                length: 6,
                unit_id: 0x11,
            }
        );
        assert_eq!(hdr.adu_length(), 12);
    }

    #[test]
    fn parse_header_fragment() {
        assert!(Header::parse(&[0x00, 0x11, 0x00, 0x00, 0x00, 0x00]).is_none());
    }

    #[test]
    fn header_to_bytes() {
        let hdr = Header {
            transaction_id: 0xABCD,
            protocol_id: 0x0102,
            length: 0x0304,
            unit_id: 0xFF,
        };
        assert_eq!(
            hdr.to_bytes(),
            [0xAB, 0xCD, 0x01, 0x02, 0x03, 0x04, 0xFF]
        );
        assert_eq!(Header::parse(&hdr.to_bytes()), Some(hdr));
    }
}
