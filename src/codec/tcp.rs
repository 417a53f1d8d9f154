// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MBAP framing.
//!
//! Pure functions without any I/O. All multi-byte fields are big-endian.

use byteorder::{BigEndian, ByteOrder as _};

use crate::{
    frame::tcp::{
        offset, Sft, LENGTH_FIELD_END, PRESET_REQ_LENGTH, PRESET_RSP_LENGTH, PROTOCOL_ID,
    },
    Address, FunctionCode, ProtocolError, Quantity,
};

use super::u16_len;

/// Build the first 12 bytes of a request ADU.
///
/// The length field is left zeroed, see [`finalize_length`].
#[must_use]
pub fn build_request_header(
    transaction_id: u16,
    unit_id: u8,
    function: FunctionCode,
    address: Address,
    count: Quantity,
) -> [u8; PRESET_REQ_LENGTH] {
    let mut req = [0; PRESET_REQ_LENGTH];
    BigEndian::write_u16(&mut req[offset::TRANSACTION_ID..], transaction_id);
    BigEndian::write_u16(&mut req[offset::PROTOCOL_ID..], PROTOCOL_ID);
    req[offset::UNIT_ID] = unit_id;
    req[offset::FUNCTION] = function.value();
    BigEndian::write_u16(&mut req[offset::DATA..], address);
    BigEndian::write_u16(&mut req[offset::DATA + 2..], count);
    req
}

/// Write the MBAP length field for an ADU of `total_length` bytes.
///
/// Returns `total_length`.
///
/// # Panics
///
/// Panics if `total_length` is shorter than the fields in front of the
/// unit identifier or longer than `adu`.
pub fn finalize_length(adu: &mut [u8], total_length: usize) -> usize {
    assert!(
        total_length >= LENGTH_FIELD_END && total_length <= adu.len(),
        "invalid ADU length {total_length}"
    );
    let mbap_length = u16_len(total_length - LENGTH_FIELD_END);
    BigEndian::write_u16(&mut adu[offset::LENGTH..], mbap_length);
    total_length
}

/// Write the response header for `sft` into `adu`.
///
/// Returns the number of bytes written, i.e. the offset of the PDU data.
pub fn build_response_header(sft: &Sft, adu: &mut [u8]) -> usize {
    BigEndian::write_u16(&mut adu[offset::TRANSACTION_ID..], sft.transaction_id);
    BigEndian::write_u16(&mut adu[offset::PROTOCOL_ID..], PROTOCOL_ID);
    // Set by `finalize_length()`
    BigEndian::write_u16(&mut adu[offset::LENGTH..], 0);
    adu[offset::UNIT_ID] = sft.unit_id;
    adu[offset::FUNCTION] = sft.function.value();
    PRESET_RSP_LENGTH
}

#[must_use]
pub fn extract_transaction_id(adu: &[u8]) -> u16 {
    BigEndian::read_u16(&adu[offset::TRANSACTION_ID..])
}

#[must_use]
pub fn extract_protocol_id(adu: &[u8]) -> u16 {
    BigEndian::read_u16(&adu[offset::PROTOCOL_ID..])
}

/// Fail unless the protocol identifier of `adu` is zero.
///
/// Any non-zero byte is rejected.
pub fn check_protocol_id(adu: &[u8]) -> Result<(), ProtocolError> {
    match extract_protocol_id(adu) {
        PROTOCOL_ID => Ok(()),
        protocol_id => Err(ProtocolError::BadProtocolId(protocol_id)),
    }
}

/// Validate the header of `response` against the `request` it answers.
pub fn check_response_header(request: &[u8], response: &[u8]) -> Result<(), ProtocolError> {
    let expected = extract_transaction_id(request);
    let actual = extract_transaction_id(response);
    if expected != actual {
        return Err(ProtocolError::TransactionMismatch { expected, actual });
    }
    check_protocol_id(response)
}
