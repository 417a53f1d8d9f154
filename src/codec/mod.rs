// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Byte-level encoding helpers.

use crate::{bytes::BytesMut, frame::Coil};

pub mod tcp;

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u16_len(len: usize) -> u16 {
    // This type conversion should always be safe, because either
    // the caller is responsible to pass a valid usize or the
    // possible values are limited by the protocol.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u8_len(len: usize) -> u8 {
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

pub(crate) fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

pub(crate) fn coil_to_bool(coil: u16) -> Option<bool> {
    match coil {
        0xFF00 => Some(true),
        0x0000 => Some(false),
        _ => None,
    }
}

pub(crate) fn packed_coils_size(count: usize) -> usize {
    (count + 7) / 8
}

pub(crate) fn encode_packed_coils(buf: &mut BytesMut, coils: &[Coil]) -> usize {
    let packed_coils_size = packed_coils_size(coils.len());
    let offset = buf.len();
    buf.resize(offset + packed_coils_size, 0);
    let buf = &mut buf[offset..];
    for (i, b) in coils.iter().enumerate() {
        let v = u8::from(*b); // 0 or 1
        buf[i / 8] |= v << (i % 8);
    }
    packed_coils_size
}

/// Unpack `count` bits, LSB first.
///
/// Bits beyond the end of `bytes` are read as `false`.
pub(crate) fn decode_packed_coils(bytes: &[u8], count: u16) -> Vec<Coil> {
    (0usize..count.into())
        .map(|i| bytes.get(i / 8).map_or(false, |b| (b >> (i % 8)) & 0b1 > 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_packed_coils_to_bytes(coils: &[Coil]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_packed_coils(&mut buf, coils);
        buf.to_vec()
    }

    #[test]
    fn convert_bool_to_coil() {
        assert_eq!(bool_to_coil(true), 0xFF00);
        assert_eq!(bool_to_coil(false), 0x0000);
    }

    #[test]
    fn convert_coil_to_bool() {
        assert_eq!(coil_to_bool(0xFF00), Some(true));
        assert_eq!(coil_to_bool(0x0000), Some(false));
        assert_eq!(coil_to_bool(0x0001), None);
    }

    #[test]
    fn convert_booleans_to_bytes() {
        assert_eq!(encode_packed_coils_to_bytes(&[]), &[] as &[u8]);
        assert_eq!(encode_packed_coils_to_bytes(&[true]), &[0b1]);
        assert_eq!(encode_packed_coils_to_bytes(&[false]), &[0b0]);
        assert_eq!(encode_packed_coils_to_bytes(&[true, false]), &[0b_01]);
        assert_eq!(encode_packed_coils_to_bytes(&[false, true]), &[0b_10]);
        assert_eq!(encode_packed_coils_to_bytes(&[true; 8]), &[0b_1111_1111]);
        assert_eq!(encode_packed_coils_to_bytes(&[true; 9]), &[255, 1]);
        assert_eq!(encode_packed_coils_to_bytes(&[false; 9]), &[0, 0]);
    }

    #[test]
    fn test_unpack_bits() {
        assert_eq!(decode_packed_coils(&[], 0), &[] as &[bool]);
        assert_eq!(decode_packed_coils(&[0, 0], 0), &[] as &[bool]);
        assert_eq!(decode_packed_coils(&[0b1], 1), &[true]);
        assert_eq!(decode_packed_coils(&[0b01], 2), &[true, false]);
        assert_eq!(decode_packed_coils(&[0b10], 2), &[false, true]);
        assert_eq!(decode_packed_coils(&[0b101], 3), &[true, false, true]);
        assert_eq!(decode_packed_coils(&[0xff, 0b11], 10), &[true; 10]);
        assert_eq!(decode_packed_coils(&[0xff], 9)[8], false);
    }
}
