// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Register mapping store
//!
//! The server hands every decoded request to a [`Mapping`]. [`RegisterMap`]
//! is a ready-to-use in-memory implementation with coils, discrete inputs,
//! holding registers and input registers.

use std::ops::DerefMut;

use byteorder::{BigEndian, ByteOrder as _};

use crate::{
    bytes::{BufMut as _, BytesMut},
    codec::{coil_to_bool, decode_packed_coils, encode_packed_coils, packed_coils_size, u8_len},
    Address, Coil, ExceptionCode, FunctionCode, Quantity, Word,
};

pub const MAX_READ_BITS: Quantity = 2000;
pub const MAX_WRITE_BITS: Quantity = 1968;
pub const MAX_READ_REGISTERS: Quantity = 125;
pub const MAX_WRITE_REGISTERS: Quantity = 123;
pub const MAX_WR_WRITE_REGISTERS: Quantity = 121;

/// A request PDU split into the fields shared by most function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRequest<'a> {
    pub function: FunctionCode,
    /// First big-endian word after the function code, `0` if absent.
    pub address: Address,
    /// Second big-endian word after the function code, `0` if absent.
    ///
    /// Holds the value for single writes.
    pub count: Quantity,
    /// Everything after `address` and `count`, or all data following the
    /// function code if the PDU is shorter than five bytes.
    pub payload: &'a [u8],
    /// All data following the function code.
    pub data: &'a [u8],
}

impl<'a> MappingRequest<'a> {
    /// Split a PDU (function code and data).
    #[must_use]
    pub fn from_pdu(pdu: &'a [u8]) -> Option<Self> {
        let (&function, data) = pdu.split_first()?;
        let function = FunctionCode::new(function);
        let req = if data.len() >= 4 {
            Self {
                function,
                address: BigEndian::read_u16(&data[0..2]),
                count: BigEndian::read_u16(&data[2..4]),
                payload: &data[4..],
                data,
            }
        } else {
            Self {
                function,
                address: 0,
                count: 0,
                payload: data,
                data,
            }
        };
        Some(req)
    }
}

/// The store behind a server.
pub trait Mapping {
    /// Handle `req` and append the response data (everything after the
    /// function code) to `rsp`.
    ///
    /// Returning [`ExceptionCode::IllegalFunction`] marks the function as
    /// unsupported.
    fn handle(
        &mut self,
        req: &MappingRequest<'_>,
        rsp: &mut BytesMut,
    ) -> Result<(), ExceptionCode>;
}

impl<D> Mapping for D
where
    D: DerefMut + ?Sized,
    D::Target: Mapping,
{
    fn handle(
        &mut self,
        req: &MappingRequest<'_>,
        rsp: &mut BytesMut,
    ) -> Result<(), ExceptionCode> {
        self.deref_mut().handle(req, rsp)
    }
}

/// A contiguous block of items starting at a protocol address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table<T> {
    start: Address,
    values: Vec<T>,
}

impl<T: Copy + Default> Table<T> {
    #[must_use]
    pub fn new(start: Address, len: usize) -> Self {
        Self {
            start,
            values: vec![T::default(); len],
        }
    }

    #[must_use]
    pub fn start(&self) -> Address {
        self.start
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, addr: Address) -> Option<T> {
        self.range(addr, 1).map(|r| r[0])
    }

    /// Set a single value, returning `false` if `addr` is unmapped.
    pub fn set(&mut self, addr: Address, value: T) -> bool {
        match self.range_mut(addr, 1) {
            Some(r) => {
                r[0] = value;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn range(&self, addr: Address, cnt: Quantity) -> Option<&[T]> {
        let (from, to) = self.bounds(addr, cnt)?;
        Some(&self.values[from..to])
    }

    pub fn range_mut(&mut self, addr: Address, cnt: Quantity) -> Option<&mut [T]> {
        let (from, to) = self.bounds(addr, cnt)?;
        Some(&mut self.values[from..to])
    }

    fn bounds(&self, addr: Address, cnt: Quantity) -> Option<(usize, usize)> {
        let from = usize::from(addr.checked_sub(self.start)?);
        let to = from + usize::from(cnt);
        (to <= self.values.len()).then_some((from, to))
    }
}

/// In-memory register mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterMap {
    pub coils: Table<Coil>,
    pub discrete_inputs: Table<Coil>,
    pub holding_registers: Table<Word>,
    pub input_registers: Table<Word>,
}

impl RegisterMap {
    /// An empty map, every address answers `IllegalDataAddress`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure_coils(&mut self, start: Address, len: usize) -> &mut Self {
        self.coils = Table::new(start, len);
        self
    }

    pub fn configure_discrete_inputs(&mut self, start: Address, len: usize) -> &mut Self {
        self.discrete_inputs = Table::new(start, len);
        self
    }

    pub fn configure_holding_registers(&mut self, start: Address, len: usize) -> &mut Self {
        self.holding_registers = Table::new(start, len);
        self
    }

    pub fn configure_input_registers(&mut self, start: Address, len: usize) -> &mut Self {
        self.input_registers = Table::new(start, len);
        self
    }
}

fn check_quantity(cnt: Quantity, max: Quantity) -> Result<(), ExceptionCode> {
    if cnt == 0 || cnt > max {
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}

fn read_bits(
    table: &Table<Coil>,
    addr: Address,
    cnt: Quantity,
    rsp: &mut BytesMut,
) -> Result<(), ExceptionCode> {
    check_quantity(cnt, MAX_READ_BITS)?;
    let bits = table.range(addr, cnt).ok_or(ExceptionCode::IllegalDataAddress)?;
    rsp.put_u8(u8_len(packed_coils_size(bits.len())));
    encode_packed_coils(rsp, bits);
    Ok(())
}

fn read_registers(
    table: &Table<Word>,
    addr: Address,
    cnt: Quantity,
    rsp: &mut BytesMut,
) -> Result<(), ExceptionCode> {
    check_quantity(cnt, MAX_READ_REGISTERS)?;
    let words = table.range(addr, cnt).ok_or(ExceptionCode::IllegalDataAddress)?;
    rsp.put_u8(u8_len(words.len() * 2));
    for w in words {
        rsp.put_u16(*w);
    }
    Ok(())
}

/// Split `byte_count` prefixed data, checking it against `expected` bytes.
fn counted_data(payload: &[u8], expected: usize) -> Result<&[u8], ExceptionCode> {
    let (&byte_count, data) = payload.split_first().ok_or(ExceptionCode::IllegalDataValue)?;
    if usize::from(byte_count) != expected || data.len() < expected {
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(&data[..expected])
}

/// Fail unless the request carries exactly `len` bytes after the function
/// code.
fn check_data_len(data: &[u8], len: usize) -> Result<(), ExceptionCode> {
    if data.len() != len {
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}

/// Fail unless the request carries at least `len` bytes after the function
/// code.
fn check_min_data_len(data: &[u8], len: usize) -> Result<(), ExceptionCode> {
    if data.len() < len {
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}

fn decode_words(data: &[u8]) -> impl Iterator<Item = Word> + '_ {
    data.chunks_exact(2).map(BigEndian::read_u16)
}

impl Mapping for RegisterMap {
    fn handle(
        &mut self,
        req: &MappingRequest<'_>,
        rsp: &mut BytesMut,
    ) -> Result<(), ExceptionCode> {
        use FunctionCode::*;

        let MappingRequest {
            function,
            address: addr,
            count: cnt,
            payload,
            data,
        } = *req;
        match function {
            ReadCoils | ReadDiscreteInputs | ReadHoldingRegisters | ReadInputRegisters
            | WriteSingleCoil | WriteSingleRegister => check_data_len(data, 4)?,
            MaskWriteRegister => check_data_len(data, 6)?,
            WriteMultipleCoils | WriteMultipleRegisters => check_min_data_len(data, 5)?,
            ReadWriteMultipleRegisters => check_min_data_len(data, 9)?,
            ReportServerId | Custom(_) => return Err(ExceptionCode::IllegalFunction),
        }
        match function {
            ReadCoils => read_bits(&self.coils, addr, cnt, rsp),
            ReadDiscreteInputs => read_bits(&self.discrete_inputs, addr, cnt, rsp),
            ReadHoldingRegisters => read_registers(&self.holding_registers, addr, cnt, rsp),
            ReadInputRegisters => read_registers(&self.input_registers, addr, cnt, rsp),
            WriteSingleCoil => {
                let state = coil_to_bool(cnt).ok_or(ExceptionCode::IllegalDataValue)?;
                if !self.coils.set(addr, state) {
                    return Err(ExceptionCode::IllegalDataAddress);
                }
                rsp.put_u16(addr);
                rsp.put_u16(cnt);
                Ok(())
            }
            WriteSingleRegister => {
                if !self.holding_registers.set(addr, cnt) {
                    return Err(ExceptionCode::IllegalDataAddress);
                }
                rsp.put_u16(addr);
                rsp.put_u16(cnt);
                Ok(())
            }
            WriteMultipleCoils => {
                check_quantity(cnt, MAX_WRITE_BITS)?;
                let data = counted_data(payload, packed_coils_size(cnt.into()))?;
                let coils = self
                    .coils
                    .range_mut(addr, cnt)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                coils.copy_from_slice(&decode_packed_coils(data, cnt));
                rsp.put_u16(addr);
                rsp.put_u16(cnt);
                Ok(())
            }
            WriteMultipleRegisters => {
                check_quantity(cnt, MAX_WRITE_REGISTERS)?;
                let data = counted_data(payload, usize::from(cnt) * 2)?;
                let words = self
                    .holding_registers
                    .range_mut(addr, cnt)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                for (dst, src) in words.iter_mut().zip(decode_words(data)) {
                    *dst = src;
                }
                rsp.put_u16(addr);
                rsp.put_u16(cnt);
                Ok(())
            }
            MaskWriteRegister => {
                // address, and_mask (in `count`), or_mask
                let and_mask = cnt;
                let or_mask = BigEndian::read_u16(payload);
                let reg = self
                    .holding_registers
                    .range_mut(addr, 1)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                reg[0] = (reg[0] & and_mask) | (or_mask & !and_mask);
                rsp.put_u16(addr);
                rsp.put_u16(and_mask);
                rsp.put_u16(or_mask);
                Ok(())
            }
            ReadWriteMultipleRegisters => {
                // read address, read quantity, write address, write quantity, byte count, data
                let write_addr = BigEndian::read_u16(&payload[0..2]);
                let write_cnt = BigEndian::read_u16(&payload[2..4]);
                check_quantity(cnt, MAX_READ_REGISTERS)?;
                check_quantity(write_cnt, MAX_WR_WRITE_REGISTERS)?;
                let data = counted_data(&payload[4..], usize::from(write_cnt) * 2)?;
                if self.holding_registers.range(addr, cnt).is_none() {
                    return Err(ExceptionCode::IllegalDataAddress);
                }
                let words = self
                    .holding_registers
                    .range_mut(write_addr, write_cnt)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                // The write operation is performed before the read.
                for (dst, src) in words.iter_mut().zip(decode_words(data)) {
                    *dst = src;
                }
                read_registers(&self.holding_registers, addr, cnt, rsp)
            }
            ReportServerId | Custom(_) => Err(ExceptionCode::IllegalFunction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(map: &mut RegisterMap, pdu: &[u8]) -> Result<Vec<u8>, ExceptionCode> {
        let req = MappingRequest::from_pdu(pdu).unwrap();
        let mut rsp = BytesMut::new();
        map.handle(&req, &mut rsp)?;
        Ok(rsp.to_vec())
    }

    fn map() -> RegisterMap {
        let mut map = RegisterMap::new();
        map.configure_coils(0x10, 20)
            .configure_discrete_inputs(0, 8)
            .configure_holding_registers(0, 10)
            .configure_input_registers(100, 2);
        map
    }

    #[test]
    fn split_pdu() {
        let req = MappingRequest::from_pdu(&[0x03, 0x00, 0x01, 0x00, 0x02, 0xAA]).unwrap();
        assert_eq!(req.function, FunctionCode::ReadHoldingRegisters);
        assert_eq!(req.address, 1);
        assert_eq!(req.count, 2);
        assert_eq!(req.payload, &[0xAA]);
        assert_eq!(req.data, &[0x00, 0x01, 0x00, 0x02, 0xAA]);

        let req = MappingRequest::from_pdu(&[0x11]).unwrap();
        assert_eq!(req.function, FunctionCode::ReportServerId);
        assert_eq!((req.address, req.count), (0, 0));
        assert!(req.payload.is_empty());
        assert!(req.data.is_empty());

        assert!(MappingRequest::from_pdu(&[]).is_none());
    }

    #[test]
    fn read_holding_registers() {
        let mut map = map();
        map.holding_registers.set(0, 0x002A);
        map.holding_registers.set(1, 0x1234);
        assert_eq!(
            handle(&mut map, &[0x03, 0x00, 0x00, 0x00, 0x02]).unwrap(),
            &[0x04, 0x00, 0x2A, 0x12, 0x34]
        );
    }

    #[test]
    fn read_input_registers_with_start_address() {
        let mut map = map();
        map.input_registers.set(101, 7);
        assert_eq!(
            handle(&mut map, &[0x04, 0x00, 0x65, 0x00, 0x01]).unwrap(),
            &[0x02, 0x00, 0x07]
        );
        assert_eq!(
            handle(&mut map, &[0x04, 0x00, 0x63, 0x00, 0x01]),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn read_coils() {
        let mut map = map();
        map.coils.set(0x10, true);
        map.coils.set(0x12, true);
        map.coils.set(0x18, true);
        assert_eq!(
            handle(&mut map, &[0x01, 0x00, 0x10, 0x00, 0x09]).unwrap(),
            &[0x02, 0b0000_0101, 0b0000_0001]
        );
    }

    #[test]
    fn read_quantity_limits() {
        let mut map = map();
        assert_eq!(
            handle(&mut map, &[0x01, 0x00, 0x10, 0x00, 0x00]),
            Err(ExceptionCode::IllegalDataValue)
        );
        assert_eq!(
            handle(&mut map, &[0x03, 0x00, 0x00, 0x00, 0x7E]),
            Err(ExceptionCode::IllegalDataValue)
        );
        assert_eq!(
            handle(&mut map, &[0x02, 0x00, 0x00, 0x00, 0x09]),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn write_single_coil() {
        let mut map = map();
        assert_eq!(
            handle(&mut map, &[0x05, 0x00, 0x11, 0xFF, 0x00]).unwrap(),
            &[0x00, 0x11, 0xFF, 0x00]
        );
        assert_eq!(map.coils.get(0x11), Some(true));
        assert_eq!(
            handle(&mut map, &[0x05, 0x00, 0x11, 0x12, 0x34]),
            Err(ExceptionCode::IllegalDataValue)
        );
    }

    #[test]
    fn write_single_register() {
        let mut map = map();
        assert_eq!(
            handle(&mut map, &[0x06, 0x00, 0x09, 0xAB, 0xCD]).unwrap(),
            &[0x00, 0x09, 0xAB, 0xCD]
        );
        assert_eq!(map.holding_registers.get(9), Some(0xABCD));
        assert_eq!(
            handle(&mut map, &[0x06, 0x00, 0x0A, 0x00, 0x01]),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn write_multiple_coils() {
        let mut map = map();
        assert_eq!(
            handle(&mut map, &[0x0F, 0x00, 0x10, 0x00, 0x03, 0x01, 0b101]).unwrap(),
            &[0x00, 0x10, 0x00, 0x03]
        );
        assert_eq!(map.coils.range(0x10, 3).unwrap(), &[true, false, true]);
        assert_eq!(
            handle(&mut map, &[0x0F, 0x00, 0x10, 0x00, 0x03, 0x02, 0b101, 0]),
            Err(ExceptionCode::IllegalDataValue)
        );
    }

    #[test]
    fn write_multiple_registers() {
        let mut map = map();
        assert_eq!(
            handle(
                &mut map,
                &[0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
            )
            .unwrap(),
            &[0x00, 0x01, 0x00, 0x02]
        );
        assert_eq!(map.holding_registers.range(1, 2).unwrap(), &[0x000A, 0x0102]);
        assert_eq!(
            handle(&mut map, &[0x10, 0x00, 0x09, 0x00, 0x02, 0x04, 0, 1, 0, 2]),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn mask_write_register() {
        let mut map = map();
        map.holding_registers.set(4, 0x12);
        assert_eq!(
            handle(&mut map, &[0x16, 0x00, 0x04, 0x00, 0xF2, 0x00, 0x25]).unwrap(),
            &[0x00, 0x04, 0x00, 0xF2, 0x00, 0x25]
        );
        assert_eq!(map.holding_registers.get(4), Some(0x17));
    }

    #[test]
    fn read_write_multiple_registers() {
        let mut map = map();
        map.holding_registers.set(0, 1);
        let pdu = [
            0x17, 0x00, 0x00, 0x00, 0x02, // read 2 at 0
            0x00, 0x01, 0x00, 0x01, 0x02, 0x00, 0x2A, // write 1 at 1
        ];
        assert_eq!(
            handle(&mut map, &pdu).unwrap(),
            &[0x04, 0x00, 0x01, 0x00, 0x2A]
        );
    }

    #[test]
    fn truncated_requests_are_rejected() {
        let mut map = map();
        map.holding_registers.set(0, 0x1234);
        for pdu in [
            &[0x06][..],
            &[0x06, 0x00, 0x00],
            &[0x06, 0x00, 0x00, 0x00, 0x00, 0x00],
            &[0x05, 0x00, 0x10],
            &[0x03, 0x00, 0x00, 0x00],
            &[0x16, 0x00, 0x00, 0xFF],
            &[0x16, 0x00, 0x00, 0x00, 0x00],
            &[0x10, 0x00, 0x00, 0x00, 0x01],
            &[0x17, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01],
        ] {
            assert_eq!(
                handle(&mut map, pdu),
                Err(ExceptionCode::IllegalDataValue),
                "{pdu:02X?}"
            );
        }
        assert_eq!(map.holding_registers.get(0), Some(0x1234));
        assert_eq!(map.coils.get(0x10), Some(false));
    }

    #[test]
    fn unsupported_functions() {
        let mut map = map();
        assert_eq!(handle(&mut map, &[0x11]), Err(ExceptionCode::IllegalFunction));
        assert_eq!(
            handle(&mut map, &[0x41, 0x00, 0x00, 0x00, 0x01]),
            Err(ExceptionCode::IllegalFunction)
        );
    }

    #[test]
    fn mapping_through_reference() {
        let mut map = map();
        map.holding_registers.set(0, 5);
        let mut boxed: Box<dyn Mapping> = Box::new(map);
        let req = MappingRequest::from_pdu(&[0x03, 0x00, 0x00, 0x00, 0x01]).unwrap();
        let mut rsp = BytesMut::new();
        boxed.handle(&req, &mut rsp).unwrap();
        assert_eq!(&rsp[..], &[0x02, 0x00, 0x05]);
    }
}
