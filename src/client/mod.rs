// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP client

use std::{borrow::Cow, net::IpAddr};

use byteorder::{BigEndian, ByteOrder as _};
use log::debug;

use crate::{
    backend::{tcp::TcpBackend, Stream},
    bytes::{BufMut as _, Bytes, BytesMut},
    codec::{
        bool_to_coil, decode_packed_coils, encode_packed_coils, packed_coils_size, u16_len, u8_len,
    },
    context::Context,
    frame::tcp::{offset, MAX_ADU_LENGTH},
    mapping::{MAX_WRITE_BITS, MAX_WRITE_REGISTERS, MAX_WR_WRITE_REGISTERS},
    slave::{Slave, SlaveContext},
    Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, ProtocolError, Quantity,
    Result, Word,
};

#[cfg(feature = "tcp")]
pub mod tcp;

/// A request that a [`Client`] can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    ReadCoils(Address, Quantity),
    ReadDiscreteInputs(Address, Quantity),
    ReadHoldingRegisters(Address, Quantity),
    ReadInputRegisters(Address, Quantity),
    WriteSingleCoil(Address, Coil),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, Cow<'a, [Coil]>),
    WriteMultipleRegisters(Address, Cow<'a, [Word]>),
    /// Address, AND mask, OR mask
    MaskWriteRegister(Address, Word, Word),
    /// Read address, read count, write address, write data
    ReadWriteMultipleRegisters(Address, Quantity, Address, Cow<'a, [Word]>),
}

impl Request<'_> {
    #[must_use]
    pub fn function_code(&self) -> FunctionCode {
        match self {
            Self::ReadCoils(..) => FunctionCode::ReadCoils,
            Self::ReadDiscreteInputs(..) => FunctionCode::ReadDiscreteInputs,
            Self::ReadHoldingRegisters(..) => FunctionCode::ReadHoldingRegisters,
            Self::ReadInputRegisters(..) => FunctionCode::ReadInputRegisters,
            Self::WriteSingleCoil(..) => FunctionCode::WriteSingleCoil,
            Self::WriteSingleRegister(..) => FunctionCode::WriteSingleRegister,
            Self::WriteMultipleCoils(..) => FunctionCode::WriteMultipleCoils,
            Self::WriteMultipleRegisters(..) => FunctionCode::WriteMultipleRegisters,
            Self::MaskWriteRegister(..) => FunctionCode::MaskWriteRegister,
            Self::ReadWriteMultipleRegisters(..) => FunctionCode::ReadWriteMultipleRegisters,
        }
    }

    /// Split into the address and count fields that follow the function
    /// code and the remaining payload.
    ///
    /// Fails if the number of items to write exceeds what a single request
    /// can carry.
    fn encode_parts(&self) -> Result<(Address, u16, BytesMut)> {
        let mut payload = BytesMut::new();
        let (address, count) = match self {
            Self::ReadCoils(address, count)
            | Self::ReadDiscreteInputs(address, count)
            | Self::ReadHoldingRegisters(address, count)
            | Self::ReadInputRegisters(address, count) => (*address, *count),
            Self::WriteSingleCoil(address, coil) => (*address, bool_to_coil(*coil)),
            Self::WriteSingleRegister(address, word) => (*address, *word),
            Self::WriteMultipleCoils(address, coils) => {
                check_write_quantity(coils.len(), MAX_WRITE_BITS)?;
                payload.put_u8(u8_len(packed_coils_size(coils.len())));
                encode_packed_coils(&mut payload, coils);
                (*address, u16_len(coils.len()))
            }
            Self::WriteMultipleRegisters(address, words) => {
                check_write_quantity(words.len(), MAX_WRITE_REGISTERS)?;
                payload.put_u8(u8_len(words.len() * 2));
                for word in words.iter() {
                    payload.put_u16(*word);
                }
                (*address, u16_len(words.len()))
            }
            Self::MaskWriteRegister(address, and_mask, or_mask) => {
                payload.put_u16(*or_mask);
                (*address, *and_mask)
            }
            Self::ReadWriteMultipleRegisters(read_address, read_count, write_address, words) => {
                check_write_quantity(words.len(), MAX_WR_WRITE_REGISTERS)?;
                payload.put_u16(*write_address);
                payload.put_u16(u16_len(words.len()));
                payload.put_u8(u8_len(words.len() * 2));
                for word in words.iter() {
                    payload.put_u16(*word);
                }
                (*read_address, *read_count)
            }
        };
        Ok((address, count, payload))
    }
}

fn check_write_quantity(len: usize, max: Quantity) -> Result<()> {
    if len == 0 || len > usize::from(max) {
        return Err(ProtocolError::InvalidArgument(
            "number of items to write is out of range",
        ));
    }
    Ok(())
}

/// A polled, blocking Modbus TCP client.
///
/// Each [`call`](Self::call) sends one request and spins until the
/// matching confirmation arrives or the response timeout passes.
#[derive(Debug)]
pub struct Client {
    ctx: Context,
}

impl Client {
    /// A client that talks to `addr:port` over `stream` once
    /// [`connect`](Self::connect) has been called.
    pub fn new(stream: impl Stream + 'static, addr: IpAddr, port: u16) -> Self {
        Self::from_context(Context::new(Box::new(TcpBackend::client(
            stream, addr, port,
        ))))
    }

    #[must_use]
    pub fn from_context(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn connect(&mut self) -> Result<()> {
        self.ctx.connect()
    }

    /// Disconnect from the server. Calling it again is a no-op.
    pub fn close(&mut self) {
        self.ctx.close();
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// Invoke a _Modbus_ function and return the response data that
    /// follows the function code.
    ///
    /// A rejected confirmation flushes pending input so that the next
    /// call starts from a clean stream.
    pub fn call(&mut self, request: Request<'_>) -> Result<Bytes> {
        let function = request.function_code();
        let (address, count, payload) = request.encode_parts()?;

        let mut req = [0; MAX_ADU_LENGTH];
        let mut req_length = self
            .ctx
            .build_request_basis(function, address, count, &mut req);
        if req_length + payload.len() > MAX_ADU_LENGTH {
            return Err(ProtocolError::InvalidArgument(
                "request exceeds the maximum ADU length",
            ));
        }
        req[req_length..req_length + payload.len()].copy_from_slice(&payload);
        req_length += payload.len();
        let req_length = self.ctx.send_msg(&mut req, req_length)?;

        let mut rsp = [0; MAX_ADU_LENGTH];
        let rsp_length = self.ctx.receive_confirmation(&mut rsp)?;
        let res = self.confirm(function, &req[..req_length], &rsp[..rsp_length]);
        if let Err(err) = &res {
            if !matches!(err, ProtocolError::Exception(_)) {
                match self.ctx.flush() {
                    Ok(n) if n > 0 => debug!("Flushed {n} byte(s) after {err}"),
                    Ok(_) => {}
                    Err(flush_err) => debug!("Flushing after {err} failed: {flush_err}"),
                }
            }
        }
        res
    }

    fn confirm(&self, function: FunctionCode, req: &[u8], rsp: &[u8]) -> Result<Bytes> {
        self.ctx.check_confirmation(req, rsp)?;
        let actual = rsp
            .get(offset::FUNCTION)
            .copied()
            .ok_or(ProtocolError::MalformedResponse("missing function code"))?;
        if actual == function.exception_value() {
            let exception = rsp
                .get(offset::DATA)
                .copied()
                .ok_or(ProtocolError::MalformedResponse("missing exception code"))?;
            return Err(ProtocolError::Exception(ExceptionResponse {
                function,
                exception: ExceptionCode::new(exception),
            }));
        }
        if actual != function.value() {
            return Err(ProtocolError::UnexpectedFunction {
                expected: function,
                actual: FunctionCode::new(actual),
            });
        }
        Ok(Bytes::copy_from_slice(&rsp[offset::DATA..]))
    }
}

impl SlaveContext for Client {
    fn set_slave(&mut self, slave: Slave) -> Result<()> {
        self.ctx.set_slave(slave)
    }
}

/// _Modbus_ reader
pub trait Reader {
    /// Read multiple coils (0x01)
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple discrete inputs (0x02)
    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read multiple holding registers (0x03)
    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;

    /// Read multiple input registers (0x04)
    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;

    /// Read and write multiple holding registers (0x17)
    ///
    /// The write operation is performed before the read unlike
    /// the name of the operation might suggest!
    fn read_write_multiple_registers(
        &mut self,
        read_addr: Address,
        read_count: Quantity,
        write_addr: Address,
        write_data: &[Word],
    ) -> Result<Vec<Word>>;
}

/// _Modbus_ writer
pub trait Writer {
    /// Write a single coil (0x05)
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;

    /// Write a single holding register (0x06)
    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;

    /// Write multiple coils (0x0F)
    fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()>;

    /// Write multiple holding registers (0x10)
    fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()>;

    /// Set or clear individual bits of a holding register (0x16)
    fn masked_write_register(&mut self, addr: Address, and_mask: Word, or_mask: Word)
        -> Result<()>;
}

fn byte_counted(data: &[u8], expected: usize) -> Result<&[u8]> {
    match data.split_first() {
        Some((&byte_count, rest))
            if usize::from(byte_count) == expected && rest.len() == expected =>
        {
            Ok(rest)
        }
        _ => Err(ProtocolError::MalformedResponse("unexpected byte count")),
    }
}

fn decode_coils(data: &[u8], cnt: Quantity) -> Result<Vec<Coil>> {
    let packed = byte_counted(data, packed_coils_size(cnt.into()))?;
    Ok(decode_packed_coils(packed, cnt))
}

fn decode_words(data: &[u8], cnt: Quantity) -> Result<Vec<Word>> {
    let bytes = byte_counted(data, usize::from(cnt) * 2)?;
    Ok(bytes.chunks_exact(2).map(BigEndian::read_u16).collect())
}

fn check_echo(data: &[u8], expected_len: usize) -> Result<()> {
    if data.len() != expected_len {
        return Err(ProtocolError::MalformedResponse("unexpected echo length"));
    }
    Ok(())
}

impl Reader for Client {
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let data = self.call(Request::ReadCoils(addr, cnt))?;
        decode_coils(&data, cnt)
    }

    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let data = self.call(Request::ReadDiscreteInputs(addr, cnt))?;
        decode_coils(&data, cnt)
    }

    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let data = self.call(Request::ReadHoldingRegisters(addr, cnt))?;
        decode_words(&data, cnt)
    }

    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let data = self.call(Request::ReadInputRegisters(addr, cnt))?;
        decode_words(&data, cnt)
    }

    fn read_write_multiple_registers(
        &mut self,
        read_addr: Address,
        read_count: Quantity,
        write_addr: Address,
        write_data: &[Word],
    ) -> Result<Vec<Word>> {
        let data = self.call(Request::ReadWriteMultipleRegisters(
            read_addr,
            read_count,
            write_addr,
            Cow::Borrowed(write_data),
        ))?;
        decode_words(&data, read_count)
    }
}

impl Writer for Client {
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()> {
        let data = self.call(Request::WriteSingleCoil(addr, coil))?;
        check_echo(&data, 4)
    }

    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()> {
        let data = self.call(Request::WriteSingleRegister(addr, word))?;
        check_echo(&data, 4)
    }

    fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()> {
        let data = self.call(Request::WriteMultipleCoils(addr, Cow::Borrowed(coils)))?;
        check_echo(&data, 4)
    }

    fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()> {
        let data = self.call(Request::WriteMultipleRegisters(addr, Cow::Borrowed(words)))?;
        check_echo(&data, 4)
    }

    fn masked_write_register(
        &mut self,
        addr: Address,
        and_mask: Word,
        or_mask: Word,
    ) -> Result<()> {
        let data = self.call(Request::MaskWriteRegister(addr, and_mask, or_mask))?;
        check_echo(&data, 6)
    }
}
