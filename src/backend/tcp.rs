// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream based TCP backend.

use std::{
    net::{IpAddr, Ipv4Addr},
    time::{Duration, Instant},
};

use log::{debug, trace};

use crate::{
    codec::tcp::{
        build_request_header, build_response_header, check_protocol_id, check_response_header,
        extract_transaction_id, finalize_length,
    },
    codec::u16_len,
    frame::tcp::{Header, Sft, HEADER_LENGTH, MAX_ADU_LENGTH},
    Address, FunctionCode, ProtocolError, Quantity, TransportError,
};

use super::{Backend, BackendType, Stream};

/// Per-connection TCP state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpTransportState {
    /// Remote address, only used in the client role.
    pub addr: IpAddr,
    /// Remote port, only used in the client role.
    pub port: u16,
    /// Transaction id of the next outgoing request.
    pub transaction_id: u16,
}

impl Default for TcpTransportState {
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            transaction_id: 0,
        }
    }
}

impl TcpTransportState {
    /// Return the current transaction id and advance the counter,
    /// wrapping from `0xFFFF` to `0`.
    pub fn next_transaction_id(&mut self) -> u16 {
        let transaction_id = self.transaction_id;
        self.transaction_id = transaction_id.wrapping_add(1);
        transaction_id
    }
}

/// Modbus TCP backend bound to a byte stream.
#[derive(Debug, Default)]
pub struct TcpBackend {
    stream: Option<Box<dyn Stream>>,
    state: TcpTransportState,
}

impl TcpBackend {
    /// A backend without a stream, waiting for [`Backend::attach`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A client backend that connects `stream` to `addr:port`.
    pub fn client(stream: impl Stream + 'static, addr: IpAddr, port: u16) -> Self {
        Self {
            stream: Some(Box::new(stream)),
            state: TcpTransportState {
                addr,
                port,
                transaction_id: 0,
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> &TcpTransportState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TcpTransportState {
        &mut self.state
    }

    fn stream(&mut self) -> Result<&mut Box<dyn Stream>, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl Backend for TcpBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Tcp
    }

    fn header_length(&self) -> usize {
        HEADER_LENGTH
    }

    fn checksum_length(&self) -> usize {
        0
    }

    fn max_adu_length(&self) -> usize {
        MAX_ADU_LENGTH
    }

    fn build_request_basis(
        &mut self,
        unit_id: u8,
        function: FunctionCode,
        address: Address,
        count: Quantity,
        req: &mut [u8],
    ) -> usize {
        let transaction_id = self.state.next_transaction_id();
        let basis = build_request_header(transaction_id, unit_id, function, address, count);
        req[..basis.len()].copy_from_slice(&basis);
        basis.len()
    }

    fn build_response_basis(&self, sft: &Sft, rsp: &mut [u8]) -> usize {
        build_response_header(sft, rsp)
    }

    fn prepare_response_tid(&self, req: &[u8]) -> u16 {
        extract_transaction_id(req)
    }

    fn send_msg_pre(&self, msg: &mut [u8], msg_length: usize) -> usize {
        finalize_length(msg, msg_length)
    }

    fn compute_data_length_after_header(&self, msg: &[u8]) -> Result<usize, ProtocolError> {
        let Some(hdr) = Header::parse(msg) else {
            return Err(ProtocolError::InvalidLength(0));
        };
        check_protocol_id(msg)?;
        // The length field covers the unit id which is part of the header
        // and at least a function code.
        if hdr.length < 2 {
            return Err(ProtocolError::InvalidLength(hdr.length));
        }
        let adu_length = hdr.adu_length();
        if adu_length > MAX_ADU_LENGTH {
            return Err(ProtocolError::FrameTooLarge {
                length: adu_length,
                max: MAX_ADU_LENGTH,
            });
        }
        Ok(adu_length - HEADER_LENGTH)
    }

    fn check_confirmation(&self, req: &[u8], rsp: &[u8]) -> Result<(), ProtocolError> {
        for adu in [req, rsp] {
            if adu.len() < HEADER_LENGTH {
                return Err(ProtocolError::InvalidLength(u16_len(adu.len())));
            }
        }
        check_response_header(req, rsp)
    }

    fn attach(&mut self, stream: Box<dyn Stream>) {
        if self.stream.is_some() {
            debug!("Replacing attached stream");
        }
        self.stream = Some(stream);
    }

    fn is_attached(&self) -> bool {
        self.stream.is_some()
    }

    fn is_connected(&mut self) -> bool {
        self.stream.as_mut().map_or(false, |stream| stream.connected())
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        let TcpTransportState { addr, port, .. } = self.state;
        let stream = self.stream()?;
        stream
            .connect(addr, port)
            .map_err(|err| {
                debug!("Connecting to {addr}:{port} failed: {err}");
                TransportError::ConnectionRefused { addr, port }
            })
    }

    fn send(&mut self, msg: &[u8]) -> Result<usize, TransportError> {
        Ok(self.stream()?.write(msg)?)
    }

    fn receive_raw(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.stream()?.read(buf)?)
    }

    fn available(&mut self) -> usize {
        self.stream.as_mut().map_or(0, |stream| stream.available())
    }

    fn wait_for_bytes(
        &mut self,
        min_length: usize,
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let stream = self.stream()?;
        let start = Instant::now();
        let mut available;
        loop {
            available = stream.available();
            if available >= min_length {
                break;
            }
            if !stream.connected() {
                if available == 0 {
                    return Err(TransportError::ConnectionClosed);
                }
                break;
            }
            if start.elapsed() >= timeout {
                break;
            }
            std::hint::spin_loop();
        }
        if available == 0 {
            return Err(TransportError::Timeout {
                expected: min_length,
            });
        }
        Ok(available)
    }

    fn flush(&mut self) -> Result<usize, TransportError> {
        let stream = self.stream()?;
        let mut scratch = [0; MAX_ADU_LENGTH];
        let mut flushed = 0;
        while stream.available() > 0 {
            let n = stream.read(&mut scratch)?;
            if n == 0 {
                break;
            }
            flushed += n;
        }
        if flushed > 0 {
            trace!("Flushed {flushed} byte(s)");
        }
        Ok(flushed)
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }
}
