// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport independent protocol context

use std::time::Duration;

use log::{debug, warn};

use crate::{
    backend::Backend,
    bytes::BytesMut,
    frame::tcp::{Sft, MAX_ADU_LENGTH},
    mapping::{Mapping, MappingRequest},
    slave::{Slave, SlaveContext},
    Address, ExceptionCode, FunctionCode, ProtocolError, Quantity, Result, TransportError,
};

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);
const DEFAULT_BYTE_TIMEOUT: Duration = Duration::from_millis(500);

/// Direction of a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// A request received by a server.
    Indication,
    /// A response received by a client.
    Confirmation,
}

/// Protocol state shared by the client and the server role.
///
/// Owns exactly one [`Backend`] and dispatches all transport specific
/// work through it.
#[derive(Debug)]
pub struct Context {
    backend: Box<dyn Backend>,
    slave: Slave,
    debug: bool,
    response_timeout: Duration,
    byte_timeout: Duration,
    indication_timeout: Duration,
}

impl Context {
    #[must_use]
    pub fn new(backend: Box<dyn Backend>) -> Self {
        debug_assert!(backend.max_adu_length() <= MAX_ADU_LENGTH);
        Self {
            backend,
            slave: Slave::tcp_device(),
            debug: false,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            byte_timeout: DEFAULT_BYTE_TIMEOUT,
            indication_timeout: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn slave(&self) -> Slave {
        self.slave
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Dump every sent and received frame at `debug` level.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Time to wait for the first byte of a confirmation.
    pub fn set_response_timeout(&mut self, timeout: Duration) {
        self.response_timeout = timeout;
    }

    #[must_use]
    pub fn byte_timeout(&self) -> Duration {
        self.byte_timeout
    }

    /// Time to wait for the rest of a frame once it has started.
    pub fn set_byte_timeout(&mut self, timeout: Duration) {
        self.byte_timeout = timeout;
    }

    #[must_use]
    pub fn indication_timeout(&self) -> Duration {
        self.indication_timeout
    }

    /// Time to wait for the first byte of an indication.
    ///
    /// Zero performs a single availability check.
    pub fn set_indication_timeout(&mut self, timeout: Duration) {
        self.indication_timeout = timeout;
    }

    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    pub fn connect(&mut self) -> Result<()> {
        self.backend.connect()?;
        Ok(())
    }

    /// Discard unread bytes, returning how many were dropped.
    pub fn flush(&mut self) -> Result<usize> {
        Ok(self.backend.flush()?)
    }

    pub fn close(&mut self) {
        self.backend.close();
    }

    /// Write a request header for the selected slave into `req`.
    ///
    /// Returns the header length.
    pub fn build_request_basis(
        &mut self,
        function: FunctionCode,
        address: Address,
        count: Quantity,
        req: &mut [u8],
    ) -> usize {
        self.backend
            .build_request_basis(self.slave.into(), function, address, count, req)
    }

    /// Validate a confirmation `rsp` against the request `req`.
    pub fn check_confirmation(&self, req: &[u8], rsp: &[u8]) -> Result<()> {
        let res = self.backend.check_confirmation(req, rsp);
        if let Err(err) = &res {
            if self.debug {
                debug!("Rejected confirmation: {err}");
            }
        }
        res
    }

    /// Finalize and send the first `msg_length` bytes of `msg`.
    pub fn send_msg(&mut self, msg: &mut [u8], msg_length: usize) -> Result<usize> {
        let msg_length = self.backend.send_msg_pre(msg, msg_length);
        let msg = &msg[..msg_length];
        if self.debug {
            debug!("Sending {msg:02X?}");
        }
        let written = self.backend.send(msg)?;
        if written != msg_length {
            return Err(TransportError::ShortWrite {
                written,
                expected: msg_length,
            }
            .into());
        }
        Ok(written)
    }

    /// Receive one complete request into `msg`.
    ///
    /// Returns `Ok(0)` if no request is pending.
    pub fn receive_request(&mut self, msg: &mut [u8]) -> Result<usize> {
        self.receive_msg(msg, MsgType::Indication)
    }

    /// Receive one complete response into `msg`.
    pub fn receive_confirmation(&mut self, msg: &mut [u8]) -> Result<usize> {
        self.receive_msg(msg, MsgType::Confirmation)
    }

    /// Read a full frame: first the header, then the number of bytes the
    /// header announces.
    ///
    /// Malformed headers flush the backend so that the next frame starts
    /// on a clean stream.
    pub fn receive_msg(&mut self, msg: &mut [u8], msg_type: MsgType) -> Result<usize> {
        if msg.len() < self.backend.max_adu_length() {
            return Err(ProtocolError::InvalidArgument(
                "receive buffer is shorter than the maximum ADU",
            ));
        }
        let mut timeout = match msg_type {
            MsgType::Indication => self.indication_timeout,
            MsgType::Confirmation => self.response_timeout,
        };
        let mut msg_length = 0;
        let mut length_to_read = self.backend.header_length();
        let mut header_complete = false;
        while length_to_read > 0 {
            match self.backend.wait_for_bytes(length_to_read, timeout) {
                Ok(_) => {}
                Err(TransportError::Timeout { .. })
                    if msg_length == 0 && msg_type == MsgType::Indication =>
                {
                    return Ok(0);
                }
                Err(err) => {
                    if msg_length > 0 {
                        debug!("Incomplete frame after {msg_length} byte(s): {err}");
                    }
                    return Err(err.into());
                }
            }
            let chunk = &mut msg[msg_length..msg_length + length_to_read];
            let n = self.backend.receive_raw(chunk)?;
            if n == 0 {
                return Err(TransportError::ConnectionClosed.into());
            }
            msg_length += n;
            length_to_read -= n;
            if length_to_read == 0 && !header_complete {
                header_complete = true;
                length_to_read = match self
                    .backend
                    .compute_data_length_after_header(&msg[..msg_length])
                {
                    Ok(len) => len,
                    Err(err) => {
                        self.flush_after(&err);
                        return Err(err);
                    }
                };
            }
            timeout = self.byte_timeout;
        }
        if self.debug {
            debug!("Received {:02X?}", &msg[..msg_length]);
        }
        Ok(msg_length)
    }

    fn flush_after(&mut self, err: &ProtocolError) {
        match self.backend.flush() {
            Ok(n) => debug!("Flushed {n} byte(s) after {err}"),
            Err(flush_err) => debug!("Flushing after {err} failed: {flush_err}"),
        }
    }

    /// Answer the request `req` from `mapping`.
    ///
    /// A mapping error is sent back as an exception response. If the
    /// function is not implemented at all, the exception is sent and
    /// [`ProtocolError::UnsupportedFunction`] is returned.
    pub fn reply<M>(&mut self, req: &[u8], mapping: &mut M) -> Result<()>
    where
        M: Mapping + ?Sized,
    {
        let offset = self.backend.header_length();
        let checksum_length = self.backend.checksum_length();
        let max_adu_length = self.backend.max_adu_length();
        if req.len() < offset + 1 + checksum_length {
            return Err(ProtocolError::InvalidArgument("request is too short"));
        }
        let pdu = &req[offset..req.len() - checksum_length];
        let sft = Sft {
            transaction_id: self.backend.prepare_response_tid(req),
            unit_id: req[offset - 1],
            function: FunctionCode::new(pdu[0]),
        };
        let Some(mapping_req) = MappingRequest::from_pdu(pdu) else {
            return Err(ProtocolError::InvalidArgument("request is too short"));
        };

        let mut data = BytesMut::with_capacity(max_adu_length);
        let mut rsp = [0; MAX_ADU_LENGTH];
        let mut rsp_length = self.backend.build_response_basis(&sft, &mut rsp);
        let exception = match mapping.handle(&mapping_req, &mut data) {
            Ok(()) if rsp_length + data.len() + checksum_length <= max_adu_length => {
                rsp[rsp_length..rsp_length + data.len()].copy_from_slice(&data);
                rsp_length += data.len();
                None
            }
            Ok(()) => {
                warn!(
                    "Response data of {} byte(s) for function {} exceeds the ADU",
                    data.len(),
                    sft.function
                );
                Some(ExceptionCode::ServerDeviceFailure)
            }
            Err(exception) => Some(exception),
        };
        if let Some(exception) = exception {
            rsp[offset] = sft.function.exception_value();
            rsp[rsp_length] = exception.into();
            rsp_length += 1;
        }
        self.send_msg(&mut rsp, rsp_length)?;
        if exception == Some(ExceptionCode::IllegalFunction) {
            return Err(ProtocolError::UnsupportedFunction(sft.function));
        }
        Ok(())
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) -> Result<()> {
        self.slave = slave.validate()?;
        Ok(())
    }
}
