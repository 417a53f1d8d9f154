// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport backends
//!
//! A [`Backend`] bundles everything the protocol core needs from a
//! concrete transport: its framing constants, header construction and
//! the raw I/O primitives. The protocol [`Context`](crate::context::Context)
//! only ever talks to a `Box<dyn Backend>`, so a serial line backend can be
//! added without touching it.

use std::{fmt, io, net::IpAddr, time::Duration};

use crate::{
    frame::tcp::Sft, Address, FunctionCode, ProtocolError, Quantity, TransportError,
};

pub mod tcp;

#[cfg(feature = "tcp")]
pub mod net;

#[cfg(test)]
pub(crate) mod mock;

/// The kind of transport behind a [`Backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Rtu,
    Tcp,
}

/// A connected, non-blocking byte stream.
///
/// This is the client handle that a network stack hands out for an
/// accepted or outgoing connection.
pub trait Stream: fmt::Debug {
    /// Open a connection to `addr:port`.
    fn connect(&mut self, addr: IpAddr, port: u16) -> io::Result<()>;

    /// Write `buf` and return the number of bytes written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes that are already available.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> usize;

    /// Whether the connection is still open.
    fn connected(&mut self) -> bool;

    /// Close the connection.
    fn stop(&mut self);
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn connect(&mut self, addr: IpAddr, port: u16) -> io::Result<()> {
        (**self).connect(addr, port)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn connected(&mut self) -> bool {
        (**self).connected()
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

/// Transport independent capability set used by the protocol core.
pub trait Backend: fmt::Debug {
    fn backend_type(&self) -> BackendType;

    /// Bytes in front of the function code.
    fn header_length(&self) -> usize;

    /// Trailing checksum bytes.
    fn checksum_length(&self) -> usize;

    /// Maximum ADU size.
    fn max_adu_length(&self) -> usize;

    /// Write a request header into `req` and return its length.
    ///
    /// Advances the transaction counter where the transport has one.
    fn build_request_basis(
        &mut self,
        unit_id: u8,
        function: FunctionCode,
        address: Address,
        count: Quantity,
        req: &mut [u8],
    ) -> usize;

    /// Write a response header into `rsp` and return its length.
    fn build_response_basis(&self, sft: &Sft, rsp: &mut [u8]) -> usize;

    /// Transaction id to echo in the response to `req`.
    fn prepare_response_tid(&self, req: &[u8]) -> u16;

    /// Complete `msg` before it is sent, returning the final length.
    fn send_msg_pre(&self, msg: &mut [u8], msg_length: usize) -> usize;

    /// Number of payload bytes still to be read after the header of `msg`.
    fn compute_data_length_after_header(&self, msg: &[u8]) -> Result<usize, ProtocolError>;

    /// Validate the response `rsp` against the request `req`.
    fn check_confirmation(&self, req: &[u8], rsp: &[u8]) -> Result<(), ProtocolError>;

    /// Bind the backend to a connected byte stream.
    ///
    /// Any previously bound stream is abandoned without closing it.
    fn attach(&mut self, stream: Box<dyn Stream>);

    fn is_attached(&self) -> bool;

    fn is_connected(&mut self) -> bool;

    fn connect(&mut self) -> Result<(), TransportError>;

    fn send(&mut self, msg: &[u8]) -> Result<usize, TransportError>;

    fn receive_raw(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Number of bytes that can be read right now.
    fn available(&mut self) -> usize;

    /// Spin until at least `min_length` bytes are available or `timeout`
    /// has elapsed.
    ///
    /// Returns the number of available bytes, which is less than
    /// `min_length` if the deadline passed with a partial frame.
    fn wait_for_bytes(
        &mut self,
        min_length: usize,
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Discard all unread bytes and return how many were dropped.
    fn flush(&mut self) -> Result<usize, TransportError>;

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self);
}
