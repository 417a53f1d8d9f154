// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::{io, net::IpAddr};

use thiserror::Error;

use crate::{ExceptionResponse, FunctionCode};

/// Failures of the underlying byte-stream transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A required argument or handle is missing or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The deadline passed before any byte became available.
    #[error("timed out waiting for {expected} byte(s)")]
    Timeout { expected: usize },

    /// The remote peer refused the connection.
    #[error("connection to {addr}:{port} refused")]
    ConnectionRefused { addr: IpAddr, port: u16 },

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// No byte stream is bound to the backend.
    #[error("no stream attached")]
    NotConnected,

    /// The stream accepted fewer bytes than the frame holds.
    #[error("short write: {written} of {expected} byte(s)")]
    ShortWrite { written: usize, expected: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Error type for _Modbus_ framing and request/response cycles.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An argument is out of range, e.g. a reserved unit identifier.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The response does not answer the request that was sent.
    #[error("invalid transaction ID: expected 0x{expected:04X}, received 0x{actual:04X}")]
    TransactionMismatch { expected: u16, actual: u16 },

    /// The protocol identifier of a received header is not zero.
    #[error("invalid protocol ID: 0x{0:04X}")]
    BadProtocolId(u16),

    /// The MBAP length field cannot even cover unit id and function code.
    #[error("invalid MBAP length field: {0}")]
    InvalidLength(u16),

    /// The declared ADU size exceeds the maximum frame size.
    #[error("frame of {length} byte(s) exceeds the maximum of {max}")]
    FrameTooLarge { length: usize, max: usize },

    /// The response carries a different function code than the request.
    #[error("unexpected function code: expected {expected}, received {actual}")]
    UnexpectedFunction {
        expected: FunctionCode,
        actual: FunctionCode,
    },

    /// The response data does not match the request.
    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),

    /// The mapping store does not implement the requested function.
    ///
    /// The peer has already received an `IllegalFunction` exception
    /// response when this error is returned.
    #[error("unsupported function: {0}")]
    UnsupportedFunction(FunctionCode),

    /// The server responded with a _Modbus_ exception.
    #[error("exception: {0}")]
    Exception(ExceptionResponse),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Whether the error was caused by a timeout of the transport.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Timeout { .. }))
    }
}

impl From<io::Error> for ProtocolError {
    fn from(from: io::Error) -> Self {
        Self::Transport(from.into())
    }
}
