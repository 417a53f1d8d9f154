// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Stream`] for [`std::net::TcpStream`].

use std::{
    io::{self, Read as _, Write as _},
    net::{IpAddr, Shutdown, SocketAddr, TcpStream},
};

use log::{debug, trace};

use crate::frame::tcp::MAX_ADU_LENGTH;

use super::Stream;

/// A TCP connection that can be polled for available bytes.
///
/// The socket stays in blocking mode. Availability is probed with a
/// non-blocking `peek`, so a subsequent read of at most that many bytes
/// never blocks.
#[derive(Debug, Default)]
pub struct NetStream {
    inner: Option<TcpStream>,
    eof: bool,
}

impl NetStream {
    /// A stream that is not connected yet, see [`Stream::connect`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.as_ref().and_then(|stream| stream.peer_addr().ok())
    }

    fn inner(&mut self) -> io::Result<&mut TcpStream> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }

    fn peek_available(stream: &TcpStream) -> io::Result<usize> {
        let mut buf = [0; MAX_ADU_LENGTH];
        stream.set_nonblocking(true)?;
        let res = stream.peek(&mut buf);
        stream.set_nonblocking(false)?;
        res
    }
}

impl From<TcpStream> for NetStream {
    fn from(stream: TcpStream) -> Self {
        if let Err(err) = stream.set_nodelay(true) {
            debug!("Failed to disable Nagle's algorithm: {err}");
        }
        Self {
            inner: Some(stream),
            eof: false,
        }
    }
}

impl Stream for NetStream {
    fn connect(&mut self, addr: IpAddr, port: u16) -> io::Result<()> {
        let stream = TcpStream::connect((addr, port))?;
        *self = stream.into();
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner()?.write_all(buf)?;
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner()?.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }

    fn available(&mut self) -> usize {
        let Some(stream) = self.inner.as_ref() else {
            return 0;
        };
        match Self::peek_available(stream) {
            Ok(0) => {
                trace!("Peer closed the connection");
                self.eof = true;
                0
            }
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => 0,
            Err(err) => {
                debug!("Polling the socket failed: {err}");
                self.eof = true;
                0
            }
        }
    }

    fn connected(&mut self) -> bool {
        self.inner.is_some() && !self.eof
    }

    fn stop(&mut self) {
        if let Some(stream) = self.inner.take() {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                debug!("Failed to shut down the connection: {err}");
            }
        }
    }
}
