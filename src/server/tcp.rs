// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Non-blocking TCP listener for the polled [`Server`](super::Server).

use std::{
    io,
    net::{SocketAddr, TcpListener},
};

use log::debug;
use socket2::{Domain, Socket, Type};

use crate::backend::net::NetStream;

/// Open a non-blocking listener on `addr` with a backlog of a single
/// pending connection.
pub fn listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => Socket::new(Domain::IPV4, Type::STREAM, None)?,
        SocketAddr::V6(_) => Socket::new(Domain::IPV6, Type::STREAM, None)?,
    };
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Accept a pending connection without blocking.
///
/// Returns `Ok(None)` if no client is waiting.
pub fn accept_pending(listener: &TcpListener) -> io::Result<Option<NetStream>> {
    match listener.accept() {
        Ok((stream, peer)) => {
            debug!("Accepted connection from {peer}");
            // Accepted sockets may inherit the non-blocking flag.
            stream.set_nonblocking(false)?;
            Ok(Some(stream.into()))
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(err) => Err(err),
    }
}
