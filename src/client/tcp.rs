// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP client connections

use std::net::SocketAddr;

use crate::{backend::net::NetStream, slave::SlaveContext as _, Result, Slave};

use super::Client;

/// Establish a direct connection to a Modbus TCP coupler.
pub fn connect(socket_addr: SocketAddr) -> Result<Client> {
    connect_slave(socket_addr, Slave::tcp_device())
}

/// Connect to a physical, broadcast, or custom Modbus device,
/// probably through a Modbus TCP gateway that is forwarding
/// messages to/from the corresponding slave device.
pub fn connect_slave(socket_addr: SocketAddr, slave: Slave) -> Result<Client> {
    let mut client = Client::new(NetStream::new(), socket_addr.ip(), socket_addr.port());
    client.set_slave(slave)?;
    client.connect()?;
    Ok(client)
}
