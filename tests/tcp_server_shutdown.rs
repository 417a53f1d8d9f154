// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopping the server disconnects its client, which can then reconnect.

#![cfg(feature = "tcp-server")]

mod support;

use std::{net::TcpStream, thread, time::Duration};

use modbus_poll::{
    client::{self, Reader as _},
    mapping::RegisterMap,
};

use crate::support::spawn_server;

#[test]
fn server_shutdown_disconnects_client() -> anyhow::Result<()> {
    let mut map = RegisterMap::new();
    map.configure_input_registers(0, 4);
    map.input_registers.set(1, 7);
    let server = spawn_server(map)?;

    let mut client = client::tcp::connect(server.addr)?;
    assert_eq!(client.read_input_registers(0, 2)?, vec![0, 7]);

    server.shutdown()?;
    thread::sleep(Duration::from_millis(50));

    let err = client.read_input_registers(0, 2).unwrap_err();
    println!("Call after shutdown failed: {err}");
    Ok(())
}

#[test]
fn client_can_reconnect() -> anyhow::Result<()> {
    let mut map = RegisterMap::new();
    map.configure_input_registers(0, 1);
    let server = spawn_server(map)?;

    let mut first = client::tcp::connect(server.addr)?;
    assert_eq!(first.read_input_registers(0, 1)?, vec![0]);
    first.close();

    let mut second = client::tcp::connect(server.addr)?;
    assert_eq!(second.read_input_registers(0, 1)?, vec![0]);
    second.close();

    server.shutdown()?;
    Ok(())
}

#[test]
fn garbage_does_not_stop_the_server() -> anyhow::Result<()> {
    use std::io::Write as _;

    let mut map = RegisterMap::new();
    map.configure_input_registers(0, 1);
    let server = spawn_server(map)?;

    let mut raw = TcpStream::connect(server.addr)?;
    raw.write_all(&[0x00, 0x01, 0xAB, 0xCD, 0x00, 0x06, 0x01, 0x04, 0x00, 0x00, 0x00, 0x01])?;
    drop(raw);
    thread::sleep(Duration::from_millis(50));

    let mut client = client::tcp::connect(server.addr)?;
    assert_eq!(client.read_input_registers(0, 1)?, vec![0]);
    client.close();

    server.shutdown()?;
    Ok(())
}
