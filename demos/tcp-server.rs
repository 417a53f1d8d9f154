// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # TCP server example
//!
//! Serves a small register map to one client at a time. Connect with
//! `cargo run --example tcp-client` from another terminal.

use std::{net::SocketAddr, thread, time::Duration};

use modbus_poll::{
    prelude::*,
    server::tcp::{accept_pending, listener},
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let socket_addr: SocketAddr = "127.0.0.1:5502".parse()?;

    let mut map = RegisterMap::new();
    map.configure_coils(0, 16)
        .configure_discrete_inputs(0, 16)
        .configure_holding_registers(0, 16)
        .configure_input_registers(0, 16);
    map.input_registers.set(0, 1234);
    map.input_registers.set(1, 5678);
    for (addr, value) in [10, 20, 30, 40].into_iter().enumerate() {
        map.holding_registers.set(addr as u16, value);
    }

    let listener = listener(socket_addr)?;
    println!("Starting up server on {socket_addr}");

    let mut server = Server::new(map);
    server.begin(Slave::tcp_device().into())?;
    if let Some(ctx) = server.context_mut() {
        ctx.set_debug(true);
    }

    loop {
        if let Some(stream) = accept_pending(&listener)? {
            println!("Client connected from {:?}", stream.peer_addr());
            server.accept(stream)?;
        }
        if server.poll() {
            continue;
        }
        if server.state() == State::Accepted && !server.is_connected() {
            println!("Client disconnected");
            server.stop();
        }
        thread::sleep(Duration::from_millis(1));
    }
}
