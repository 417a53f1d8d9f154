// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Talks to the `tcp-server` example.

use modbus_poll::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let socket_addr = "127.0.0.1:5502".parse()?;

    println!("CLIENT: Connecting client...");
    let mut ctx = tcp::connect(socket_addr)?;

    println!("CLIENT: Reading 2 input registers...");
    let response = ctx.read_input_registers(0x00, 2)?;
    println!("CLIENT: The result is '{response:?}'");

    println!("CLIENT: Writing 2 holding registers...");
    ctx.write_multiple_registers(0x01, &[7777, 8888])?;

    println!("CLIENT: Reading 4 holding registers...");
    let response = ctx.read_holding_registers(0x00, 4)?;
    println!("CLIENT: The result is '{response:?}'");

    // Reading beyond the configured table yields an exception.
    println!("CLIENT: Reading nonexistent holding register address... (should return IllegalDataAddress)");
    match ctx.read_holding_registers(0x100, 1) {
        Err(ProtocolError::Exception(rsp)) => println!("CLIENT: Got exception '{rsp}'"),
        other => println!("CLIENT: Unexpected result '{other:?}'"),
    }

    println!("CLIENT: Done.");
    ctx.close();
    Ok(())
}
