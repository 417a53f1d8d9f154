// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use modbus_poll::{
    mapping::Mapping,
    server::{
        tcp::{accept_pending, listener},
        Server, State,
    },
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A server loop running on its own thread.
pub struct ServerHandle<M> {
    pub addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<anyhow::Result<M>>,
}

impl<M> ServerHandle<M> {
    /// Stop the loop and return the mapping it served.
    pub fn shutdown(self) -> anyhow::Result<M> {
        self.stop.store(true, Ordering::Relaxed);
        self.thread
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))?
    }
}

/// Serve `mapping` on an ephemeral loopback port until shut down.
pub fn spawn_server<M>(mapping: M) -> anyhow::Result<ServerHandle<M>>
where
    M: Mapping + Send + 'static,
{
    init_logger();
    let stop = Arc::new(AtomicBool::new(false));
    let (addr_tx, addr_rx) = mpsc::channel();
    let thread = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || -> anyhow::Result<M> {
            let listener = listener("127.0.0.1:0".parse()?)?;
            addr_tx.send(listener.local_addr()?)?;
            let mut server = Server::new(mapping);
            server.begin(1)?;
            while !stop.load(Ordering::Relaxed) {
                if let Some(stream) = accept_pending(&listener)? {
                    server.accept(stream)?;
                }
                if server.poll() {
                    continue;
                }
                if server.state() == State::Accepted && !server.is_connected() {
                    server.stop();
                }
                thread::sleep(Duration::from_millis(1));
            }
            server.stop();
            Ok(server.into_mapping())
        })
    };
    let addr = addr_rx.recv_timeout(Duration::from_secs(5))?;
    Ok(ServerHandle { addr, stop, thread })
}
