// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Polled single-client Modbus server
//!
//! The [`Server`] serves exactly one connection at a time. It owns no
//! threads: the caller accepts connections and invokes [`Server::poll`]
//! repeatedly, each call answering at most one request.

use log::{debug, warn};

use crate::{
    backend::{tcp::TcpBackend, Stream},
    context::Context,
    frame::tcp::MAX_ADU_LENGTH,
    mapping::Mapping,
    slave::{Slave, SlaveContext as _, SlaveId},
    ProtocolError, Result,
};

#[cfg(feature = "tcp-server")]
pub mod tcp;

/// Connection state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No client has been accepted.
    Idle,
    /// A client is bound and will be served by [`Server::poll`].
    Accepted,
}

#[derive(Debug)]
pub struct Server<M> {
    mapping: M,
    ctx: Option<Context>,
    state: State,
}

impl<M: Mapping> Server<M> {
    /// A server that answers requests from `mapping`.
    pub fn new(mapping: M) -> Self {
        Self {
            mapping,
            ctx: None,
            state: State::Idle,
        }
    }

    /// Prepare the protocol context for unit `unit_id`.
    ///
    /// Requests are answered regardless of the unit id they carry.
    pub fn begin(&mut self, unit_id: SlaveId) -> Result<()> {
        let mut ctx = Context::new(Box::new(TcpBackend::new()));
        ctx.set_slave(Slave(unit_id))?;
        if let Some(mut prev) = self.ctx.replace(ctx) {
            prev.close();
        }
        self.state = State::Idle;
        Ok(())
    }

    /// Bind the server to a connected client.
    ///
    /// A client that is already bound is abandoned without closing it.
    pub fn accept(&mut self, stream: impl Stream + 'static) -> Result<()> {
        let ctx = self.ctx.as_mut().ok_or(ProtocolError::InvalidArgument(
            "server has not been started",
        ))?;
        if self.state == State::Accepted {
            debug!("Abandoning the previous client");
        }
        ctx.backend_mut().attach(Box::new(stream));
        self.state = State::Accepted;
        Ok(())
    }

    /// Serve at most one pending request.
    ///
    /// Returns `true` if a request has been received and answered. Errors
    /// are logged and never propagated.
    pub fn poll(&mut self) -> bool {
        if self.state != State::Accepted {
            return false;
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return false;
        };
        if ctx.backend_mut().available() == 0 {
            return false;
        }
        let mut req = [0; MAX_ADU_LENGTH];
        let req_length = match ctx.receive_request(&mut req) {
            Ok(0) => return false,
            Ok(len) => len,
            Err(err) => {
                warn!("Failed to receive request: {err}");
                return false;
            }
        };
        match ctx.reply(&req[..req_length], &mut self.mapping) {
            Ok(()) => true,
            Err(ProtocolError::UnsupportedFunction(function)) => {
                debug!("Rejected unsupported function {function}");
                true
            }
            Err(err) => {
                warn!("Failed to reply: {err}");
                false
            }
        }
    }

    /// Close the current client and return to [`State::Idle`].
    pub fn stop(&mut self) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.close();
        }
        self.state = State::Idle;
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the bound client is still connected.
    pub fn is_connected(&mut self) -> bool {
        self.state == State::Accepted
            && self
                .ctx
                .as_mut()
                .map_or(false, |ctx| ctx.backend_mut().is_connected())
    }

    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut M {
        &mut self.mapping
    }

    /// The protocol context, available after [`begin`](Self::begin).
    pub fn context_mut(&mut self) -> Option<&mut Context> {
        self.ctx.as_mut()
    }

    pub fn into_mapping(self) -> M {
        self.mapping
    }
}
