// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A polled, single-client [Modbus](https://en.wikipedia.org/wiki/Modbus)
//! TCP protocol engine.
//!
//! The crate encodes the MBAP envelope, correlates transactions and drives a
//! cooperative accept/poll server loop over any byte stream that implements
//! [`backend::Stream`]. No threads or schedulers are involved: the caller
//! invokes [`server::Server::poll`] repeatedly and each call processes at most
//! one request to completion.
//!
//! Modbus is based on a [master/slave](https://en.wikipedia.org/wiki/Master/slave_(technology))
//! model. The master is called *client* and the slave is called *server*
//! in this library.
//!
//! ## Installation
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! modbus-poll = "*"
//! ```
//!
//! ## Server example
//!
//! ```no_run
//! # #[cfg(feature = "tcp-server")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use modbus_poll::{mapping::RegisterMap, server::{tcp, Server}};
//!
//! let mut map = RegisterMap::new();
//! map.configure_holding_registers(0, 16);
//!
//! let listener = tcp::listener("0.0.0.0:502".parse()?)?;
//! let mut server = Server::new(map);
//! server.begin(1)?;
//! loop {
//!     if let Some(stream) = tcp::accept_pending(&listener)? {
//!         server.accept(stream)?;
//!     }
//!     server.poll();
//! }
//! # }
//! # #[cfg(not(feature = "tcp-server"))]
//! # fn main() {}
//! ```

#![warn(rust_2018_idioms)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]

pub mod bytes {
    //! Re-export the `bytes` crate
    //!
    //! Needed to prevent version conflicts with types that are exposed
    //! by the public API, e.g. [`crate::mapping::Mapping`].
    pub use bytes::*;
}

pub mod prelude;

pub mod backend;
pub mod client;
pub mod codec;
pub mod context;
pub mod mapping;

#[cfg(feature = "server")]
pub mod server;

mod error;
pub use self::error::{ProtocolError, TransportError};

mod frame;
pub use self::frame::{
    tcp::{Header, Sft, HEADER_LENGTH, MAX_ADU_LENGTH},
    Address, Coil, ExceptionCode, ExceptionResponse, FunctionCode, Quantity, Word,
};

mod slave;
pub use self::slave::{Slave, SlaveContext, SlaveId};

/// Specialized [`std::result::Result`] type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
