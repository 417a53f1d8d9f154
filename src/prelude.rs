// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types and traits

///////////////////////////////////////////////////////////////////
/// Modules
///////////////////////////////////////////////////////////////////
pub use crate::client;

#[allow(missing_docs)]
#[cfg(feature = "tcp")]
pub mod tcp {
    pub use crate::client::tcp::*;
}

///////////////////////////////////////////////////////////////////
/// Types
///////////////////////////////////////////////////////////////////
pub use crate::client::{Client, Request};
pub use crate::context::Context;
pub use crate::mapping::{MappingRequest, RegisterMap};
pub use crate::{ExceptionCode, FunctionCode, ProtocolError, TransportError};
pub use crate::{Slave, SlaveId};

#[cfg(feature = "server")]
pub use crate::server::{Server, State};

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::backend::{Backend, Stream};
pub use crate::client::{Reader, Writer};
pub use crate::mapping::Mapping;
pub use crate::slave::SlaveContext;
