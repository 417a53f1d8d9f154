// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory stream for unit tests.

use std::{
    cell::RefCell,
    collections::VecDeque,
    io,
    net::IpAddr,
    rc::Rc,
};

use super::Stream;

#[derive(Debug, Default)]
struct Inner {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    disconnected: bool,
    refuse_connect: bool,
    /// Upper bound for a single read, `0` means unlimited.
    read_chunk: usize,
    available_calls: usize,
    stop_calls: usize,
}

/// A stream whose clones share the same buffers.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockStream {
    inner: Rc<RefCell<Inner>>,
}

impl MockStream {
    pub(crate) fn push_rx(&self, bytes: &[u8]) {
        self.inner.borrow_mut().rx.extend(bytes);
    }

    pub(crate) fn take_tx(&self) -> Vec<u8> {
        std::mem::take(&mut self.inner.borrow_mut().tx)
    }

    pub(crate) fn rx_len(&self) -> usize {
        self.inner.borrow().rx.len()
    }

    pub(crate) fn disconnect(&self) {
        self.inner.borrow_mut().disconnected = true;
    }

    pub(crate) fn refuse_connect(&self) {
        self.inner.borrow_mut().refuse_connect = true;
    }

    pub(crate) fn set_read_chunk(&self, read_chunk: usize) {
        self.inner.borrow_mut().read_chunk = read_chunk;
    }

    pub(crate) fn available_calls(&self) -> usize {
        self.inner.borrow().available_calls
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.inner.borrow().stop_calls
    }
}

impl Stream for MockStream {
    fn connect(&mut self, _addr: IpAddr, _port: u16) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.refuse_connect {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        inner.disconnected = false;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.borrow_mut().tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        let mut len = buf.len().min(inner.rx.len());
        if inner.read_chunk > 0 {
            len = len.min(inner.read_chunk);
        }
        for (dst, src) in buf.iter_mut().zip(inner.rx.drain(..len)) {
            *dst = src;
        }
        Ok(len)
    }

    fn available(&mut self) -> usize {
        let mut inner = self.inner.borrow_mut();
        inner.available_calls += 1;
        inner.rx.len()
    }

    fn connected(&mut self) -> bool {
        !self.inner.borrow().disconnected
    }

    fn stop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.stop_calls += 1;
        inner.disconnected = true;
    }
}
