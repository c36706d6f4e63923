// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Packet buffers used by the UDP batch engine.
//!
//! A [`PacketBuffer`] owns a fixed-capacity byte buffer plus the peer
//! address a datagram was received from or should be sent to. Buffers are
//! allocated by [`PacketBuffer::with_capacity`], filled by `recv_batch` or
//! by the caller before `send_batch`, and released exactly once by
//! dropping them — there is no shared ownership between the engine and its
//! caller at any point.

/// A single packet's payload plus its IPv4 peer address, in host order.
pub struct PacketBuffer {
    data: Vec<u8>,
    len: usize,
    addr: u32,
    port: u16,
}

impl PacketBuffer {
    /// Allocates a buffer with room for `capacity` bytes and zero length.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            len: 0,
            addr: 0,
            port: 0,
        }
    }

    /// Total allocated capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current payload length; always `<= capacity()`.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer currently carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The payload, as written by the last receive or by the caller.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The full backing storage, for receive paths that fill the buffer
    /// before the final length is known.
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Sets the payload length, clamped to `capacity()`.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    /// Copies `payload` into the buffer, truncating to `capacity()`.
    pub fn set_payload(&mut self, payload: &[u8]) {
        let n = payload.len().min(self.data.len());
        self.data[..n].copy_from_slice(&payload[..n]);
        self.len = n;
    }

    /// Peer address, IPv4 host order.
    pub fn addr(&self) -> u32 {
        self.addr
    }

    /// Peer port, host order.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Sets the peer address/port (source on receive, destination on send).
    pub fn set_peer(&mut self, addr: u32, port: u16) {
        self.addr = addr;
        self.port = port;
    }
}
