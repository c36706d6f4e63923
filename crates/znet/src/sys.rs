// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Small libc helpers shared by [`crate::udp`] and [`crate::pool`].

use std::net::Ipv4Addr;
use std::os::fd::RawFd;

/// Builds an `AF_INET` sockaddr for `(addr, port)`, both fields converted
/// to network byte order.
pub(crate) fn sockaddr_in(addr: Ipv4Addr, port: u16) -> libc::sockaddr_in {
    libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: port.to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(addr.octets()),
        },
        sin_zero: [0; 8],
    }
}

/// Closes `fd` if it's a valid (non-negative) descriptor; a no-op
/// otherwise, so call sites don't need to guard every close themselves.
pub(crate) fn close_fd(fd: RawFd) {
    if fd >= 0 {
        // Safety: `fd` is a valid descriptor owned by the caller.
        unsafe {
            libc::close(fd);
        }
    }
}

/// True if the last OS error was `EAGAIN`/`EWOULDBLOCK`.
pub(crate) fn would_block() -> bool {
    let err = std::io::Error::last_os_error();
    matches!(
        err.raw_os_error(),
        Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK)
    )
}
