// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Batched non-blocking UDP I/O (spec §4.7).
//!
//! `recv_batch`/`send_batch` use a single vectored syscall
//! (`recvmmsg`/`sendmmsg`) on Linux and fall back to a per-datagram
//! non-blocking loop everywhere else. Packet buffer ownership never
//! crosses into the engine: callers pass `&mut` slices of buffers they
//! continue to own.

use std::net::Ipv4Addr;
use std::os::fd::RawFd;

use crate::error::Error;
use crate::packet::PacketBuffer;
use crate::sys::{close_fd, sockaddr_in, would_block};

/// Best-effort send/receive buffer size requested at bind time.
const SOCKET_BUFFER_BYTES: libc::c_int = 4 * 1024 * 1024;

fn set_socket_buffers(fd: RawFd) {
    for (opt, name) in [
        (libc::SO_RCVBUF, "SO_RCVBUF"),
        (libc::SO_SNDBUF, "SO_SNDBUF"),
    ] {
        // Safety: `fd` is a valid socket; the option value is a correctly
        // sized `c_int`. Failure is logged and otherwise ignored — the
        // spec treats this as best-effort.
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                opt,
                &SOCKET_BUFFER_BYTES as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            tracing::debug!(option = name, "best-effort setsockopt failed");
        }
    }
}

fn set_nonblocking(fd: RawFd) -> Result<(), Error> {
    // Safety: `fd` is a valid descriptor.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(Error::syscall("fcntl(F_GETFL)"));
    }
    // Safety: `fd` is a valid descriptor; `flags | O_NONBLOCK` is a valid
    // flag set derived from the descriptor's current flags.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        Err(Error::syscall("fcntl(F_SETFL)"))
    } else {
        Ok(())
    }
}

/// A bound, non-blocking UDP socket.
pub struct UdpEngine {
    fd: RawFd,
    local_port: u16,
}

impl UdpEngine {
    /// Opens an `AF_INET` datagram socket, enables address reuse, requests
    /// 4MiB send/receive buffers (best-effort), and binds to
    /// `(INADDR_ANY, port)`. `port = 0` selects an ephemeral port. Any
    /// failed step releases the socket and returns the failure.
    pub fn bind(port: u16) -> Result<Self, Error> {
        // Safety: arguments are valid constants; `socket` either returns a
        // valid fd or -1.
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(Error::syscall("socket"));
        }

        let reuse: libc::c_int = 1;
        // Safety: `fd` is a freshly-created valid socket; `reuse` is
        // correctly sized for `SO_REUSEADDR`.
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &reuse as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            close_fd(fd);
            return Err(Error::syscall("setsockopt(SO_REUSEADDR)"));
        }

        set_socket_buffers(fd);

        if let Err(e) = set_nonblocking(fd) {
            close_fd(fd);
            return Err(e);
        }

        let sa = sockaddr_in(Ipv4Addr::UNSPECIFIED, port);
        // Safety: `sa` is a valid, correctly-sized sockaddr_in.
        let rc = unsafe {
            libc::bind(
                fd,
                &sa as *const libc::sockaddr_in as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            close_fd(fd);
            return Err(Error::syscall("bind"));
        }

        let local_port = if port != 0 {
            port
        } else {
            local_port_of(fd)?
        };

        Ok(Self { fd, local_port })
    }

    /// The bound local port (resolved from the kernel when `bind` was
    /// called with port `0`).
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// The underlying socket's raw file descriptor, for FFI call sites
    /// that issue syscalls directly against a single packet at a time.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Fills up to `buffers.len()` packet buffers with datagrams currently
    /// queued. Returns the number received: `0` if the queue was empty,
    /// positive on success, `-1` on fatal error. Non-blocking; never waits
    /// for a datagram to arrive.
    pub fn recv_batch(&self, buffers: &mut [PacketBuffer]) -> i64 {
        #[cfg(target_os = "linux")]
        {
            recv_batch_linux(self.fd, buffers)
        }
        #[cfg(not(target_os = "linux"))]
        {
            recv_batch_fallback(self.fd, buffers)
        }
    }

    /// Sends each buffer's `payload()` to its configured peer address.
    /// Returns the number accepted by the kernel (may be less than
    /// `buffers.len()` on partial progress), or `-1` only on hard failure
    /// with zero accepted.
    pub fn send_batch(&self, buffers: &[PacketBuffer]) -> i64 {
        #[cfg(target_os = "linux")]
        {
            send_batch_linux(self.fd, buffers)
        }
        #[cfg(not(target_os = "linux"))]
        {
            send_batch_fallback(self.fd, buffers)
        }
    }
}

impl Drop for UdpEngine {
    fn drop(&mut self) {
        close_fd(self.fd);
    }
}

fn local_port_of(fd: RawFd) -> Result<u16, Error> {
    let mut sa = libc::sockaddr_in {
        sin_family: 0,
        sin_port: 0,
        sin_addr: libc::in_addr { s_addr: 0 },
        sin_zero: [0; 8],
    };
    let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

    // Safety: `sa`/`len` are valid out-pointers matching `getsockname`'s
    // expected buffer size for an AF_INET socket.
    let rc = unsafe {
        libc::getsockname(
            fd,
            &mut sa as *mut libc::sockaddr_in as *mut libc::sockaddr,
            &mut len,
        )
    };
    if rc < 0 {
        Err(Error::syscall("getsockname"))
    } else {
        Ok(u16::from_be(sa.sin_port))
    }
}

#[cfg(not(target_os = "linux"))]
fn recv_batch_fallback(fd: RawFd, buffers: &mut [PacketBuffer]) -> i64 {
    let mut received = 0i64;

    for buf in buffers.iter_mut() {
        let mut sa = libc::sockaddr_in {
            sin_family: 0,
            sin_port: 0,
            sin_addr: libc::in_addr { s_addr: 0 },
            sin_zero: [0; 8],
        };
        let mut sa_len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

        // Safety: `buf.storage_mut()` is a valid writable buffer of its
        // own reported length; `sa`/`sa_len` match `recvfrom`'s expected
        // AF_INET output size.
        let n = unsafe {
            libc::recvfrom(
                fd,
                buf.storage_mut().as_mut_ptr() as *mut libc::c_void,
                buf.capacity(),
                0,
                &mut sa as *mut libc::sockaddr_in as *mut libc::sockaddr,
                &mut sa_len,
            )
        };

        if n < 0 {
            if would_block() {
                break;
            }
            return if received == 0 { -1 } else { received };
        }

        buf.set_len(n as usize);
        buf.set_peer(u32::from_be(sa.sin_addr.s_addr), u16::from_be(sa.sin_port));
        received += 1;
    }

    received
}

#[cfg(not(target_os = "linux"))]
fn send_batch_fallback(fd: RawFd, buffers: &[PacketBuffer]) -> i64 {
    let mut sent = 0i64;

    for buf in buffers.iter() {
        let sa = sockaddr_in(Ipv4Addr::from(buf.addr()), buf.port());

        // Safety: `buf.payload()` is a valid readable slice; `sa` is a
        // valid, correctly-sized sockaddr_in.
        let n = unsafe {
            libc::sendto(
                fd,
                buf.payload().as_ptr() as *const libc::c_void,
                buf.payload().len(),
                0,
                &sa as *const libc::sockaddr_in as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };

        if n < 0 {
            if would_block() {
                break;
            }
            return if sent == 0 { -1 } else { sent };
        }

        sent += 1;
    }

    sent
}

#[cfg(target_os = "linux")]
fn recv_batch_linux(fd: RawFd, buffers: &mut [PacketBuffer]) -> i64 {
    if buffers.is_empty() {
        return 0;
    }

    let mut iovecs: Vec<libc::iovec> = Vec::with_capacity(buffers.len());
    let mut addrs: Vec<libc::sockaddr_in> = vec![
        libc::sockaddr_in {
            sin_family: 0,
            sin_port: 0,
            sin_addr: libc::in_addr { s_addr: 0 },
            sin_zero: [0; 8],
        };
        buffers.len()
    ];

    for buf in buffers.iter_mut() {
        iovecs.push(libc::iovec {
            iov_base: buf.storage_mut().as_mut_ptr() as *mut libc::c_void,
            iov_len: buf.capacity(),
        });
    }

    let mut msgs: Vec<libc::mmsghdr> = iovecs
        .iter_mut()
        .zip(addrs.iter_mut())
        .map(|(iov, addr)| libc::mmsghdr {
            msg_hdr: libc::msghdr {
                msg_name: addr as *mut libc::sockaddr_in as *mut libc::c_void,
                msg_namelen: std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                msg_iov: iov as *mut libc::iovec,
                msg_iovlen: 1,
                msg_control: std::ptr::null_mut(),
                msg_controllen: 0,
                msg_flags: 0,
            },
            msg_len: 0,
        })
        .collect();

    // Safety: `msgs` holds `buffers.len()` correctly initialized
    // `mmsghdr` entries, each pointing at a live iovec/sockaddr pair owned
    // by this stack frame; `MSG_DONTWAIT` guarantees the call returns
    // immediately rather than blocking.
    let n = unsafe {
        libc::recvmmsg(
            fd,
            msgs.as_mut_ptr(),
            msgs.len() as libc::c_uint,
            libc::MSG_DONTWAIT,
            std::ptr::null_mut(),
        )
    };

    if n < 0 {
        return if would_block() { 0 } else { -1 };
    }

    for i in 0..n as usize {
        buffers[i].set_len(msgs[i].msg_len as usize);
        buffers[i].set_peer(
            u32::from_be(addrs[i].sin_addr.s_addr),
            u16::from_be(addrs[i].sin_port),
        );
    }

    n as i64
}

#[cfg(target_os = "linux")]
fn send_batch_linux(fd: RawFd, buffers: &[PacketBuffer]) -> i64 {
    if buffers.is_empty() {
        return 0;
    }

    let mut iovecs: Vec<libc::iovec> = buffers
        .iter()
        .map(|buf| libc::iovec {
            iov_base: buf.payload().as_ptr() as *mut libc::c_void,
            iov_len: buf.payload().len(),
        })
        .collect();

    let mut addrs: Vec<libc::sockaddr_in> = buffers
        .iter()
        .map(|buf| sockaddr_in(Ipv4Addr::from(buf.addr()), buf.port()))
        .collect();

    let mut msgs: Vec<libc::mmsghdr> = iovecs
        .iter_mut()
        .zip(addrs.iter_mut())
        .map(|(iov, addr)| libc::mmsghdr {
            msg_hdr: libc::msghdr {
                msg_name: addr as *mut libc::sockaddr_in as *mut libc::c_void,
                msg_namelen: std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                msg_iov: iov as *mut libc::iovec,
                msg_iovlen: 1,
                msg_control: std::ptr::null_mut(),
                msg_controllen: 0,
                msg_flags: 0,
            },
            msg_len: 0,
        })
        .collect();

    // Safety: `msgs` holds `buffers.len()` correctly initialized
    // `mmsghdr` entries pointing at live iovec/sockaddr pairs owned by
    // this stack frame; `MSG_DONTWAIT` guarantees the call does not
    // block.
    let n = unsafe {
        libc::sendmmsg(
            fd,
            msgs.as_mut_ptr(),
            msgs.len() as libc::c_uint,
            libc::MSG_DONTWAIT,
        )
    };

    if n < 0 {
        return -1;
    }

    n as i64
}
