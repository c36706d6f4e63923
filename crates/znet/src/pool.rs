// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Pre-warmed TCP connection pool (spec §4.9).
//!
//! The pool is **single-threaded**: callers sharing a [`Pool`] across
//! threads must serialize `acquire`/`release` themselves. An entry with
//! `fd >= 0` either holds a connected, validated-alive socket or is about
//! to be reset on the next `acquire` pass.

use std::mem::MaybeUninit;
use std::net::Ipv4Addr;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::sys::{close_fd, sockaddr_in};
use crate::timing::now_ns;

/// Entries to pre-warm synchronously at [`Pool::create`], capped by
/// `max_conns`.
const PREWARM_COUNT: usize = 4;

/// Hard timeout for a single connect attempt, per spec §4.9.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

struct Entry {
    fd: RawFd,
    in_use: bool,
    last_used_ms: u64,
}

impl Entry {
    const fn empty() -> Self {
        Self {
            fd: -1,
            in_use: false,
            last_used_ms: 0,
        }
    }
}

/// A fixed-size pool of TCP connections to a single target endpoint.
pub struct Pool {
    entries: Vec<Entry>,
    target_addr: Ipv4Addr,
    target_port: u16,
}

/// A leased connection, returned by [`Pool::acquire`].
///
/// Carries the index into the pool so [`Pool::release`] can find the
/// entry again; does not itself own or close the file descriptor.
pub struct Lease {
    index: usize,
    fd: RawFd,
}

impl Lease {
    /// The leased socket's raw file descriptor, for read/write use by the
    /// caller. Valid only until the matching [`Pool::release`] call.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

/// Opens a non-blocking TCP socket, connects to `(addr, port)` within
/// [`CONNECT_TIMEOUT`], enables `TCP_NODELAY`, and restores blocking mode.
/// Any failed step closes the socket and propagates the error.
fn connect(addr: Ipv4Addr, port: u16) -> Result<RawFd, Error> {
    // Safety: arguments are valid constants; `socket` either returns a
    // valid fd or -1.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(Error::syscall("socket"));
    }

    if let Err(e) = set_nodelay(fd) {
        close_fd(fd);
        return Err(e);
    }

    if let Err(e) = set_nonblocking(fd, true) {
        close_fd(fd);
        return Err(e);
    }

    let sa = sockaddr_in(addr, port);
    // Safety: `sa` is a valid, correctly-sized sockaddr_in; `connect` reads
    // but does not retain it.
    let rc = unsafe {
        libc::connect(
            fd,
            &sa as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };

    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINPROGRESS) {
            close_fd(fd);
            return Err(Error::Syscall {
                context: "connect",
                source: err,
            });
        }
    } else {
        // Connected immediately (e.g. loopback); still restore blocking.
        if let Err(e) = set_nonblocking(fd, false) {
            close_fd(fd);
            return Err(e);
        }
        return Ok(fd);
    }

    if !wait_writable(fd, CONNECT_TIMEOUT) {
        close_fd(fd);
        return Err(Error::ConnectTimeout(CONNECT_TIMEOUT));
    }

    match socket_error(fd) {
        Ok(0) => {}
        Ok(_) | Err(_) => {
            close_fd(fd);
            return Err(Error::syscall("connect"));
        }
    }

    if let Err(e) = set_nonblocking(fd, false) {
        close_fd(fd);
        return Err(e);
    }

    Ok(fd)
}

fn set_nodelay(fd: RawFd) -> Result<(), Error> {
    let flag: libc::c_int = 1;
    // Safety: `fd` is a freshly-created valid socket; `flag` is correctly
    // sized for `TCP_NODELAY`.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_NODELAY,
            &flag as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        Err(Error::syscall("setsockopt(TCP_NODELAY)"))
    } else {
        Ok(())
    }
}

fn set_nonblocking(fd: RawFd, nonblocking: bool) -> Result<(), Error> {
    // Safety: `fd` is a valid descriptor.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(Error::syscall("fcntl(F_GETFL)"));
    }

    let new_flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };

    // Safety: `fd` is a valid descriptor; `new_flags` is a valid flag set
    // derived from the descriptor's current flags.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, new_flags) };
    if rc < 0 {
        Err(Error::syscall("fcntl(F_SETFL)"))
    } else {
        Ok(())
    }
}

fn wait_writable(fd: RawFd, timeout: Duration) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return false;
        }

        // Safety: `pfd` is a single valid pollfd entry on the stack.
        let rc = unsafe { libc::poll(&mut pfd, 1, remaining.as_millis() as libc::c_int) };
        if rc > 0 {
            return pfd.revents & libc::POLLOUT != 0;
        }
        if rc == 0 {
            return false;
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return false;
        }
    }
}

fn socket_error(fd: RawFd) -> Result<libc::c_int, Error> {
    let mut err: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

    // Safety: `err`/`len` are valid out-pointers of the size `getsockopt`
    // expects for `SO_ERROR`.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    };

    if rc < 0 {
        Err(Error::syscall("getsockopt(SO_ERROR)"))
    } else {
        Ok(err)
    }
}

/// Non-blocking one-byte peek: `true` if the socket still looks alive
/// (either data queued or a clean would-block), `false` if the peer
/// closed or the socket is otherwise dead.
fn is_alive(fd: RawFd) -> bool {
    let mut byte = MaybeUninit::<u8>::uninit();
    // Safety: `byte` is a valid one-byte out-buffer; MSG_PEEK leaves any
    // queued data in the socket's receive buffer.
    let rc = unsafe {
        libc::recv(
            fd,
            byte.as_mut_ptr() as *mut libc::c_void,
            1,
            libc::MSG_PEEK | libc::MSG_DONTWAIT,
        )
    };

    if rc > 0 {
        return true;
    }
    if rc == 0 {
        return false;
    }

    let err = std::io::Error::last_os_error();
    matches!(
        err.raw_os_error(),
        Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK)
    )
}

impl Pool {
    /// Allocates `max_conns` entries for `(target_addr, target_port)` and
    /// pre-warms up to [`PREWARM_COUNT`] of them synchronously. Pre-warm
    /// failures are logged but not fatal — the pool simply starts smaller
    /// and fills lazily on the next `acquire`.
    pub fn create(max_conns: usize, target_addr: Ipv4Addr, target_port: u16) -> Self {
        let mut entries = Vec::with_capacity(max_conns);
        entries.resize_with(max_conns, Entry::empty);

        let warm = PREWARM_COUNT.min(max_conns);
        for entry in entries.iter_mut().take(warm) {
            match connect(target_addr, target_port) {
                Ok(fd) => entry.fd = fd,
                Err(e) => {
                    tracing::warn!(error = %e, "pool pre-warm connect failed");
                }
            }
        }

        Self {
            entries,
            target_addr,
            target_port,
        }
    }

    /// Leases a connection: a live idle entry if one exists, otherwise a
    /// fresh connect into an empty slot. Returns [`Error::PoolExhausted`]
    /// when every slot is filled and in use (or all live entries turned
    /// out dead and no free slot remains); propagates the underlying
    /// error if a fresh connect attempt itself fails.
    pub fn acquire(&mut self) -> Result<Lease, Error> {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if entry.in_use || entry.fd < 0 {
                continue;
            }

            if is_alive(entry.fd) {
                entry.in_use = true;
                entry.last_used_ms = now_ns() / 1_000_000;
                return Ok(Lease {
                    index: i,
                    fd: entry.fd,
                });
            }

            close_fd(entry.fd);
            entry.fd = -1;
        }

        let empty = self
            .entries
            .iter()
            .position(|e| e.fd < 0 && !e.in_use)
            .ok_or(Error::PoolExhausted)?;

        match connect(self.target_addr, self.target_port) {
            Ok(fd) => {
                let entry = &mut self.entries[empty];
                entry.fd = fd;
                entry.in_use = true;
                entry.last_used_ms = now_ns() / 1_000_000;
                Ok(Lease { index: empty, fd })
            }
            Err(e) => {
                tracing::warn!(error = %e, "pool connect failed");
                Err(e)
            }
        }
    }

    /// Returns a lease to the pool without closing its socket;
    /// re-validation happens lazily at the next `acquire`.
    pub fn release(&mut self, lease: Lease) {
        if let Some(entry) = self.entries.get_mut(lease.index) {
            entry.in_use = false;
            entry.last_used_ms = now_ns() / 1_000_000;
        }
    }

    /// Releases a lease by its raw file descriptor rather than a [`Lease`]
    /// value, for callers across the C ABI where only the fd crosses the
    /// boundary. A no-op if no in-use entry holds `fd`.
    pub fn release_by_fd(&mut self, fd: RawFd) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.in_use && e.fd == fd)
        {
            entry.in_use = false;
            entry.last_used_ms = now_ns() / 1_000_000;
        }
    }

    /// Count of entries holding a live connection that isn't leased out.
    pub fn available(&self) -> usize {
        self.entries.iter().filter(|e| !e.in_use && e.fd >= 0).count()
    }

    /// Closes every connection and drops the entry array.
    pub fn destroy(&mut self) {
        for entry in &mut self.entries {
            close_fd(entry.fd);
            entry.fd = -1;
            entry.in_use = false;
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn spawn_echo_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn prewarm_connects_up_to_the_cap() {
        let (listener, port) = spawn_echo_listener();
        let accept_thread = thread::spawn(move || {
            for _ in 0..2 {
                let _ = listener.accept();
            }
        });

        let pool = Pool::create(2, Ipv4Addr::LOCALHOST, port);
        assert_eq!(pool.available(), 2);

        accept_thread.join().unwrap();
    }

    #[test]
    fn acquire_release_round_trips_a_connection() {
        let (listener, port) = spawn_echo_listener();
        let accept_thread = thread::spawn(move || {
            let _ = listener.accept();
        });

        let mut pool = Pool::create(1, Ipv4Addr::LOCALHOST, port);
        accept_thread.join().unwrap();

        let lease = pool.acquire().expect("pool should have a live connection");
        assert_eq!(pool.available(), 0);

        pool.release(lease);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn acquire_detects_a_dead_connection_and_reconnects() {
        let (listener, port) = spawn_echo_listener();
        let accept_thread = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
            let (stream2, _) = listener.accept().unwrap();
            stream2
        });

        let mut pool = Pool::create(1, Ipv4Addr::LOCALHOST, port);
        // Give the listener a moment to close the first connection.
        thread::sleep(Duration::from_millis(50));

        let lease = pool.acquire().expect("pool should reconnect");
        let _stream2 = accept_thread.join().unwrap();
        drop(lease);
    }

    #[test]
    fn acquire_returns_pool_exhausted_when_full() {
        let (listener, port) = spawn_echo_listener();
        let accept_thread = thread::spawn(move || {
            let _ = listener.accept();
        });

        let mut pool = Pool::create(1, Ipv4Addr::LOCALHOST, port);
        accept_thread.join().unwrap();

        let _lease = pool.acquire().expect("first acquire should succeed");
        assert!(matches!(pool.acquire(), Err(Error::PoolExhausted)));
    }

    #[test]
    fn is_alive_reports_false_after_peer_shutdown() {
        let (listener, port) = spawn_echo_listener();
        let accept_thread = thread::spawn(move || listener.accept().unwrap().0);

        let fd = connect(Ipv4Addr::LOCALHOST, port).unwrap();
        let mut server_stream = accept_thread.join().unwrap();
        server_stream.shutdown(std::net::Shutdown::Both).unwrap();
        let mut discard = [0u8; 1];
        let _ = server_stream.read(&mut discard);

        thread::sleep(Duration::from_millis(50));
        assert!(!is_alive(fd));
        close_fd(fd);
    }
}
