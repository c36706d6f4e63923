// Copyright (c) 2025-2026 the ztunnel-core contributors
// SPDX-License-Identifier: GPL-3.0-only

//! C ABI network surface (spec §6).
//!
//! All handles are opaque pointers owned by the caller once returned;
//! passing a dangling or already-freed handle is undefined behavior, same
//! as any C API. Invalid arguments that are merely absent (null pointers,
//! zero lengths) are treated as no-ops or benign failures rather than
//! panics — nothing in this module unwinds across the boundary.

use std::net::Ipv4Addr;
use std::os::fd::RawFd;

use crate::pool::Pool;
use crate::throttle::Throttle;
use crate::udp::UdpEngine;

/// A single packet's payload and peer address, laid out so a C caller can
/// read/write `data[0..len]` and `addr`/`port` directly between
/// [`packet_alloc`] and [`packet_free`].
#[repr(C)]
pub struct CPacket {
    data: *mut u8,
    capacity: usize,
    /// Current payload length; `<= capacity`.
    pub len: usize,
    /// Peer address, IPv4 host order.
    pub addr: u32,
    /// Peer port, host order.
    pub port: u16,
}

/// Allocates a packet buffer with room for `capacity` bytes. Returns null
/// if `capacity` is zero.
///
/// # Safety
///
/// The returned pointer must be released exactly once via
/// [`packet_free`], and not accessed after that call.
#[no_mangle]
pub unsafe extern "C" fn packet_alloc(capacity: usize) -> *mut CPacket {
    if capacity == 0 {
        return std::ptr::null_mut();
    }

    let mut storage = vec![0u8; capacity].into_boxed_slice();
    let data = storage.as_mut_ptr();
    std::mem::forget(storage);

    Box::into_raw(Box::new(CPacket {
        data,
        capacity,
        len: 0,
        addr: 0,
        port: 0,
    }))
}

/// Releases a packet buffer allocated by [`packet_alloc`]. A no-op if
/// `packet` is null.
///
/// # Safety
///
/// `packet` must be either null or a pointer previously returned by
/// [`packet_alloc`] and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn packet_free(packet: *mut CPacket) {
    if packet.is_null() {
        return;
    }

    // Safety: caller guarantees `packet` came from `packet_alloc` and
    // hasn't been freed yet.
    let boxed = unsafe { Box::from_raw(packet) };
    // Safety: `data`/`capacity` are exactly as returned by the
    // `into_boxed_slice`/`forget` pair in `packet_alloc`.
    let storage = unsafe {
        Box::from_raw(std::ptr::slice_from_raw_parts_mut(boxed.data, boxed.capacity))
    };
    drop(storage);
}

/// Binds a non-blocking UDP socket to `(INADDR_ANY, port)`. `port = 0`
/// selects an ephemeral port. Returns null on failure.
#[no_mangle]
pub extern "C" fn udp_bind(port: u16) -> *mut UdpEngine {
    match UdpEngine::bind(port) {
        Ok(engine) => Box::into_raw(Box::new(engine)),
        Err(e) => {
            tracing::warn!(error = %e, "udp_bind failed");
            std::ptr::null_mut()
        }
    }
}

/// Fills up to `max_n` of `packets` with currently queued datagrams.
/// Returns the number received, `0` if the queue was empty, or `-1` on
/// fatal error or invalid arguments.
///
/// # Safety
///
/// `handle` must be a live pointer from [`udp_bind`]; `packets` must point
/// to at least `max_n` valid, non-null `*mut CPacket` slots.
#[no_mangle]
pub unsafe extern "C" fn udp_recv_batch(
    handle: *mut UdpEngine,
    packets: *mut *mut CPacket,
    max_n: usize,
) -> i64 {
    if handle.is_null() || packets.is_null() || max_n == 0 {
        return -1;
    }

    // Safety: caller guarantees `handle` is live for the call's duration
    // and `packets` points to `max_n` valid `*mut CPacket` slots.
    let (engine, slots) = unsafe { (&*handle, std::slice::from_raw_parts_mut(packets, max_n)) };

    let mut received = 0i64;
    for slot in slots.iter() {
        if slot.is_null() {
            break;
        }
        // Safety: `*slot` is a valid, non-null `CPacket` from
        // `packet_alloc`.
        let packet = unsafe { &mut **slot };
        // Safety: `packet.data` spans `packet.capacity` bytes, allocated
        // by `packet_alloc`.
        let storage = unsafe { std::slice::from_raw_parts_mut(packet.data, packet.capacity) };

        match recv_one(engine.as_raw_fd(), storage) {
            Some((len, addr, port)) => {
                packet.len = len;
                packet.addr = addr;
                packet.port = port;
                received += 1;
            }
            None => break,
        }
    }

    received
}

/// Sends `packets[0..n]`'s payloads to their configured peer addresses.
/// Returns the number accepted by the kernel, or `-1` on hard failure with
/// zero accepted or invalid arguments.
///
/// # Safety
///
/// `handle` must be a live pointer from [`udp_bind`]; `packets` must point
/// to at least `n` valid, non-null `*mut CPacket` slots.
#[no_mangle]
pub unsafe extern "C" fn udp_send_batch(
    handle: *mut UdpEngine,
    packets: *mut *mut CPacket,
    n: usize,
) -> i64 {
    if handle.is_null() || packets.is_null() || n == 0 {
        return -1;
    }

    // Safety: caller guarantees `handle` is live for the call's duration
    // and `packets` points to `n` valid `*mut CPacket` slots.
    let (engine, slots) = unsafe { (&*handle, std::slice::from_raw_parts_mut(packets, n)) };

    let mut sent = 0i64;
    for slot in slots.iter() {
        if slot.is_null() {
            break;
        }
        let packet = unsafe { &**slot };
        let payload = unsafe { std::slice::from_raw_parts(packet.data, packet.len) };

        match send_one(engine.as_raw_fd(), payload, packet.addr, packet.port) {
            Some(()) => sent += 1,
            None => {
                return if sent == 0 { -1 } else { sent };
            }
        }
    }

    sent
}

fn recv_one(fd: RawFd, storage: &mut [u8]) -> Option<(usize, u32, u16)> {
    let mut sa = libc::sockaddr_in {
        sin_family: 0,
        sin_port: 0,
        sin_addr: libc::in_addr { s_addr: 0 },
        sin_zero: [0; 8],
    };
    let mut sa_len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

    // Safety: `storage` is a valid writable buffer; `sa`/`sa_len` match
    // `recvfrom`'s expected AF_INET output size.
    let rc = unsafe {
        libc::recvfrom(
            fd,
            storage.as_mut_ptr() as *mut libc::c_void,
            storage.len(),
            0,
            &mut sa as *mut libc::sockaddr_in as *mut libc::sockaddr,
            &mut sa_len,
        )
    };

    if rc < 0 {
        return None;
    }

    Some((
        rc as usize,
        u32::from_be(sa.sin_addr.s_addr),
        u16::from_be(sa.sin_port),
    ))
}

fn send_one(fd: RawFd, payload: &[u8], addr: u32, port: u16) -> Option<()> {
    let sa = crate::sys::sockaddr_in(Ipv4Addr::from(addr), port);

    // Safety: `payload` is a valid readable slice; `sa` is a valid,
    // correctly-sized sockaddr_in.
    let rc = unsafe {
        libc::sendto(
            fd,
            payload.as_ptr() as *const libc::c_void,
            payload.len(),
            0,
            &sa as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };

    if rc < 0 {
        None
    } else {
        Some(())
    }
}

/// Closes the socket and frees the handle. A no-op if `handle` is null.
///
/// # Safety
///
/// `handle` must be either null or a pointer previously returned by
/// [`udp_bind`] and not yet closed.
#[no_mangle]
pub unsafe extern "C" fn udp_close(handle: *mut UdpEngine) {
    if handle.is_null() {
        return;
    }
    // Safety: caller guarantees `handle` came from `udp_bind` and hasn't
    // been closed yet.
    drop(unsafe { Box::from_raw(handle) });
}

/// Creates a token-bucket throttle at `rate_bps` bytes/second. `0` means
/// unthrottled.
#[no_mangle]
pub extern "C" fn throttle_create(rate_bps: u64) -> *mut Throttle {
    Box::into_raw(Box::new(Throttle::new(rate_bps)))
}

/// Records a demand of `bytes`. Returns `1` if the caller must call
/// [`throttle_wait`] before proceeding, `0` if the bytes were already
/// available. A no-op (returns `0`) if `handle` is null.
///
/// # Safety
///
/// `handle` must be either null or a live pointer from
/// [`throttle_create`].
#[no_mangle]
pub unsafe extern "C" fn throttle_consume(handle: *mut Throttle, bytes: u64) -> i32 {
    if handle.is_null() {
        return 0;
    }
    // Safety: caller guarantees `handle` is live for the call's duration.
    let throttle = unsafe { &mut *handle };
    throttle.consume(bytes) as i32
}

/// Sleeps for the wait computed by the prior [`throttle_consume`] call.
/// A no-op if `handle` is null.
///
/// # Safety
///
/// `handle` must be either null or a live pointer from
/// [`throttle_create`].
#[no_mangle]
pub unsafe extern "C" fn throttle_wait(handle: *mut Throttle) {
    if handle.is_null() {
        return;
    }
    let throttle = unsafe { &mut *handle };
    throttle.wait();
}

/// Returns the throttle's current configured rate, or `0` if `handle` is
/// null.
///
/// # Safety
///
/// `handle` must be either null or a live pointer from
/// [`throttle_create`].
#[no_mangle]
pub unsafe extern "C" fn throttle_get_rate(handle: *const Throttle) -> u64 {
    if handle.is_null() {
        return 0;
    }
    let throttle = unsafe { &*handle };
    throttle.rate_bps()
}

/// Updates the throttle's rate, truncating current tokens to the new cap.
/// A no-op if `handle` is null.
///
/// # Safety
///
/// `handle` must be either null or a live pointer from
/// [`throttle_create`].
#[no_mangle]
pub unsafe extern "C" fn throttle_set_rate(handle: *mut Throttle, rate_bps: u64) {
    if handle.is_null() {
        return;
    }
    let throttle = unsafe { &mut *handle };
    throttle.set_rate(rate_bps);
}

/// Frees a throttle. A no-op if `handle` is null.
///
/// # Safety
///
/// `handle` must be either null or a pointer previously returned by
/// [`throttle_create`] and not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn throttle_destroy(handle: *mut Throttle) {
    if handle.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(handle) });
}

/// Creates a pool of up to `max_conns` TCP connections to
/// `(target_addr, target_port)`, `target_addr` in IPv4 host order.
#[no_mangle]
pub extern "C" fn pool_create(max_conns: usize, target_addr: u32, target_port: u16) -> *mut Pool {
    Box::into_raw(Box::new(Pool::create(
        max_conns,
        Ipv4Addr::from(target_addr),
        target_port,
    )))
}

/// Leases a connection, returning its raw file descriptor, or `-1` if the
/// pool is exhausted or `handle` is null.
///
/// # Safety
///
/// `handle` must be either null or a live pointer from [`pool_create`].
#[no_mangle]
pub unsafe extern "C" fn pool_acquire(handle: *mut Pool) -> i32 {
    if handle.is_null() {
        return -1;
    }
    let pool = unsafe { &mut *handle };
    match pool.acquire() {
        Ok(lease) => {
            let fd = lease.as_raw_fd();
            // The lease's only role for the C ABI is carrying the fd
            // across; the pool entry itself tracks `in_use` state and is
            // re-found by fd in `pool_release`.
            std::mem::forget(lease);
            fd
        }
        Err(e) => {
            tracing::debug!(error = %e, "pool_acquire failed");
            -1
        }
    }
}

/// Returns a leased connection (identified by the fd returned from
/// [`pool_acquire`]) to the pool. A no-op if `handle` is null or `fd`
/// doesn't match an in-use entry.
///
/// # Safety
///
/// `handle` must be either null or a live pointer from [`pool_create`].
#[no_mangle]
pub unsafe extern "C" fn pool_release(handle: *mut Pool, fd: i32) {
    if handle.is_null() {
        return;
    }
    let pool = unsafe { &mut *handle };
    pool.release_by_fd(fd);
}

/// Count of pool entries holding a live, non-leased connection, or `0` if
/// `handle` is null.
///
/// # Safety
///
/// `handle` must be either null or a live pointer from [`pool_create`].
#[no_mangle]
pub unsafe extern "C" fn pool_available(handle: *const Pool) -> usize {
    if handle.is_null() {
        return 0;
    }
    let pool = unsafe { &*handle };
    pool.available()
}

/// Closes every pooled connection and frees the pool. A no-op if `handle`
/// is null.
///
/// # Safety
///
/// `handle` must be either null or a pointer previously returned by
/// [`pool_create`] and not yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn pool_destroy(handle: *mut Pool) {
    if handle.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(handle) });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_alloc_zero_capacity_returns_null() {
        let p = unsafe { packet_alloc(0) };
        assert!(p.is_null());
    }

    #[test]
    fn packet_alloc_and_free_round_trips() {
        let p = unsafe { packet_alloc(128) };
        assert!(!p.is_null());
        unsafe {
            (*p).len = 4;
            (*p).addr = 0x7f00_0001;
            (*p).port = 80;
        }
        unsafe { packet_free(p) };
    }

    #[test]
    fn packet_free_null_is_a_no_op() {
        unsafe { packet_free(std::ptr::null_mut()) };
    }

    #[test]
    fn udp_bind_and_close_round_trip() {
        let handle = udp_bind(0);
        assert!(!handle.is_null());
        unsafe { udp_close(handle) };
    }

    #[test]
    fn udp_recv_batch_null_handle_is_an_error() {
        let mut packets: [*mut CPacket; 1] = [std::ptr::null_mut()];
        let rc = unsafe { udp_recv_batch(std::ptr::null_mut(), packets.as_mut_ptr(), 1) };
        assert_eq!(rc, -1);
    }

    #[test]
    fn throttle_lifecycle_round_trips() {
        let handle = throttle_create(1000);
        assert_eq!(unsafe { throttle_get_rate(handle) }, 1000);
        assert_eq!(unsafe { throttle_consume(handle, 500) }, 0);
        unsafe { throttle_set_rate(handle, 2000) };
        assert_eq!(unsafe { throttle_get_rate(handle) }, 2000);
        unsafe { throttle_destroy(handle) };
    }

    #[test]
    fn throttle_null_handle_is_a_no_op() {
        assert_eq!(unsafe { throttle_consume(std::ptr::null_mut(), 100) }, 0);
        unsafe { throttle_wait(std::ptr::null_mut()) };
        assert_eq!(unsafe { throttle_get_rate(std::ptr::null()) }, 0);
    }

    #[test]
    fn pool_lifecycle_round_trips() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept_thread = std::thread::spawn(move || {
            let _ = listener.accept();
        });

        let handle = pool_create(1, u32::from(Ipv4Addr::LOCALHOST), port);
        accept_thread.join().unwrap();

        let fd = unsafe { pool_acquire(handle) };
        assert!(fd >= 0);
        assert_eq!(unsafe { pool_available(handle) }, 0);

        unsafe { pool_release(handle, fd) };
        assert_eq!(unsafe { pool_available(handle) }, 1);

        unsafe { pool_destroy(handle) };
    }
}
