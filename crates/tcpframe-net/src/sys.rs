use std::io;
use std::mem;
use std::net::{Ipv4Addr, TcpStream};
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::time::{Duration, Instant};

use tcpframe_core::Status;

// Fresh, unconnected IPv4 stream socket.
pub(crate) fn new_socket() -> io::Result<TcpStream> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let ty = libc::SOCK_STREAM | libc::SOCK_CLOEXEC;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let ty = libc::SOCK_STREAM;

    // SAFETY: plain syscall, no pointers involved.
    let fd = unsafe { libc::socket(libc::AF_INET, ty, 0) };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: fd is a freshly created socket that nothing else owns.
    Ok(unsafe { TcpStream::from_raw_fd(fd) })
}

pub(crate) fn connect(socket: &TcpStream, address: Ipv4Addr, port: u16) -> io::Result<()> {
    let addr = sockaddr_in(address, port);
    // SAFETY: addr outlives the call and the length matches its type.
    let res = unsafe {
        libc::connect(
            socket.as_raw_fd(),
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };

    if res == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sockaddr_in(address: Ipv4Addr, port: u16) -> libc::sockaddr_in {
    // SAFETY: all-zero is a valid sockaddr_in.
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_port = port.to_be();
    addr.sin_addr = libc::in_addr {
        s_addr: u32::from(address).to_be(),
    };

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        addr.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
    }

    addr
}

/// Block until `socket` is writable or `timeout` has elapsed.
///
/// `None` waits without a deadline. Returns `Ok(false)` on expiry. The
/// deadline is monotonic, so interrupted waits resume with whatever time is
/// left.
pub(crate) fn wait_writable(socket: &TcpStream, timeout: Option<Duration>) -> io::Result<bool> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut pfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLOUT,
        revents: 0,
    };

    loop {
        let millis = match deadline {
            None => -1,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(false);
                }
                // Round sub-millisecond remainders up instead of spinning.
                remaining.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int
            }
        };

        // SAFETY: pfd is a single valid pollfd.
        match unsafe { libc::poll(&mut pfd, 1, millis) } {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
            0 => {}
            _ => return Ok(true),
        }
    }
}

// Status for OS errors, including the codes std has no stable kind for.
// An interrupted connect keeps going in the kernel, so it counts as in progress.
pub(crate) fn status_of(err: &io::Error) -> Status {
    match err.raw_os_error() {
        Some(code) if code == libc::EINPROGRESS || code == libc::EALREADY || code == libc::EINTR => {
            Status::NotReady
        }
        Some(code) if code == libc::ENETRESET => Status::Disconnected,
        _ => Status::from_io_error(err),
    }
}
