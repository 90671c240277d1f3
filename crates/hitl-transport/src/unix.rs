//! [`ByteStream`] for Unix stream sockets.
//!
//! A `UnixStream::pair()` behaves like a null-modem cable between the
//! simulator and an emulated flight computer in the same process.

use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;

use crate::traits::ByteStream;

impl ByteStream for UnixStream {
    fn bytes_available(&self) -> io::Result<usize> {
        let fd = self.as_raw_fd();
        let mut waiting: libc::c_int = 0;

        // SAFETY: `fd` is an open socket descriptor owned by `self`, and
        // `waiting` is a valid writable `c_int` as FIONREAD requires.
        let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut waiting as *mut libc::c_int) };

        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(waiting.max(0) as usize)
    }

    fn try_clone_stream(&self) -> io::Result<Self> {
        self.try_clone()
    }
}
