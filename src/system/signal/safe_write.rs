use std::os::fd::RawFd;

/// A fixed-size line buffer that can be filled and written out from inside a signal handler.
///
/// Nothing here allocates, locks or goes through `std::fmt`: bytes are copied into an array on the
/// stack and flushed with a single `write(2)`. Input that does not fit is dropped.
pub(crate) struct SignalSafeWriter<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> SignalSafeWriter<N> {
    pub(crate) const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
        }
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        let room = N - self.len;
        let count = if bytes.len() < room { bytes.len() } else { room };
        self.buf[self.len..self.len + count].copy_from_slice(&bytes[..count]);
        self.len += count;
        self
    }

    /// Append `num` in base 10.
    pub(crate) fn push_decimal(&mut self, num: i64) -> &mut Self {
        // i64::MIN has 19 digits plus the sign
        let mut digits = [0u8; 20];
        let mut pos = digits.len();
        let mut n = num.unsigned_abs();

        loop {
            pos -= 1;
            digits[pos] = b'0' + (n % 10) as u8;
            n /= 10;
            if n == 0 {
                break;
            }
        }

        if num < 0 {
            pos -= 1;
            digits[pos] = b'-';
        }

        self.push_bytes(&digits[pos..])
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Write the buffered bytes to `fd` with one `write(2)` call and clear the buffer.
    pub(crate) fn flush_to(&mut self, fd: RawFd) -> libc::ssize_t {
        let written = unsafe { libc::write(fd, self.buf.as_ptr().cast(), self.len) };
        self.len = 0;
        written
    }
}
