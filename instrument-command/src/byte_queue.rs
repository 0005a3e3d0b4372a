pub mod error {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Overflow;
}

/// Fixed capacity FIFO of bytes between a transfer engine and its task.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ByteQueue<const N: usize> {
    buf: [u8; N],
    start_cursor: usize,
    size: usize,
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteQueue<N> {
    const NON_EMPTY: () = assert!(N > 0, "a byte queue holds at least one byte");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_EMPTY;

        Self {
            buf: [0; N],
            start_cursor: 0,
            size: 0,
        }
    }

    /// Append bytes at the back.
    ///
    /// Bytes that fit are kept even when the rest overflows.
    pub fn ingest<'a>(&mut self, src: impl IntoIterator<Item = &'a u8>) -> Result<(), error::Overflow> {
        src.into_iter().try_for_each(|&byte| {
            if self.len() >= N {
                Err(error::Overflow)?;
            }

            let write_cursor = self.end_cursor();
            self.buf[write_cursor] = byte;
            self.size += 1;

            Ok(())
        })
    }

    /// Move the oldest bytes into `dst`, returning how many were moved.
    pub fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.len());

        for (slot, byte) in dst.iter_mut().zip(self.iter()) {
            *slot = *byte;
        }
        self.evict(count);

        count
    }

    /// Drop up to `count` of the oldest bytes.
    pub fn evict(&mut self, count: usize) {
        let count = count.min(self.len());

        self.start_cursor = Self::wrap(self.start_cursor + count);
        self.size -= count;
    }

    pub fn clear(&mut self) {
        self.start_cursor = 0;
        self.size = 0;
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &u8> {
        (0..self.len()).map(|offset| &self.buf[Self::wrap(self.start_cursor + offset)])
    }

    /// Wrap a provided cursor to adhere
    /// to the buffer size.
    #[inline]
    fn wrap(cursor: usize) -> usize {
        cursor % N
    }

    #[inline]
    fn end_cursor(&self) -> usize {
        Self::wrap(self.start_cursor + self.len())
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub const fn free(&self) -> usize {
        N - self.size
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
