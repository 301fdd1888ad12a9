/// Two fixed-capacity byte buffers alternating between "fill" and "drain".
///
/// The producer copies into the fill buffer; when it becomes exactly full the
/// roles swap and the full buffer is handed out for draining while the other
/// buffer takes new bytes. Both buffers are allocated once, in `new`.
///
/// The drained view borrows the `DoubleBuffer`, so the borrow checker keeps the
/// drain buffer from being written while it is still being read.
#[derive(Debug)]
pub struct DoubleBuffer {
    buffers: [Box<[u8]>; 2],
    used: [usize; 2],
    fill: usize,
    capacity: usize,
    swaps: u64,
}

impl DoubleBuffer {
    /// Create two buffers of `capacity` bytes each (at least one byte).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffers: [
                vec![0u8; capacity].into_boxed_slice(),
                vec![0u8; capacity].into_boxed_slice(),
            ],
            used: [0, 0],
            fill: 0,
            capacity,
            swaps: 0,
        }
    }

    /// Copy as much of `data` as fits into the fill buffer.
    ///
    /// Returns the number of bytes consumed and, if the fill buffer became
    /// full, its contents for draining. Callers loop until all of `data` is
    /// consumed.
    pub fn push(&mut self, data: &[u8]) -> (usize, Option<&[u8]>) {
        let fill = self.fill;
        let used = self.used[fill];
        let n = data.len().min(self.capacity - used);
        self.buffers[fill][used..used + n].copy_from_slice(&data[..n]);
        self.used[fill] = used + n;

        if self.used[fill] < self.capacity {
            return (n, None);
        }

        self.fill = fill ^ 1;
        self.used[self.fill] = 0;
        self.swaps += 1;
        (n, Some(&self.buffers[fill][..self.capacity]))
    }

    /// Hand out the partially filled buffer at end-of-stream.
    ///
    /// Afterwards the fill buffer is logically empty.
    pub fn flush(&mut self) -> Option<&[u8]> {
        let fill = self.fill;
        let used = std::mem::take(&mut self.used[fill]);
        if used == 0 {
            return None;
        }
        Some(&self.buffers[fill][..used])
    }

    /// Drop any pending bytes and start over with buffer 0 filling.
    pub fn reset(&mut self) {
        self.used = [0, 0];
        self.fill = 0;
        self.swaps = 0;
    }

    /// Bytes waiting in the fill buffer.
    pub fn pending(&self) -> usize {
        self.used[self.fill]
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Role swaps since construction or the last `reset`.
    pub fn swaps(&self) -> u64 {
        self.swaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Push everything, collecting drained buffers, then flush.
    fn drain_all(buf: &mut DoubleBuffer, inputs: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for input in inputs {
            let mut rest = *input;
            while !rest.is_empty() {
                let (n, full) = buf.push(rest);
                if let Some(full) = full {
                    out.push(full.to_vec());
                }
                rest = &rest[n..];
            }
        }
        if let Some(tail) = buf.flush() {
            out.push(tail.to_vec());
        }
        out
    }

    #[test]
    fn partial_push_stays_pending() {
        let mut buf = DoubleBuffer::new(8);
        let (n, full) = buf.push(&[1, 2, 3]);

        assert_eq!(n, 3);
        assert!(full.is_none());
        assert_eq!(buf.pending(), 3);
        assert_eq!(buf.swaps(), 0);
    }

    #[test]
    fn exact_fill_swaps_roles() {
        let mut buf = DoubleBuffer::new(4);
        let (n, full) = buf.push(&[1, 2, 3, 4]);

        assert_eq!(n, 4);
        assert_eq!(full, Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(buf.pending(), 0);
        assert_eq!(buf.swaps(), 1);
    }

    #[test]
    fn overflow_leaves_remainder_for_next_push() {
        let mut buf = DoubleBuffer::new(4);
        buf.push(&[1, 2]);

        let (n, full) = buf.push(&[3, 4, 5, 6, 7]);
        assert_eq!(n, 2);
        assert_eq!(full, Some(&[1u8, 2, 3, 4][..]));

        let (n, full) = buf.push(&[5, 6, 7]);
        assert_eq!(n, 3);
        assert!(full.is_none());
        assert_eq!(buf.flush(), Some(&[5u8, 6, 7][..]));
    }

    #[test]
    fn alternating_buffers_do_not_clobber() {
        let mut buf = DoubleBuffer::new(2);
        let drained = drain_all(&mut buf, &[&[1, 2, 3, 4, 5, 6, 7]]);

        assert_eq!(drained, vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7]]);
        assert_eq!(buf.swaps(), 3);
    }

    #[test]
    fn flush_empties_and_is_none_when_empty() {
        let mut buf = DoubleBuffer::new(4);
        assert!(buf.flush().is_none());

        buf.push(&[9]);
        assert_eq!(buf.flush(), Some(&[9u8][..]));
        assert!(buf.flush().is_none());
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn concatenation_is_exact_for_many_shapes() {
        let source: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 251) as u8).collect();

        for capacity in [1, 3, 64, 512, 1024, 4096] {
            for chunk in [1, 7, 64, 500, 512, 3000] {
                let mut buf = DoubleBuffer::new(capacity);
                let inputs: Vec<&[u8]> = source.chunks(chunk).collect();
                let joined: Vec<u8> = drain_all(&mut buf, &inputs).concat();
                assert_eq!(joined, source, "capacity {capacity}, chunk {chunk}");
            }
        }
    }

    #[test]
    fn reset_discards_pending() {
        let mut buf = DoubleBuffer::new(4);
        buf.push(&[1, 2, 3, 4, 5]);
        buf.reset();

        assert_eq!(buf.pending(), 0);
        assert_eq!(buf.swaps(), 0);
        assert!(buf.flush().is_none());
    }
}
