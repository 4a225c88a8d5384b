/// One read's worth of PCM16 little-endian mono audio.
///
/// Borrows the capture buffer for the duration of a single loop iteration;
/// consumers copy what they need to keep.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    buffer: &'a [u8],
    valid_len: usize,
}

impl<'a> AudioFrame<'a> {
    /// `valid_len` may be shorter than the buffer after a short read.
    pub fn new(buffer: &'a [u8], valid_len: usize) -> Self {
        Self {
            buffer,
            valid_len: valid_len.min(buffer.len()),
        }
    }

    pub fn bytes(&self) -> &'a [u8] {
        &self.buffer[..self.valid_len]
    }

    pub fn len(&self) -> usize {
        self.valid_len
    }

    pub fn is_empty(&self) -> bool {
        self.valid_len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of complete 2-byte samples. A trailing odd byte is ignored.
    pub fn sample_count(&self) -> usize {
        self.valid_len / 2
    }

    /// `(low, high)` byte pairs of each complete sample.
    pub fn sample_pairs(&self) -> impl Iterator<Item = (u8, u8)> + 'a {
        self.bytes().chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }
}
