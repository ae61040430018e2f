//! 32-bit modular sum over little-endian words.
//!
//! A trailing partial word is zero-padded: the bytes `[a, b, c]` contribute the word
//! `u32::from_le_bytes([a, b, c, 0])`.

/// Incremental modular sum, so an image can be summed in chunks without holding it in RAM.
#[derive(Debug, Clone, Default)]
pub struct ModularSum {
    sum: u32,
    pending: [u8; 4],
    pending_len: usize,
}

impl ModularSum {
    pub const fn new() -> Self {
        Self {
            sum: 0,
            pending: [0; 4],
            pending_len: 0,
        }
    }

    pub fn update(&mut self, mut bytes: &[u8]) {
        if self.pending_len > 0 {
            let take = (4 - self.pending_len).min(bytes.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&bytes[..take]);
            self.pending_len += take;
            bytes = &bytes[take..];

            if self.pending_len < 4 {
                return;
            }
            self.sum = self.sum.wrapping_add(u32::from_le_bytes(self.pending));
            self.pending_len = 0;
        }

        let mut words = bytes.chunks_exact(4);
        for word in &mut words {
            self.sum = self
                .sum
                .wrapping_add(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        }

        let rest = words.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    pub fn finish(mut self) -> u32 {
        if self.pending_len > 0 {
            self.pending[self.pending_len..].fill(0);
            self.sum = self.sum.wrapping_add(u32::from_le_bytes(self.pending));
        }
        self.sum
    }
}

/// Modular sum of `bytes` in one go.
pub fn modular_sum(bytes: &[u8]) -> u32 {
    let mut sum = ModularSum::new();
    sum.update(bytes);
    sum.finish()
}
