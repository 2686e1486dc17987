use crate::framing::LENGTH_PREFIX_LEN;

// Partial-receive assembly state of the frame currently being read.
#[derive(Debug, Default)]
pub(crate) struct PendingFrame {
    pub prefix: [u8; LENGTH_PREFIX_LEN],
    pub prefix_received: usize,
    // Decoded once the whole prefix has arrived.
    pub expected: Option<u32>,
    pub payload: Vec<u8>,
}

impl PendingFrame {
    pub fn prefix_complete(&self) -> bool {
        self.prefix_received == LENGTH_PREFIX_LEN
    }

    // Bytes of the current frame received so far, prefix included.
    pub fn received(&self) -> usize {
        self.prefix_received + self.payload.len()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
