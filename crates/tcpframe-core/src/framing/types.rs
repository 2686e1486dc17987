use crate::framing::FramingError;

// Size of the big-endian u32 length prefix in front of every frame.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// One message: an opaque payload plus the resume cursor of an in-flight send.
///
/// Encoding structured values into the payload is the caller's business.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub(crate) payload: Vec<u8>,
    // Bytes of the encoded frame already handed to the transport.
    pub(crate) send_pos: usize,
    // Session the cursor belongs to; a cursor from another session is stale.
    pub(crate) send_session: Option<u64>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn append(&mut self, data: &[u8]) {
        self.payload.extend_from_slice(data);
    }

    pub fn clear(&mut self) {
        self.payload.clear();
        self.reset_cursor();
    }

    // True while a previous send of this message returned Partial.
    pub fn is_send_pending(&self) -> bool {
        self.send_pos > 0
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub(crate) fn reset_cursor(&mut self) {
        self.send_pos = 0;
        self.send_session = None;
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Self { payload, ..Self::default() }
    }
}

impl From<&[u8]> for Message {
    fn from(payload: &[u8]) -> Self {
        Self::from(payload.to_vec())
    }
}

// Messages compare by payload only.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

impl Eq for Message {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_frame_len: u32,
}

impl FrameLimits {
    // Anything the u32 prefix can express.
    pub const DEFAULT: FrameLimits = FrameLimits {
        max_frame_len: u32::MAX,
    };

    pub fn new(max_frame_len: u32) -> Self {
        Self { max_frame_len }
    }

    // Zero-length frames are valid.
    pub fn validate_len(&self, len: usize) -> Result<u32, FramingError> {
        u32::try_from(len)
            .ok()
            .filter(|len| *len <= self.max_frame_len)
            .ok_or(FramingError::FrameTooLarge {
                len: len as u64,
                max: self.max_frame_len,
            })
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}
