//! Length-prefixed binary encoding shared by every node-to-node message.
//!
//! Each variable-length field is an 8 byte big-endian length followed by the
//! raw bytes. A list is an 8 byte big-endian element count followed by its
//! elements, each encoded as a field.
mod party_info;
mod payload;
mod raw;

pub use party_info::{decode_party_info, encode_party_info};
pub use payload::{
    decode_payload, decode_payload_with_recipients, encode_payload,
    encode_payload_with_recipients, EncodedPayload, EncodedPayloadWithRecipients,
};
pub use raw::{decode_raw_transaction, encode_raw_transaction, RawTransaction};

/// Largest length prefix accepted while decoding. Anything bigger than what
/// is left in the buffer is rejected anyway; this only guards the conversion.
const MAX_FIELD_LENGTH: u64 = i64::MAX as u64 - 1;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input ended while reading {field}")]
    Truncated { field: &'static str },
    #[error("length {length} of {field} is out of range")]
    LengthOutOfRange { field: &'static str, length: u64 },
    #[error("{field} has an invalid value")]
    InvalidValue { field: &'static str },
}

pub fn encode_count(buffer: &mut Vec<u8>, count: usize) {
    buffer.extend_from_slice(&(count as u64).to_be_bytes());
}

pub fn encode_field(buffer: &mut Vec<u8>, field: &[u8]) {
    encode_count(buffer, field.len());
    buffer.extend_from_slice(field);
}

pub fn encode_array<I, T>(buffer: &mut Vec<u8>, items: I)
where
    I: ExactSizeIterator<Item = T>,
    T: AsRef<[u8]>,
{
    encode_count(buffer, items.len());
    for item in items {
        encode_field(buffer, item.as_ref());
    }
}

/// Cursor over an encoded message. Every read names the field it is reading
/// so a decode failure says where the input went wrong.
pub struct ByteReader<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let bytes = self.take(8, field)?;
        let mut array = [0u8; 8];
        array.copy_from_slice(bytes);

        Ok(u64::from_be_bytes(array))
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, field)?[0])
    }

    /// Reads a count or length prefix and checks it against the bytes left.
    /// `min_element_size` is the smallest number of bytes each counted
    /// element can occupy.
    pub fn read_length(
        &mut self,
        field: &'static str,
        min_element_size: usize,
    ) -> Result<usize, DecodeError> {
        let length = self.read_u64(field)?;
        if length > MAX_FIELD_LENGTH {
            return Err(DecodeError::LengthOutOfRange { field, length });
        }

        let length = usize::try_from(length)
            .map_err(|_| DecodeError::LengthOutOfRange { field, length })?;
        if length.saturating_mul(min_element_size) > self.remaining() {
            return Err(DecodeError::Truncated { field });
        }

        Ok(length)
    }

    pub fn read_field(&mut self, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let length = self.read_length(field, 1)?;
        self.take(length, field)
    }

    pub fn read_array(&mut self, field: &'static str) -> Result<Vec<&'a [u8]>, DecodeError> {
        // Every element has at least its own 8 byte length prefix.
        let count = self.read_length(field, 8)?;

        (0..count).map(|_| self.read_field(field)).collect()
    }

    pub fn read_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let bytes = self.read_field(field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidValue { field })
    }

    fn take(&mut self, length: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if length > self.remaining() {
            return Err(DecodeError::Truncated { field });
        }

        let bytes = &self.input[self.position..self.position + length];
        self.position += length;

        Ok(bytes)
    }
}
