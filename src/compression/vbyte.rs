use crate::core::error::{Error, ErrorKind, Result};

/// Variable byte encoding for integers (best for small integers)
pub struct VByteEncoder;

impl VByteEncoder {
    /// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
    pub fn encode_u32(output: &mut Vec<u8>, mut value: u32) {
        while value >= 128 {
            output.push((value & 127) as u8 | 128);
            value >>= 7;
        }
        output.push(value as u8);
    }

    pub fn encode_u32_list(output: &mut Vec<u8>, nums: &[u32]) {
        Self::encode_u32(output, nums.len() as u32);
        for &num in nums {
            Self::encode_u32(output, num);
        }
    }

    /// Decode single u32 value, returns (value, bytes_consumed)
    pub fn decode_u32(input: &[u8]) -> Result<(u32, usize)> {
        let mut value = 0u32;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            value |= ((byte & 127) as u32) << shift;

            if byte & 128 == 0 {
                return Ok((value, consumed));
            }

            shift += 7;
            if shift > 28 {
                return Err(Error::new(ErrorKind::Corrupt, "VByte overflow"));
            }
        }

        Err(Error::new(ErrorKind::Corrupt, "Incomplete VByte"))
    }

    /// Decodes a length-prefixed list written by `encode_u32_list`.
    pub fn decode_u32_list(data: &[u8], pos: &mut usize) -> Result<Vec<u32>> {
        let (count, consumed) = Self::decode_u32(data.get(*pos..).unwrap_or_default())?;
        *pos += consumed;
        let mut nums = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (value, consumed) = Self::decode_u32(data.get(*pos..).unwrap_or_default())?;
            nums.push(value);
            *pos += consumed;
        }
        Ok(nums)
    }
}
