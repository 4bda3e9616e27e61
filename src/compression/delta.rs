use crate::compression::vbyte::VByteEncoder;
use crate::core::error::Result;

/// Delta encoding for sorted integers (record ids, positions)
pub struct DeltaEncoder;

impl DeltaEncoder {
    /// Writes `nums` (ascending) as a count followed by vbyte gaps.
    pub fn encode_u32_list(output: &mut Vec<u8>, nums: &[u32]) {
        VByteEncoder::encode_u32(output, nums.len() as u32);
        let mut prev = 0u32;
        for &num in nums {
            VByteEncoder::encode_u32(output, num.wrapping_sub(prev));
            prev = num;
        }
    }

    pub fn decode_u32_list(data: &[u8], pos: &mut usize) -> Result<Vec<u32>> {
        let (count, consumed) = VByteEncoder::decode_u32(data.get(*pos..).unwrap_or_default())?;
        *pos += consumed;

        let mut nums = Vec::with_capacity(count as usize);
        let mut prev = 0u32;
        for _ in 0..count {
            let (delta, consumed) = VByteEncoder::decode_u32(data.get(*pos..).unwrap_or_default())?;
            prev = prev.wrapping_add(delta);
            nums.push(prev);
            *pos += consumed;
        }

        Ok(nums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaps_are_small_for_dense_ids() {
        let ids: Vec<u32> = (1000..1100).collect();
        let mut out = Vec::new();
        DeltaEncoder::encode_u32_list(&mut out, &ids);
        // count + first gap (2 bytes) + 99 one-byte gaps
        assert_eq!(out.len(), 1 + 2 + 99);

        let mut pos = 0;
        assert_eq!(DeltaEncoder::decode_u32_list(&out, &mut pos).unwrap(), ids);
        assert_eq!(pos, out.len());
    }
}
