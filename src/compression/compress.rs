use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Compressed block storage for snapshot payloads
#[derive(Debug, Serialize, Deserialize)]
pub struct CompressedBlock {
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compression: CompressionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    Lz4,
}

impl CompressionType {
    pub fn tag(&self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::Lz4 => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lz4),
            other => Err(Error::new(ErrorKind::Corrupt, format!("unknown compression tag {}", other))),
        }
    }
}

impl CompressedBlock {
    pub fn compress(data: &[u8], compression: CompressionType) -> Self {
        let compressed = match compression {
            CompressionType::None => data.to_vec(),
            CompressionType::Lz4 => lz4_flex::block::compress(data),
        };

        CompressedBlock {
            data: compressed,
            original_size: data.len(),
            compression,
        }
    }

    pub fn decompress(&self) -> Result<Vec<u8>> {
        match self.compression {
            CompressionType::None => Ok(self.data.clone()),
            CompressionType::Lz4 => Ok(lz4_flex::block::decompress(&self.data, self.original_size)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lz4_block_restores_payload() {
        let payload = b"groonga groonga groonga groonga".repeat(8);
        let block = CompressedBlock::compress(&payload, CompressionType::Lz4);
        assert!(block.data.len() < payload.len());
        assert_eq!(block.decompress().unwrap(), payload);
    }
}
