//! Fixed-size splitting of contract bytecode for staged upload

use crate::error::{Result, SmartApeError};

/// Default upload chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// An ordered slice of the bytecode blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position in the upload sequence
    pub index: usize,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Split `data` into chunks of `chunk_size` bytes; the last may be shorter.
///
/// Empty input yields no chunks. A zero chunk size is rejected.
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(SmartApeError::InvalidChunkSize);
    }
    Ok(data
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, piece)| Chunk {
            index,
            data: piece.to_vec(),
        })
        .collect())
}

/// Number of chunks `len` bytes split into
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        0
    } else {
        len.div_ceil(chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_multiple() {
        let data = vec![7u8; 2048];
        let chunks = split_into_chunks(&data, 1024).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 1024));
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_short_tail() {
        let data: Vec<u8> = (0..=255u8).cycle().take(2500).collect();
        let chunks = split_into_chunks(&data, 1024).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 452);
        assert_eq!(chunk_count(data.len(), 1024), 3);
    }

    #[test]
    fn test_single_small_chunk() {
        let chunks = split_into_chunks(b"6080", 1024).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data, b"6080".to_vec());
    }

    #[test]
    fn test_empty_input() {
        assert!(split_into_chunks(&[], 1024).unwrap().is_empty());
    }

    #[test]
    fn test_zero_chunk_size() {
        assert!(matches!(
            split_into_chunks(b"abc", 0),
            Err(SmartApeError::InvalidChunkSize)
        ));
    }
}
