use std::io::Read;

/// Default block size is 32 MiB.
pub const BLOCK_SIZE: u64 = 32 * 1024 * 1024;

/// Number of blocks needed to hold `size` bytes. An empty file has zero blocks.
pub fn block_count(size: u64, block_size: u64) -> u64 {
    if block_size == 0 {
        return 0;
    }
    size.div_ceil(block_size)
}

/// Read the next block from `reader`.
///
/// Returns fewer than `block_size` bytes only at the end of the stream, and an
/// empty buffer once the stream is exhausted.
pub fn read_block<R: Read>(reader: &mut R, block_size: u64) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.take(block_size).read_to_end(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_count() {
        assert_eq!(block_count(0, 16), 0);
        assert_eq!(block_count(1, 16), 1);
        assert_eq!(block_count(15, 16), 1);
        assert_eq!(block_count(16, 16), 1);
        assert_eq!(block_count(17, 16), 2);
        assert_eq!(block_count(80, 16), 5);
        assert_eq!(block_count(BLOCK_SIZE + 1, BLOCK_SIZE), 2);
    }

    #[test]
    fn test_read_block() {
        let data: Vec<u8> = (0..40u8).collect();
        let mut reader = &data[..];

        assert_eq!(read_block(&mut reader, 16).unwrap(), &data[0..16]);
        assert_eq!(read_block(&mut reader, 16).unwrap(), &data[16..32]);
        assert_eq!(read_block(&mut reader, 16).unwrap(), &data[32..40]);
        assert!(read_block(&mut reader, 16).unwrap().is_empty());
    }
}
