//! Incremental CRC-32 over streamed content

use std::io::{self, Read, Write};

use crc32fast::Hasher;

/// Running CRC-32 and byte count, folded one block at a time.
#[derive(Clone, Default)]
pub struct Crc32Fold {
    hasher: Hasher,
    len: u64,
}

impl Crc32Fold {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one block into the running value.
    #[must_use]
    pub fn fold(mut self, block: &[u8]) -> Self {
        self.hasher.update(block);
        self.len += block.len() as u64;
        self
    }

    /// Bytes folded so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Final `(crc32, byte count)`.
    #[must_use]
    pub fn finish(self) -> (u32, u64) {
        (self.hasher.finalize(), self.len)
    }
}

/// Copy `reader` into `writer` in `buffer_size` blocks, returning the CRC-32
/// and length of everything copied.
pub fn copy_with_crc<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> io::Result<(u32, u64)> {
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut crc = Crc32Fold::new();
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        crc = crc.fold(&buffer[..read]);
    }
    Ok(crc.finish())
}
