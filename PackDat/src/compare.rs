//! Block-by-block comparison of two byte streams
//!
//! Each step issues one block read on both streams at once through
//! [`rayon::join`] and compares the buffers once both have landed. Each
//! side owns its own buffer, so nothing is shared between the two reads.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// Whether `left` and `right` yield the same bytes.
///
/// `cancel` is checked before every block pair.
pub fn streams_equal<A, B>(
    left: &mut A,
    right: &mut B,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<bool>
where
    A: Read + Send + ?Sized,
    B: Read + Send + ?Sized,
{
    let buffer_size = buffer_size.max(1);
    let mut left_buf = vec![0u8; buffer_size];
    let mut right_buf = vec![0u8; buffer_size];

    loop {
        cancel.check()?;
        let (left_read, right_read) = rayon::join(
            || fill(left, &mut left_buf),
            || fill(right, &mut right_buf),
        );
        let left_read = left_read.map_err(Error::from_stream)?;
        let right_read = right_read.map_err(Error::from_stream)?;

        if left_read != right_read || left_buf[..left_read] != right_buf[..right_read] {
            return Ok(false);
        }
        if left_read == 0 {
            return Ok(true);
        }
    }
}

/// Whether two files hold identical bytes.
pub fn files_equal(
    left: impl AsRef<Path>,
    right: impl AsRef<Path>,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<bool> {
    let mut left = File::open(left)?;
    let mut right = File::open(right)?;
    if left.metadata()?.len() != right.metadata()?.len() {
        return Ok(false);
    }
    streams_equal(&mut left, &mut right, buffer_size, cancel)
}

/// Read until `buf` is full or the stream ends.
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
