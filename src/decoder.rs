use std::io::{self, Read, Write};

use thiserror::Error;

/// Streaming chunk size.
pub const DECODE_BUFFER_SIZE: usize = 64 * 1024;

/// Which side of a streamed decode failed.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// XORs every byte with `key`.
pub fn decode(data: &[u8], key: u8) -> Vec<u8> {
    data.iter().map(|&b| b ^ key).collect()
}

#[inline]
pub fn decode_in_place(data: &mut [u8], key: u8) {
    for b in data.iter_mut() {
        *b ^= key;
    }
}

/// Decodes `reader` into `writer` chunk by chunk and returns the byte count.
///
/// Byte order is preserved; memory use is bounded by [`DECODE_BUFFER_SIZE`].
/// The writer is not flushed.
pub fn decode_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    key: u8,
) -> Result<u64, StreamError> {
    let mut buffer = vec![0u8; DECODE_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StreamError::Read(e)),
        };

        decode_in_place(&mut buffer[..n], key);
        writer.write_all(&buffer[..n]).map_err(StreamError::Write)?;
        total += n as u64;
    }

    Ok(total)
}
