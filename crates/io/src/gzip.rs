// Gzip detection + decompression for compressed attachments

use std::borrow::Cow;
use std::io::Read;

use flate2::read::GzDecoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decompress gzip bytes; anything else passes through untouched.
pub fn maybe_gunzip(bytes: &[u8]) -> Result<Cow<'_, [u8]>, String> {
    if !is_gzip(bytes) {
        return Ok(Cow::Borrowed(bytes));
    }
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| format!("gzip decode failed: {e}"))?;
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn round_trips_compressed_bytes() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"IPAI,1,2\n").unwrap();
        let compressed = encoder.finish().unwrap();

        assert!(is_gzip(&compressed));
        let out = maybe_gunzip(&compressed).unwrap();
        assert_eq!(&*out, b"IPAI,1,2\n");
    }

    #[test]
    fn plain_bytes_pass_through() {
        let out = maybe_gunzip(b"IPAI,1,2\n").unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn truncated_gzip_is_an_error() {
        let err = maybe_gunzip(&[0x1f, 0x8b, 0x08, 0x00]).unwrap_err();
        assert!(err.starts_with("gzip decode failed"));
    }
}
