//! LZMA compression of map definitions that do not fit into a GET url.

use std::io::Write;

use subtle_encoding::hex;
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

use crate::error::WindshaftError;

/// Compression preset used for map definitions.
pub const COMPRESSION_LEVEL: u32 = 3;

/// Compresses `data` into the legacy `.lzma` container understood by the service.
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>, WindshaftError> {
    let options = LzmaOptions::new_preset(level)?;
    let stream = Stream::new_lzma_encoder(&options)?;

    let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Compresses `data` and returns the lowercase hex representation of the result.
pub fn compress_to_hex(data: &[u8], level: u32) -> Result<String, WindshaftError> {
    let compressed = compress(data, level)?;
    String::from_utf8(hex::encode(compressed))
        .map_err(|err| WindshaftError::Compression(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use xz2::read::XzDecoder;

    use super::*;

    fn decompress(data: &[u8]) -> Vec<u8> {
        let stream = Stream::new_lzma_decoder(u64::MAX).unwrap();
        let mut decoder = XzDecoder::new_stream(data, stream);
        let mut result = vec![];
        decoder.read_to_end(&mut result).unwrap();
        result
    }

    #[test]
    fn compressed_data_can_be_decompressed() {
        let data = r#"{"config":"{\"version\":\"1.3.0\",\"layers\":[]}"}"#.repeat(20);
        let compressed = compress(data.as_bytes(), COMPRESSION_LEVEL).unwrap();

        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed), data.as_bytes());
    }

    #[test]
    fn hex_output_uses_lzma_alone_header() {
        let hex = compress_to_hex(b"select * from table", COMPRESSION_LEVEL).unwrap();

        // lc=3, lp=0, pb=2 properties byte
        assert!(hex.starts_with("5d"));
        assert!(hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
