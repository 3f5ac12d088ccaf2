//! Request body encoders.

use std::io::Write;

use bytes::Bytes;

use crate::config::Compression;
use crate::error::HttpError;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_WINDOW: u32 = 22;

/// Encodes `data` with `compression`; [`Compression::None`] returns it as is.
///
/// # Errors
/// Returns `HttpError::Compress` when the encoder fails.
pub fn compress(compression: Compression, data: Vec<u8>) -> Result<Bytes, HttpError> {
    let encoded = match compression {
        Compression::None => return Ok(Bytes::from(data)),
        Compression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&data).map_err(HttpError::Compress)?;
            encoder.finish().map_err(HttpError::Compress)?
        }
        Compression::Brotli => {
            let mut encoder = brotli::CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER_SIZE,
                BROTLI_QUALITY,
                BROTLI_WINDOW,
            );
            encoder.write_all(&data).map_err(HttpError::Compress)?;
            encoder.flush().map_err(HttpError::Compress)?;
            encoder.into_inner()
        }
        Compression::Zstd => {
            zstd::stream::encode_all(data.as_slice(), 0).map_err(HttpError::Compress)?
        }
    };
    Ok(Bytes::from(encoded))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Read;

    const PAYLOAD: &[u8] = br#"{"message":"hello","items":[1,2,3]}"#;

    #[test]
    fn test_none_is_identity() {
        let out = compress(Compression::None, PAYLOAD.to_vec()).unwrap();
        assert_eq!(out.as_ref(), PAYLOAD);
    }

    #[test]
    fn test_gzip_decodes_back() {
        let out = compress(Compression::Gzip, PAYLOAD.to_vec()).unwrap();
        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(out.as_ref())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, PAYLOAD);
    }

    #[test]
    fn test_brotli_decodes_back() {
        let out = compress(Compression::Brotli, PAYLOAD.to_vec()).unwrap();
        let mut decoded = Vec::new();
        brotli::Decompressor::new(out.as_ref(), BROTLI_BUFFER_SIZE)
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, PAYLOAD);
    }

    #[test]
    fn test_zstd_decodes_back() {
        let out = compress(Compression::Zstd, PAYLOAD.to_vec()).unwrap();
        assert_eq!(zstd::stream::decode_all(out.as_ref()).unwrap(), PAYLOAD);
    }
}
