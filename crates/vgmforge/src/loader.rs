//! VGM Loader: reads a file that may be raw or gzip-compressed.
use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::TranscodeError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Read `path` into a flat byte image, transparently decompressing it if it
/// starts with the gzip magic (`.vgz` files are just gzipped `.vgm`).
///
/// Fails with [`TranscodeError::InvalidInput`] if the file is empty, and
/// with [`TranscodeError::IoError`] on any filesystem or decompression
/// failure.
pub fn read(path: impl AsRef<Path>) -> Result<Vec<u8>, TranscodeError> {
    let raw = fs::read(path)?;
    if raw.is_empty() {
        return Err(TranscodeError::InvalidInput("input file is empty".into()));
    }

    if raw.len() >= 2 && raw[0..2] == GZIP_MAGIC {
        let mut decoder = GzDecoder::new(&raw[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        if out.is_empty() {
            return Err(TranscodeError::InvalidInput(
                "decompressed input file is empty".into(),
            ));
        }
        Ok(out)
    } else {
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_raw_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("vgmforge_loader_raw_test.vgm");
        fs::write(&path, b"Vgm \x00\x00\x00\x00").unwrap();
        let bytes = read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"Vgm ");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn reads_gzip_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = std::env::temp_dir();
        let path = dir.join("vgmforge_loader_gz_test.vgz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"Vgm \x00\x00\x00\x00").unwrap();
        let compressed = encoder.finish().unwrap();
        fs::write(&path, compressed).unwrap();

        let bytes = read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"Vgm ");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn rejects_empty_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("vgmforge_loader_empty_test.vgm");
        fs::write(&path, b"").unwrap();
        let err = read(&path).unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidInput(_)));
        let _ = fs::remove_file(&path);
    }
}
