use std::fs;
use std::io::{self, prelude::*};
use std::path;

use flate2::bufread::GzDecoder;

pub fn is_gzipped(header: &[u8]) -> bool {
    header.starts_with(b"\x1f\x8b")
}

pub fn is_gzipped_extension(path: path::PathBuf) -> (bool, path::PathBuf) {
    if let Some(ext) = path.extension() {
        if ext.to_ascii_lowercase() == "gz" {
            (true, path.with_extension(""))
        } else {
            (false, path)
        }
    } else {
        (false, path)
    }
}

/// Open a possibly gzip-compressed file as a buffered text stream, sniffing
/// the magic bytes rather than trusting the file extension alone
pub fn open_buffered(path: &path::Path) -> io::Result<Box<dyn BufRead>> {
    let handle = fs::File::open(path)?;
    let mut reader = io::BufReader::new(handle);
    if is_gzipped(reader.fill_buf()?) {
        Ok(Box::new(io::BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_magic_bytes() {
        assert!(is_gzipped(b"\x1f\x8b\x08"));
        assert!(!is_gzipped(b"ResultID\tScan"));
    }

    #[test]
    fn test_extension() {
        let (gz, path) = is_gzipped_extension(path::PathBuf::from("report.tsv.gz"));
        assert!(gz);
        assert_eq!(path, path::PathBuf::from("report.tsv"));

        let (gz, path) = is_gzipped_extension(path::PathBuf::from("report.tsv"));
        assert!(!gz);
        assert_eq!(path, path::PathBuf::from("report.tsv"));
    }
}
