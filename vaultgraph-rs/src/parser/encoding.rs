//! Text encoding detection.

use crate::error::ParseError;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

/// Decoded file text and the label of the encoding it was read as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: &'static str,
}

/// Decode raw file bytes.
///
/// Tries, in order: a byte order mark, UTF-16 guessed from the position of
/// NUL bytes, strict UTF-8, and Windows-1252. Text that still contains NULs or
/// replacement characters after that is rejected.
pub fn decode(bytes: &[u8]) -> Result<Decoded, ParseError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(encoding, &bytes[bom_len..]);
    }

    if let Some(encoding) = guess_utf16(bytes) {
        return decode_with(encoding, bytes);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return checked(text.to_string(), UTF_8);
    }

    decode_with(WINDOWS_1252, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<Decoded, ParseError> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(ParseError::Encoding {
            detail: format!("invalid {} byte sequence", encoding.name()),
        });
    }
    checked(text.into_owned(), encoding)
}

fn checked(text: String, encoding: &'static Encoding) -> Result<Decoded, ParseError> {
    if text.contains('\0') {
        return Err(ParseError::Encoding {
            detail: "binary content (NUL bytes)".to_string(),
        });
    }
    Ok(Decoded {
        text,
        encoding: encoding.name(),
    })
}

/// UTF-16 without a BOM shows up as ASCII with a NUL in every other byte.
fn guess_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.len() < 4 || bytes.len() % 2 != 0 {
        return None;
    }
    let sample = &bytes[..bytes.len().min(1024)];
    let pairs = sample.len() / 2;
    let even_nuls = sample.iter().step_by(2).filter(|b| **b == 0).count();
    let odd_nuls = sample.iter().skip(1).step_by(2).filter(|b| **b == 0).count();

    if odd_nuls * 10 >= pairs * 4 && even_nuls * 10 < pairs {
        Some(UTF_16LE)
    } else if even_nuls * 10 >= pairs * 4 && odd_nuls * 10 < pairs {
        Some(UTF_16BE)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8() {
        let decoded = decode("héllo #tag".as_bytes()).unwrap();
        assert_eq!(decoded.text, "héllo #tag");
        assert_eq!(decoded.encoding, "UTF-8");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"---\ntitle: x\n---\n");
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.text.starts_with("---"));
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "note".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.text, "note");
        assert_eq!(decoded.encoding, "UTF-16LE");
    }

    #[test]
    fn test_utf16be_without_bom() {
        let mut bytes = Vec::new();
        for unit in "hello world".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.text, "hello world");
        assert_eq!(decoded.encoding, "UTF-16BE");
    }

    #[test]
    fn test_latin1_fallback() {
        // "café" in Windows-1252
        let decoded = decode(&[0x63, 0x61, 0x66, 0xE9]).unwrap();
        assert_eq!(decoded.text, "café");
        assert_eq!(decoded.encoding, "windows-1252");
    }

    #[test]
    fn test_binary_rejected() {
        let err = decode(&[0x00, 0x01, 0x02, 0xFF, 0x00, 0x10, 0x9F]).unwrap_err();
        assert!(matches!(err, ParseError::Encoding { .. }));
    }
}
