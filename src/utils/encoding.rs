//! Binary sniffing and text decoding for candidate files.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

/// Number of leading bytes inspected when classifying a file.
pub const SNIFF_SIZE: usize = 8192;

/// Check if content is likely binary.
///
/// Files with a UTF-16 byte order mark are text even though they are full
/// of NUL bytes. Otherwise any NUL, or a high proportion of control bytes,
/// marks the content as binary.
pub fn is_binary(content: &[u8]) -> bool {
    let sample = &content[..content.len().min(SNIFF_SIZE)];

    if Encoding::for_bom(sample).is_some() {
        return false;
    }

    if memchr::memchr(0, sample).is_some() {
        return true;
    }

    let non_text_count = sample
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t' && b != 0x0c && b != 0x1b)
        .count();

    non_text_count > sample.len() / 8
}

/// Whole content is UTF-8 without a single NUL byte.
///
/// This is what ugrep needs to treat a file as text under `-I`.
pub fn is_clean_utf8(content: &[u8]) -> bool {
    memchr::memchr(0, content).is_none() && std::str::from_utf8(content).is_ok()
}

/// Guess the encoding of a file from its leading bytes.
pub fn sniff_encoding(sample: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => UTF_8,
        // Sample cut in the middle of a multi-byte sequence
        Err(e) if e.error_len().is_none() => UTF_8,
        Err(_) => detect(sample),
    }
}

fn detect(content: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(content, true);
    detector.guess(None, true)
}

/// Decode file content to text.
///
/// Valid UTF-8 is borrowed as-is. Anything else is decoded with the hinted
/// encoding, or a freshly detected one when the hint was UTF-8 but the
/// content is not. Returns `None` when decoding would lose characters.
pub fn decode<'a>(content: &'a [u8], hint: &'static Encoding) -> Option<Cow<'a, str>> {
    if Encoding::for_bom(content).is_none() {
        if let Ok(text) = std::str::from_utf8(content) {
            return Some(Cow::Borrowed(text));
        }
    }

    let encoding = if hint == UTF_8 { detect(content) } else { hint };
    let (text, _, had_errors) = encoding.decode(content);
    if had_errors { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_binary() {
        assert!(!is_binary(b"hello world\n"));
        assert!(is_binary(b"\x00\x00\x00\x00\x00\x00\x00\x00"));
        assert!(is_binary(b"ELF\x02\x01\x01\x00rest"));
    }

    #[test]
    fn test_clean_utf8_looks_past_the_sample() {
        let mut content = "plain text line\n".repeat(SNIFF_SIZE / 8).into_bytes();
        assert!(is_clean_utf8(&content));

        let mut with_nul = content.clone();
        with_nul.push(0);
        assert!(!is_binary(&with_nul));
        assert!(!is_clean_utf8(&with_nul));

        content.extend_from_slice(b"caf\xE9\n");
        assert_eq!(sniff_encoding(&content[..SNIFF_SIZE]), UTF_8);
        assert!(!is_clean_utf8(&content));
    }

    #[test]
    fn test_utf16_with_bom_is_text() {
        let mut content = vec![0xFF, 0xFE];
        for unit in "hi there".encode_utf16() {
            content.extend_from_slice(&unit.to_le_bytes());
        }
        assert!(!is_binary(&content));
        assert_eq!(sniff_encoding(&content), encoding_rs::UTF_16LE);
        assert_eq!(decode(&content, encoding_rs::UTF_16LE).unwrap(), "hi there");
    }

    #[test]
    fn test_utf8_is_borrowed() {
        let content = "naïve café".as_bytes();
        assert_eq!(sniff_encoding(content), UTF_8);
        assert!(matches!(decode(content, UTF_8), Some(Cow::Borrowed(_))));
    }

    #[test]
    fn test_truncated_sample_still_utf8() {
        let content = "日本語".as_bytes();
        assert_eq!(sniff_encoding(&content[..4]), UTF_8);
    }

    #[test]
    fn test_legacy_encoding_decodes() {
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("こんにちは世界、エラーが発生しました");
        assert!(std::str::from_utf8(&bytes).is_err());
        let text = decode(&bytes, encoding_rs::SHIFT_JIS).unwrap();
        assert!(text.contains("エラー"));
    }
}
