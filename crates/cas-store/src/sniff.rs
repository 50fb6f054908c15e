//! Media type classification from a bounded content prefix.
//!
//! Only the first [`SNIFF_LEN`] bytes are ever inspected. The table follows
//! the WHATWG MIME sniffing rules for the "safe" signatures: markup is matched
//! after leading whitespace and case-insensitively, binary formats by exact
//! magic bytes, and anything unmatched is text unless it contains control
//! bytes that never appear in text.

/// Number of leading bytes used for classification.
pub const SNIFF_LEN: usize = 512;

/// Fallback for binary and unknown content, including empty content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Fallback for content that looks like text.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

const HTML: &str = "text/html; charset=utf-8";
const XML: &str = "text/xml; charset=utf-8";

/// Markup openers recognized as HTML when followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Exact leading signatures.
const MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", TEXT_PLAIN),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"ID3", "audio/mpeg"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"\x00\x01\x00\x00", "font/ttf"),
    (b"OTTO", "font/otf"),
    (b"ttcf", "font/collection"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"\x00asm", "application/wasm"),
];

/// Container formats: four-byte outer tag, four bytes of length, then an
/// inner tag at offset 8.
const CONTAINERS: &[(&[u8], &[u8], &str)] = &[
    (b"RIFF", b"WEBPVP", "image/webp"),
    (b"RIFF", b"WAVE", "audio/wave"),
    (b"RIFF", b"AVI ", "video/avi"),
    (b"FORM", b"AIFF", "audio/aiff"),
];

/// Classify `data`, looking at no more than [`SNIFF_LEN`] bytes.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    if data.is_empty() {
        return OCTET_STREAM;
    }
    let data = &data[..data.len().min(SNIFF_LEN)];

    let start = data.iter().position(|b| !is_ws(*b)).unwrap_or(data.len());
    let markup = &data[start..];
    if HTML_TAGS.iter().any(|tag| is_html_tag(markup, tag)) {
        return HTML;
    }
    if markup.starts_with(b"<?xml") {
        return XML;
    }

    if let Some(&(_, ct)) = MAGIC.iter().find(|(sig, _)| data.starts_with(sig)) {
        return ct;
    }

    for &(outer, inner, ct) in CONTAINERS {
        if data.len() >= 8 + inner.len() && data.starts_with(outer) && data[8..].starts_with(inner) {
            return ct;
        }
    }

    if is_mp4(data) {
        return "video/mp4";
    }

    if data.iter().any(|b| is_binary(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn is_ws(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

/// Control bytes that never occur in text.
fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn is_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() {
        return false;
    }
    let head_matches = data
        .iter()
        .zip(tag)
        .all(|(d, t)| d.to_ascii_uppercase() == *t);
    head_matches && matches!(data[tag.len()], b' ' | b'>')
}

/// ISO base media file: an `ftyp` box whose brands include `mp4`.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }
    // Offset 12 holds the minor version, not a brand.
    (8..box_size)
        .step_by(4)
        .filter(|&off| off != 12)
        .any(|off| &data[off..off + 3] == b"mp4")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_octet_stream() {
        assert_eq!(detect_content_type(b""), OCTET_STREAM);
    }

    #[test]
    fn plain_text() {
        assert_eq!(detect_content_type(b"hello world\n"), TEXT_PLAIN);
    }

    #[test]
    fn binary_control_bytes() {
        assert_eq!(detect_content_type(&[0x01, 0x02, 0x03, 0xff]), OCTET_STREAM);
    }

    #[test]
    fn html_after_whitespace_any_case() {
        assert_eq!(detect_content_type(b"  \n<html><body></body></html>"), HTML);
        assert_eq!(detect_content_type(b"<!doctype html>\n<p>x</p>"), HTML);
        assert_eq!(detect_content_type(b"<p>para</p>"), HTML);
    }

    #[test]
    fn html_tag_needs_terminator() {
        // "<Pre" is not "<P" followed by a terminator.
        assert_eq!(detect_content_type(b"<Pre>text</Pre>"), TEXT_PLAIN);
        assert_eq!(detect_content_type(b"<html"), TEXT_PLAIN);
    }

    #[test]
    fn xml() {
        assert_eq!(detect_content_type(b"<?xml version=\"1.0\"?><a/>"), XML);
    }

    #[test]
    fn images() {
        assert_eq!(detect_content_type(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
        assert_eq!(detect_content_type(b"\xFF\xD8\xFF\xE0\0\x10JFIF"), "image/jpeg");
        assert_eq!(detect_content_type(b"GIF89a\x01\x00"), "image/gif");
        assert_eq!(detect_content_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
    }

    #[test]
    fn documents_and_archives() {
        assert_eq!(detect_content_type(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(detect_content_type(b"PK\x03\x04\x14\0"), "application/zip");
        assert_eq!(detect_content_type(b"\x1F\x8B\x08\0\0\0"), "application/x-gzip");
        assert_eq!(detect_content_type(b"\0asm\x01\0\0\0"), "application/wasm");
    }

    #[test]
    fn riff_audio() {
        assert_eq!(detect_content_type(b"RIFF\x24\0\0\0WAVEfmt "), "audio/wave");
    }

    #[test]
    fn mp4_brand() {
        let mut data = Vec::new();
        data.extend_from_slice(&24u32.to_be_bytes());
        data.extend_from_slice(b"ftypisom");
        data.extend_from_slice(&[0, 0, 2, 0]);
        data.extend_from_slice(b"isommp41");
        assert_eq!(detect_content_type(&data), "video/mp4");
    }

    #[test]
    fn utf8_bom() {
        assert_eq!(detect_content_type(b"\xEF\xBB\xBFhello"), TEXT_PLAIN);
    }

    #[test]
    fn only_prefix_is_inspected() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(detect_content_type(&data), TEXT_PLAIN);
    }
}
