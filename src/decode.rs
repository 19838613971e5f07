//! Encoding resolution for fetched pages.
//!
//! Pages are read as UTF-8 first. When that yields nothing usable (no data in
//! either target table, or replacement characters in the extracted text), the
//! same bytes are read as Latin-1 and extracted again.
//!
//! "Latin-1" follows the WHATWG label mapping: pages declaring `iso-8859-1`
//! are decoded as windows-1252, so 0x80..=0x9F become dashes and quotes.

use crate::model::{ExtractionResult, TextEncoding};
use crate::parse;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Fetched bytes and the encoding they are read with
#[derive(Debug, Clone, Copy)]
pub struct RawDocument<'a> {
    bytes: &'a [u8],
    encoding: TextEncoding,
}

impl<'a> RawDocument<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            encoding: TextEncoding::Utf8,
        }
    }

    /// Same bytes, read with another encoding
    pub fn with_encoding(self, encoding: TextEncoding) -> Self {
        Self { encoding, ..self }
    }

    /// Decoded text, and whether malformed sequences were replaced
    pub fn decode(&self) -> (Cow<'a, str>, bool) {
        charset(self.encoding).decode_without_bom_handling(self.bytes)
    }

    pub fn text(&self) -> Cow<'a, str> {
        self.decode().0
    }
}

fn charset(encoding: TextEncoding) -> &'static Encoding {
    match encoding {
        TextEncoding::Utf8 => UTF_8,
        TextEncoding::Latin1 => WINDOWS_1252,
    }
}

/// Bytes labelled `latin1`/`iso-8859-1`, decoded as windows-1252
pub fn decode_latin1(bytes: &[u8]) -> String {
    WINDOWS_1252
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}

/// Try `document` as UTF-8, then as Latin-1, and keep the first result
/// `accept` approves. If neither is approved, the UTF-8 result is returned.
pub fn resolve<T>(
    document: RawDocument<'_>,
    extract: impl Fn(&str, TextEncoding) -> T,
    accept: impl Fn(&T) -> bool,
) -> T {
    let (utf8, malformed) = document.with_encoding(TextEncoding::Utf8).decode();
    let first = extract(&utf8, TextEncoding::Utf8);
    if accept(&first) {
        if malformed {
            debug!("malformed utf-8 outside the extracted fields");
        }
        return first;
    }

    let latin1 = document.with_encoding(TextEncoding::Latin1);
    let second = extract(&latin1.text(), TextEncoding::Latin1);
    if accept(&second) {
        warn!("page only readable as latin-1");
        return second;
    }

    debug!("no encoding produced a usable result");
    first
}

/// Extract from raw page bytes, resolving the encoding
pub fn extract_document(bytes: &[u8]) -> ExtractionResult {
    resolve(RawDocument::new(bytes), parse::extract, ExtractionResult::is_usable)
}
