// ABOUTME: Text encoding detection, decoding and re-encoding for tabular inputs.
// ABOUTME: The detected encoding is passed explicitly to every read/write that needs it.

use std::fmt;

use encoding_rs::{Encoding, UTF_8};

use crate::error::{CorpusError, Result};

/// The character encoding of a text input.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    pub const UTF8: TextEncoding = TextEncoding(UTF_8);

    /// Looks up an encoding by WHATWG label, e.g. `euc-kr`.
    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(TextEncoding)
    }

    /// Detects the encoding of `bytes`: BOM first, then statistical guess.
    pub fn detect(bytes: &[u8]) -> Self {
        if let Some((encoding, _)) = Encoding::for_bom(bytes) {
            return TextEncoding(encoding);
        }
        if std::str::from_utf8(bytes).is_ok() {
            return Self::UTF8;
        }
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(bytes, true);
        TextEncoding(detector.guess(None, true))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn is_utf8(&self) -> bool {
        self.0 == UTF_8
    }

    /// Decodes `bytes` to a String, dropping any BOM.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (decoded, _, had_errors) = self.0.decode(bytes);
        if had_errors {
            tracing::warn!(encoding = self.name(), "input contained malformed sequences; replaced");
        }
        decoded.into_owned()
    }

    /// Encodes `text` into this encoding's bytes.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let (encoded, _, had_errors) = self.0.encode(text);
        if had_errors {
            tracing::warn!(encoding = self.name(), "some characters are not representable; replaced");
        }
        encoded.into_owned()
    }

    /// Tree documents are UTF-8 only.
    pub fn require_utf8(&self) -> Result<()> {
        if self.is_utf8() {
            Ok(())
        } else {
            Err(CorpusError::Encoding {
                detected: self.name().to_string(),
                required: "UTF-8",
            })
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::UTF8
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextEncoding({})", self.name())
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
