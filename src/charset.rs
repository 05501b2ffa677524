use encoding_rs::Encoding;

use crate::result::{Error, Result};

// Text encoding for magic strings and text fields, resolved through the
// WHATWG label registry.
#[derive(Clone, Copy)]
pub struct Charset(&'static Encoding);

impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for Charset {}

impl Charset {
    pub const UTF_8: Charset = Charset(encoding_rs::UTF_8);

    pub fn for_label(label: &str) -> Result<Self> {
        Encoding::for_label(label.as_bytes())
            .map(Charset)
            .ok_or_else(|| Error::InvalidCharset {
                label: label.to_owned(),
            })
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        self.0.decode(bytes).0.into_owned()
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        self.0.encode(text).0.into_owned()
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::UTF_8
    }
}

impl std::fmt::Debug for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Charset").field(&self.name()).finish()
    }
}
