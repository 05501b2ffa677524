use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use memchr::memmem;

use crate::bits::BitReader;
use crate::charset::Charset;
use crate::result::{Error, Result};
use crate::template::{Magic, Template};

/// Index of registered templates keyed by their start magics, ordered by
/// decreasing magic length, ties broken lexicographically. `match_at` peeks
/// without advancing; `find_next_frame_start` recovers after a bad frame.
pub struct Resolver {
    entries: Vec<Entry>,
}

struct Entry {
    magic: Magic,
    charset: Charset,
    template: Arc<Template>,
    finder: memmem::Finder<'static>,
}

impl Resolver {
    pub(crate) fn new() -> Self {
        Self { entries: vec![] }
    }

    pub(crate) fn insert(
        &mut self,
        magic: Magic,
        charset: Charset,
        template: Arc<Template>,
    ) -> Result<()> {
        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.magic == magic && e.charset == charset)
        {
            return Err(Error::DuplicateHeader {
                first: existing.template.type_name().to_owned(),
                second: template.type_name().to_owned(),
                magic: to_hex(&magic),
            });
        }
        let finder = memmem::Finder::new(magic.as_slice()).into_owned();
        self.entries.push(Entry {
            magic,
            charset,
            template,
            finder,
        });
        Ok(())
    }

    pub(crate) fn finalize(&mut self) {
        self.entries
            .sort_by_key(|e| (Reverse(e.magic.len()), e.magic.clone()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose magic equals the bytes at the cursor; the ordering
    /// makes this the longest match, lexicographically smallest on ties.
    pub fn match_at(&self, reader: &BitReader<'_>) -> Option<Arc<Template>> {
        let ahead = &reader.as_bytes()[reader.position()..];
        self.entries
            .iter()
            .find(|e| ahead.starts_with(&e.magic))
            .map(|e| e.template.clone())
    }

    /// Earliest occurrence of any registered magic strictly after the
    /// cursor.
    pub fn find_next_frame_start(&self, reader: &BitReader<'_>) -> Option<usize> {
        let buf = reader.as_bytes();
        let from = reader.position() + 1;
        if from >= buf.len() {
            return None;
        }
        self.entries
            .iter()
            .filter_map(|e| e.finder.find(&buf[from..]).map(|i| from + i))
            .min()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in &self.entries {
            map.entry(&to_hex(&entry.magic), &entry.template.type_name());
        }
        map.finish()
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Header, TemplateBuilder};
    use crate::codecs::CodecRegistry;

    fn template(name: &str, start: &str) -> Arc<Template> {
        let builder = TemplateBuilder::new(name).header(Header::new(start));
        Arc::new(builder.compile(&CodecRegistry::with_defaults(), true).unwrap())
    }

    fn resolver(entries: &[(&str, &str)]) -> Resolver {
        let mut resolver = Resolver::new();
        for (name, start) in entries {
            let t = template(name, start);
            resolver
                .insert(Magic::from_slice(start.as_bytes()), Charset::UTF_8, t)
                .unwrap();
        }
        resolver.finalize();
        resolver
    }

    #[test]
    fn longest_match_wins() {
        let resolver = resolver(&[("Short", "ab"), ("Long", "abc")]);
        let reader = BitReader::new(b"abcd");
        assert_eq!(resolver.match_at(&reader).unwrap().type_name(), "Long");
        let reader = BitReader::new(b"abzz");
        assert_eq!(resolver.match_at(&reader).unwrap().type_name(), "Short");
    }

    #[test]
    fn equal_length_ties_break_lexicographically() {
        let resolver = resolver(&[("B", "zz"), ("A", "aa")]);
        // both magics present ahead; matching happens at the cursor only
        let reader = BitReader::new(b"zzaa");
        assert_eq!(resolver.match_at(&reader).unwrap().type_name(), "B");
    }

    #[test]
    fn duplicate_header_rejected() {
        let mut resolver = Resolver::new();
        resolver
            .insert(
                Magic::from_slice(b"ab"),
                Charset::UTF_8,
                template("First", "ab"),
            )
            .unwrap();
        let duplicate = resolver.insert(
            Magic::from_slice(b"ab"),
            Charset::UTF_8,
            template("Second", "ab"),
        );
        assert!(matches!(duplicate, Err(Error::DuplicateHeader { .. })));
    }

    #[test]
    fn scan_finds_earliest_magic() {
        let resolver = resolver(&[("A", "ab"), ("B", "cd")]);
        let reader = BitReader::new(b"..cd..ab");
        assert_eq!(resolver.find_next_frame_start(&reader), Some(2));
        let reader = BitReader::new(b"nothing.");
        assert_eq!(resolver.find_next_frame_start(&reader), None);
    }
}
