use derive_getters::Getters;
use tracing::debug;

use crate::bits::{BitReader, BitWriter};
use crate::interpreter::Interpreter;
use crate::result::Error;
use crate::value::Record;
use crate::Core;

/// Decodes frames in buffer order, recovering at the next plausible frame
/// start after a failure.
#[derive(Debug)]
pub struct Parser<'a> {
    core: &'a Core,
}

impl<'a> Parser<'a> {
    pub fn new(core: &'a Core) -> Self {
        Self { core }
    }

    pub fn parse(&self, bytes: &[u8]) -> Vec<ParseOutcome> {
        let mut outcomes = vec![];
        let mut reader = BitReader::new(bytes);
        while reader.position() < bytes.len() {
            let start = reader.position();
            match self.core.resolver().match_at(&reader) {
                Some(template) => {
                    let mut interp = Interpreter::new(self.core);
                    match interp.decode(&template, &mut reader) {
                        Ok(value) => {
                            let end = reader.position();
                            debug!(template = template.type_name(), start, end, "frame decoded");
                            outcomes.push(ParseOutcome::Success { value, start, end });
                            continue;
                        }
                        Err(error) => {
                            let offset = error.offset().unwrap_or_else(|| reader.position());
                            debug!(template = template.type_name(), offset, %error, "frame failed");
                            outcomes.push(ParseOutcome::Failure { offset, error });
                        }
                    }
                }
                None => {
                    debug!(offset = start, "no template matches");
                    outcomes.push(ParseOutcome::Failure {
                        offset: start,
                        error: Error::NoTemplate { offset: start },
                    });
                }
            }
            match self.core.resolver().find_next_frame_start(&reader) {
                Some(next) => reader.set_position(next),
                None => break,
            }
        }
        outcomes
    }
}

#[derive(Debug)]
pub enum ParseOutcome {
    Success {
        value: Record,
        start: usize,
        end: usize,
    },
    Failure {
        offset: usize,
        error: Error,
    },
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success { .. })
    }

    pub fn value(&self) -> Option<&Record> {
        match self {
            ParseOutcome::Success { value, .. } => Some(value),
            ParseOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ParseOutcome::Success { .. } => None,
            ParseOutcome::Failure { error, .. } => Some(error),
        }
    }
}

/// One frame per record, concatenated; a failing record contributes no
/// bytes and is reported by index.
#[derive(Debug)]
pub struct Composer<'a> {
    core: &'a Core,
}

impl<'a> Composer<'a> {
    pub fn new(core: &'a Core) -> Self {
        Self { core }
    }

    pub fn compose(&self, records: &[Record]) -> ComposeResponse {
        let mut bytes = vec![];
        let mut failures = vec![];
        for (index, record) in records.iter().enumerate() {
            match self.core.template(record.type_name()) {
                Some(template) if template.header().is_some() => {
                    let mut writer = BitWriter::new();
                    let mut interp = Interpreter::new(self.core);
                    match interp.encode(&template, &mut writer, record) {
                        Ok(()) => bytes.extend_from_slice(writer.as_bytes()),
                        Err(error) => {
                            debug!(index, %error, "record failed to compose");
                            failures.push(ComposeFailure { index, error });
                        }
                    }
                }
                _ => failures.push(ComposeFailure {
                    index,
                    error: Error::NoTemplate { offset: bytes.len() },
                }),
            }
        }
        ComposeResponse { bytes, failures }
    }
}

#[derive(Debug, Getters)]
pub struct ComposeResponse {
    bytes: Vec<u8>,
    failures: Vec<ComposeFailure>,
}

impl ComposeResponse {
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Debug)]
pub struct ComposeFailure {
    pub index: usize,
    pub error: Error,
}
