use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::bits::{BitReader, BitWriter};
use crate::interpreter::Interpreter;
use crate::result::{Error, Result};
use crate::template::{Binding, DirectiveKind};
use crate::value::Value;

mod array;
mod object;
mod primitive;
mod special;
mod text;

pub use array::{ArrayObjectCodec, ArrayPrimitiveCodec};
pub use object::ObjectCodec;
pub use primitive::{ArbitraryIntegerCodec, BitSetCodec, DoubleCodec, FloatCodec, IntegerCodec};
pub use special::{ChecksumCodec, EvaluatedCodec, SkipCodec};
pub use text::{StringFixedCodec, StringTerminatedCodec};

/// Reads and writes the raw wire value of one directive kind. The shared
/// field pipeline (condition, converter, validator) is the interpreter's;
/// codecs only move bits. `decode` returns `None` when the directive
/// produces no value (skips).
pub trait Codec: Debug + Send + Sync {
    fn kind(&self) -> DirectiveKind;

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>>;

    fn encode(
        &self,
        interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()>;
}

/// One codec per directive kind; the last registration for a kind wins.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: BTreeMap<DirectiveKind, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(IntegerCodec));
        registry.register(Arc::new(ArbitraryIntegerCodec));
        registry.register(Arc::new(FloatCodec));
        registry.register(Arc::new(DoubleCodec));
        registry.register(Arc::new(BitSetCodec));
        registry.register(Arc::new(ArrayPrimitiveCodec));
        registry.register(Arc::new(ArrayObjectCodec));
        registry.register(Arc::new(ObjectCodec));
        registry.register(Arc::new(StringFixedCodec));
        registry.register(Arc::new(StringTerminatedCodec));
        registry.register(Arc::new(SkipCodec));
        registry.register(Arc::new(ChecksumCodec));
        registry.register(Arc::new(EvaluatedCodec));
        registry
    }

    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.kind(), codec);
    }

    pub fn has(&self, kind: DirectiveKind) -> bool {
        self.codecs.contains_key(&kind)
    }

    pub fn get(&self, kind: DirectiveKind) -> Option<Arc<dyn Codec>> {
        self.codecs.get(&kind).cloned()
    }
}

// The interpreter rewrites the empty type/field slots with the entry being
// processed before surfacing this.
pub(crate) fn type_mismatch(expected: &str, actual: &Value) -> Error {
    Error::BadType {
        type_name: String::new(),
        field: String::new(),
        reason: format!("expected {expected}, found {}", actual.kind_name()),
    }
}
