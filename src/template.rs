use std::fmt::Debug;
use std::sync::Arc;

use derive_getters::Getters;
use smallvec::SmallVec;

use crate::bits::ByteOrder;
use crate::charset::Charset;
use crate::checksum::Checksummer;
use crate::codecs::CodecRegistry;
use crate::result::{Error, Result};
use crate::value::Value;

pub type Magic = SmallVec<[u8; 8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirectiveKind {
    Integer,
    ArbitraryInteger,
    Float,
    Double,
    BitSet,
    ArrayPrimitive,
    ArrayObject,
    Object,
    StringFixed,
    StringTerminated,
    Skip,
    Checksum,
    Evaluated,
}

/// Size parameters are expressions evaluated against the decode/encode
/// scope; a plain integer literal is the common case.
#[derive(Debug, Clone)]
pub enum Directive {
    Integer {
        bits: u8,
        order: ByteOrder,
        signed: bool,
    },
    ArbitraryInteger {
        size: String,
        order: ByteOrder,
        signed: bool,
    },
    Float {
        order: ByteOrder,
    },
    Double {
        order: ByteOrder,
    },
    BitSet {
        size: String,
        bit_order: ByteOrder,
    },
    ArrayPrimitive {
        element: Box<Directive>,
        size: String,
    },
    ArrayObject {
        target: ObjectTarget,
        size: String,
    },
    Object {
        target: ObjectTarget,
    },
    StringFixed {
        size: String,
        charset: Charset,
    },
    StringTerminated {
        terminator: u8,
        consume: bool,
        charset: Charset,
    },
    Skip(SkipDirective),
    Checksum(ChecksumDirective),
    Evaluated {
        expression: String,
    },
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Integer { .. } => DirectiveKind::Integer,
            Directive::ArbitraryInteger { .. } => DirectiveKind::ArbitraryInteger,
            Directive::Float { .. } => DirectiveKind::Float,
            Directive::Double { .. } => DirectiveKind::Double,
            Directive::BitSet { .. } => DirectiveKind::BitSet,
            Directive::ArrayPrimitive { .. } => DirectiveKind::ArrayPrimitive,
            Directive::ArrayObject { .. } => DirectiveKind::ArrayObject,
            Directive::Object { .. } => DirectiveKind::Object,
            Directive::StringFixed { .. } => DirectiveKind::StringFixed,
            Directive::StringTerminated { .. } => DirectiveKind::StringTerminated,
            Directive::Skip(_) => DirectiveKind::Skip,
            Directive::Checksum(_) => DirectiveKind::Checksum,
            Directive::Evaluated { .. } => DirectiveKind::Evaluated,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SkipDirective {
    Bits { size: String },
    Until { terminator: u8, consume: bool },
}

#[derive(Debug, Clone)]
pub struct ChecksumDirective {
    pub bits: u8,
    pub order: ByteOrder,
    pub algorithm: Arc<dyn Checksummer>,
    pub skip_start: usize,
    pub skip_end: usize,
    pub initial: u32,
}

#[derive(Debug, Clone)]
pub enum ObjectTarget {
    Type(String),
    Choices(Choices),
}

/// Prefix-driven polymorphism: when `prefix_size > 0` the interpreter reads
/// that many bits first and binds them to `prefix` before trying the
/// alternatives in declaration order.
#[derive(Debug, Clone)]
pub struct Choices {
    pub(crate) prefix_size: usize,
    pub(crate) bit_order: ByteOrder,
    pub(crate) alternatives: Vec<Alternative>,
    pub(crate) default: Option<String>,
}

impl Choices {
    pub fn new(prefix_size: usize) -> Self {
        Self {
            prefix_size,
            bit_order: ByteOrder::Big,
            alternatives: vec![],
            default: None,
        }
    }

    pub fn bit_order(mut self, order: ByteOrder) -> Self {
        self.bit_order = order;
        self
    }

    /// An empty condition matches unconditionally.
    pub fn alternative(mut self, condition: &str, prefix: u64, type_name: &str) -> Self {
        self.alternatives.push(Alternative {
            condition: condition.to_owned(),
            prefix,
            type_name: type_name.to_owned(),
        });
        self
    }

    pub fn default(mut self, type_name: &str) -> Self {
        self.default = Some(type_name.to_owned());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Alternative {
    pub(crate) condition: String,
    pub(crate) prefix: u64,
    pub(crate) type_name: String,
}

/// Bidirectional mapping between the wire representation and the user-facing
/// value of one field.
pub trait Converter: Debug + Send + Sync {
    fn decode(&self, wire: Value) -> Result<Value>;
    fn encode(&self, user: Value) -> Result<Value>;
}

/// Applied to the user-facing value after decode and before encode.
pub trait Validator: Debug + Send + Sync {
    fn validate(&self, value: &Value) -> bool;
}

#[derive(Debug, Clone)]
pub(crate) struct ConverterChoice {
    pub condition: String,
    pub converter: Arc<dyn Converter>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub(crate) directive: Directive,
    pub(crate) condition: String,
    pub(crate) converter: Option<Arc<dyn Converter>>,
    pub(crate) converter_choices: Vec<ConverterChoice>,
    pub(crate) validator: Option<Arc<dyn Validator>>,
}

impl Binding {
    pub fn new(directive: Directive) -> Self {
        Self {
            directive,
            condition: String::new(),
            converter: None,
            converter_choices: vec![],
            validator: None,
        }
    }

    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    /// The field is only present when this evaluates true; empty means
    /// unconditional.
    pub fn when(mut self, condition: &str) -> Self {
        self.condition = condition.to_owned();
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn converter_when(mut self, condition: &str, converter: Arc<dyn Converter>) -> Self {
        self.converter_choices.push(ConverterChoice {
            condition: condition.to_owned(),
            converter,
        });
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl From<Directive> for Binding {
    fn from(directive: Directive) -> Self {
        Binding::new(directive)
    }
}

#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub(crate) name: String,
    pub(crate) skips: Vec<SkipDirective>,
    pub(crate) binding: Binding,
}

impl FieldEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatedField {
    pub(crate) name: String,
    pub(crate) expression: String,
}

#[derive(Debug, Clone)]
pub struct PostProcessedField {
    pub(crate) name: String,
    pub(crate) condition: String,
    pub(crate) on_decode: String,
    pub(crate) on_encode: String,
}

/// One or more start magics, an optional end magic, and the charset used to
/// materialize them to bytes.
#[derive(Debug, Clone)]
pub struct Header {
    starts: Vec<String>,
    end: Option<String>,
    charset: Charset,
}

impl Header {
    pub fn new(start: &str) -> Self {
        Self {
            starts: vec![start.to_owned()],
            end: None,
            charset: Charset::UTF_8,
        }
    }

    pub fn start(mut self, start: &str) -> Self {
        self.starts.push(start.to_owned());
        self
    }

    pub fn end(mut self, end: &str) -> Self {
        self.end = Some(end.to_owned());
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }
}

#[derive(Debug, Clone, Getters)]
pub struct CompiledHeader {
    starts: Vec<Magic>,
    end: Option<Magic>,
    charset: Charset,
}

#[derive(Debug, Getters)]
pub struct Template {
    #[getter(skip)]
    type_name: Arc<str>,
    header: Option<CompiledHeader>,
    fields: Vec<FieldEntry>,
    evaluated_fields: Vec<EvaluatedField>,
    post_processed_fields: Vec<PostProcessedField>,
    #[getter(skip)]
    checksum_index: Option<usize>,
}

impl Template {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn type_name_arc(&self) -> Arc<str> {
        self.type_name.clone()
    }

    pub fn checksum_index(&self) -> Option<usize> {
        self.checksum_index
    }

    pub(crate) fn checksum(&self) -> Option<(&FieldEntry, &ChecksumDirective)> {
        let entry = &self.fields[self.checksum_index?];
        match &entry.binding.directive {
            Directive::Checksum(checksum) => Some((entry, checksum)),
            _ => None,
        }
    }
}

/// Declares one message type field by field; `CoreBuilder` compiles it.
#[derive(Debug)]
pub struct TemplateBuilder {
    type_name: String,
    header: Option<Header>,
    fields: Vec<FieldEntry>,
    pending_skips: Vec<SkipDirective>,
    evaluated: Vec<EvaluatedField>,
    post_processed: Vec<PostProcessedField>,
}

impl TemplateBuilder {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_owned(),
            header: None,
            fields: vec![],
            pending_skips: vec![],
            evaluated: vec![],
            post_processed: vec![],
        }
    }

    pub fn header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }

    /// Queues a skip applied before the next declared field.
    pub fn skip(mut self, skip: SkipDirective) -> Self {
        self.pending_skips.push(skip);
        self
    }

    pub fn field(mut self, name: &str, binding: impl Into<Binding>) -> Self {
        let binding = binding.into();
        if let Directive::Evaluated { expression } = &binding.directive {
            self.evaluated.push(EvaluatedField {
                name: name.to_owned(),
                expression: expression.clone(),
            });
            return self;
        }
        if let Directive::Skip(skip) = &binding.directive {
            self.pending_skips.push(skip.clone());
            return self;
        }
        self.fields.push(FieldEntry {
            name: name.to_owned(),
            skips: std::mem::take(&mut self.pending_skips),
            binding,
        });
        self
    }

    /// Field assigned after decode from an expression; consumes no bytes.
    pub fn evaluated(mut self, name: &str, expression: &str) -> Self {
        self.evaluated.push(EvaluatedField {
            name: name.to_owned(),
            expression: expression.to_owned(),
        });
        self
    }

    /// Field transformed after decode (`on_decode`) and before the field
    /// walk on encode (`on_encode`); empty condition applies always.
    pub fn post_processed(
        mut self,
        name: &str,
        condition: &str,
        on_decode: &str,
        on_encode: &str,
    ) -> Self {
        self.post_processed.push(PostProcessedField {
            name: name.to_owned(),
            condition: condition.to_owned(),
            on_decode: on_decode.to_owned(),
            on_encode: on_encode.to_owned(),
        });
        self
    }

    pub(crate) fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn has_header(&self) -> bool {
        self.header.is_some()
    }

    pub(crate) fn compile(self, registry: &CodecRegistry, strict: bool) -> Result<Template> {
        let type_name = self.type_name;
        let header = match self.header {
            None => None,
            Some(header) => {
                let charset = header.charset;
                let mut starts = Vec::with_capacity(header.starts.len());
                for start in &header.starts {
                    let bytes = charset.encode(start);
                    if bytes.is_empty() {
                        return Err(Error::EmptyMagic {
                            type_name: type_name.clone(),
                        });
                    }
                    starts.push(Magic::from_slice(&bytes));
                }
                if starts.is_empty() {
                    return Err(Error::EmptyMagic {
                        type_name: type_name.clone(),
                    });
                }
                let end = match &header.end {
                    None => None,
                    Some(end) => {
                        let bytes = charset.encode(end);
                        if bytes.is_empty() {
                            return Err(Error::EmptyMagic {
                                type_name: type_name.clone(),
                            });
                        }
                        Some(Magic::from_slice(&bytes))
                    }
                };
                Some(CompiledHeader {
                    starts,
                    end,
                    charset,
                })
            }
        };

        let mut fields = Vec::with_capacity(self.fields.len());
        let mut checksum_index = None;
        for entry in self.fields {
            let kind = entry.binding.directive.kind();
            if !registry.has(kind) {
                if strict {
                    return Err(Error::UnknownDirective { kind });
                }
                continue;
            }
            for skip in &entry.skips {
                if let SkipDirective::Bits { size } = skip {
                    if size.trim().is_empty() {
                        return Err(Error::BadType {
                            type_name: type_name.clone(),
                            field: entry.name.clone(),
                            reason: "skip with an empty size expression".into(),
                        });
                    }
                }
            }
            validate_directive(&type_name, &entry.name, &entry.binding.directive)?;
            if let Directive::Checksum(_) = &entry.binding.directive {
                if checksum_index.is_some() {
                    return Err(Error::MultipleChecksums {
                        type_name: type_name.clone(),
                    });
                }
                checksum_index = Some(fields.len());
            }
            fields.push(entry);
        }

        Ok(Template {
            type_name: type_name.into(),
            header,
            fields,
            evaluated_fields: self.evaluated,
            post_processed_fields: self.post_processed,
            checksum_index,
        })
    }
}

fn validate_directive(type_name: &str, field: &str, directive: &Directive) -> Result<()> {
    let bad = |reason: String| Error::BadType {
        type_name: type_name.to_owned(),
        field: field.to_owned(),
        reason,
    };
    match directive {
        Directive::Integer { bits, .. } => {
            if ![8, 16, 32, 64].contains(bits) {
                return Err(bad(format!("integer width {bits} not in 8/16/32/64")));
            }
        }
        Directive::ArbitraryInteger { size, .. }
        | Directive::BitSet { size, .. }
        | Directive::StringFixed { size, .. }
            if size.trim().is_empty() =>
        {
            return Err(bad("empty size expression".into()));
        }
        Directive::ArrayPrimitive { size, .. } | Directive::ArrayObject { size, .. }
            if size.trim().is_empty() =>
        {
            return Err(bad("empty size expression".into()));
        }
        Directive::ArrayPrimitive { element, .. } => {
            match element.kind() {
                DirectiveKind::Integer
                | DirectiveKind::ArbitraryInteger
                | DirectiveKind::Float
                | DirectiveKind::Double => {}
                kind => {
                    return Err(bad(format!("array element kind {kind:?} is not primitive")));
                }
            }
            validate_directive(type_name, field, element)?;
        }
        Directive::Object { target } | Directive::ArrayObject { target, .. } => {
            if let ObjectTarget::Choices(choices) = target {
                if choices.alternatives.is_empty() && choices.default.is_none() {
                    return Err(bad("choices need an alternative or a default".into()));
                }
                if choices.prefix_size > 64 {
                    return Err(bad(format!(
                        "choice prefix of {} bits exceeds 64",
                        choices.prefix_size
                    )));
                }
            }
        }
        Directive::Checksum(checksum) => {
            if ![8, 16, 32].contains(&checksum.bits) {
                return Err(bad(format!(
                    "checksum width {} not in 8/16/32",
                    checksum.bits
                )));
            }
            // The checksum may never cover itself.
            if checksum.skip_end < usize::from(checksum.bits / 8) {
                return Err(bad(format!(
                    "checksum skip_end {} smaller than the checksum width",
                    checksum.skip_end
                )));
            }
        }
        _ => {}
    }
    Ok(())
}
