use std::sync::Arc;

use tracing::trace;

use crate::bits::{BitReader, BitWriter};
use crate::codecs::Codec;
use crate::eval::Scope;
use crate::result::{Error, Result};
use crate::template::{
    Binding, ChecksumDirective, CompiledHeader, Directive, DirectiveKind, FieldEntry,
    SkipDirective, Template,
};
use crate::value::{Record, Value};
use crate::Core;

/// Walks a template against a reader or writer, driving codecs through the
/// shared field pipeline and keeping the scope stack balanced on every exit
/// path.
#[derive(Debug)]
pub struct Interpreter<'a> {
    core: &'a Core,
    scope: Scope<'a>,
}

impl<'a> Interpreter<'a> {
    pub fn new(core: &'a Core) -> Self {
        Self {
            core,
            scope: Scope::new(core.context()),
        }
    }

    pub fn core(&self) -> &'a Core {
        self.core
    }

    pub fn scope(&self) -> &Scope<'a> {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope<'a> {
        &mut self.scope
    }

    pub fn eval_boolean(&self, expr: &str) -> Result<bool> {
        self.core.evaluator().eval_boolean(expr, &self.scope)
    }

    pub fn eval_value(&self, expr: &str) -> Result<Value> {
        self.core.evaluator().eval_value(expr, &self.scope)
    }

    pub fn eval_size(&self, expr: &str, offset: usize) -> Result<usize> {
        self.core.evaluator().eval_size(expr, &self.scope, offset)
    }

    pub fn codec(&self, kind: DirectiveKind) -> Result<Arc<dyn Codec>> {
        self.core
            .codecs()
            .get(kind)
            .ok_or(Error::UnknownDirective { kind })
    }

    pub fn template(&self, type_name: &str, offset: usize) -> Result<Arc<Template>> {
        self.core
            .template(type_name)
            .ok_or(Error::NoTemplate { offset })
    }

    /// Decodes one frame of `template` at the reader's cursor. The scope
    /// depth is restored on every path, success or error.
    pub fn decode(&mut self, template: &Template, reader: &mut BitReader<'_>) -> Result<Record> {
        self.scope.push(Record::new(template.type_name_arc()));
        let result = self.decode_frame(template, reader);
        let record = self.scope.pop();
        result.map(|_| record)
    }

    fn decode_frame(&mut self, template: &Template, reader: &mut BitReader<'_>) -> Result<()> {
        let frame_start = reader.position();
        if let Some(header) = template.header() {
            self.match_start_magic(header, reader)?;
        }

        let mut checksum_slot = None;
        for (index, entry) in template.fields().iter().enumerate() {
            for skip in &entry.skips {
                self.apply_skip_decode(skip, reader)?;
            }
            let binding = &entry.binding;
            if !binding.condition.is_empty() && !self.eval_boolean(&binding.condition)? {
                continue;
            }
            let codec = self.codec(binding.directive.kind())?;
            let field_offset = reader.position();
            let decoded = codec
                .decode(self, reader, binding)
                .map_err(|e| in_field(e, template, entry))?;
            let Some(wire) = decoded else { continue };
            if Some(index) == template.checksum_index() {
                let read = wire.as_int().unwrap_or_default() as u32;
                checksum_slot = Some((read, field_offset));
            }
            let user = self
                .convert_decode(binding, wire)
                .map_err(|e| in_field(e, template, entry))?;
            if let Some(validator) = &binding.validator {
                if !validator.validate(&user) {
                    return Err(Error::Validation {
                        field: entry.name.clone(),
                        offset: reader.position(),
                    });
                }
            }
            trace!(field = entry.name.as_str(), "field decoded");
            self.scope.current_mut().set(entry.name.clone(), user);
        }

        // Top-level frames are byte-aligned units.
        if self.scope.depth() == 1 {
            reader.align();
        }
        if let Some(end) = template.header().as_ref().and_then(|h| h.end().as_ref()) {
            let offset = reader.position();
            let bytes = reader.read_bytes(end.len())?;
            if bytes != end.as_slice() {
                return Err(Error::NoTemplate { offset });
            }
        }
        if let Some((_, checksum)) = template.checksum() {
            if let Some((read, at)) = checksum_slot {
                self.verify_checksum(checksum, reader, frame_start, read, at)?;
            }
        }

        for field in template.evaluated_fields() {
            let binding = Binding::new(Directive::Evaluated {
                expression: field.expression.clone(),
            });
            let codec = self.codec(DirectiveKind::Evaluated)?;
            if let Some(value) = codec.decode(self, reader, &binding)? {
                self.scope.current_mut().set(field.name.clone(), value);
            }
        }
        for field in template.post_processed_fields() {
            if field.condition.is_empty() || self.eval_boolean(&field.condition)? {
                let value = self.eval_value(&field.on_decode)?;
                self.scope.current_mut().set(field.name.clone(), value);
            }
        }
        Ok(())
    }

    /// Encodes `record` according to `template`, mirroring `decode`.
    pub fn encode(
        &mut self,
        template: &Template,
        writer: &mut BitWriter,
        record: &Record,
    ) -> Result<()> {
        if record.type_name() != template.type_name() {
            return Err(Error::BadType {
                type_name: record.type_name().to_owned(),
                field: String::new(),
                reason: format!("template is `{}`", template.type_name()),
            });
        }
        self.scope.push(record.clone());
        let result = self.encode_frame(template, writer);
        self.scope.pop();
        result
    }

    fn encode_frame(&mut self, template: &Template, writer: &mut BitWriter) -> Result<()> {
        // Post-processing runs first so the field walk sees wire-side values.
        for field in template.post_processed_fields() {
            if field.condition.is_empty() || self.eval_boolean(&field.condition)? {
                let value = self.eval_value(&field.on_encode)?;
                self.scope.current_mut().set(field.name.clone(), value);
            }
        }

        let frame_start = writer.position();
        if let Some(header) = template.header() {
            writer.write_bytes(&header.starts()[0]);
        }

        let mut checksum_slot = None;
        for (index, entry) in template.fields().iter().enumerate() {
            for skip in &entry.skips {
                self.apply_skip_encode(skip, writer)?;
            }
            let binding = &entry.binding;
            if !binding.condition.is_empty() && !self.eval_boolean(&binding.condition)? {
                continue;
            }
            let codec = self.codec(binding.directive.kind())?;
            if Some(index) == template.checksum_index() {
                checksum_slot = Some(writer.position());
                codec
                    .encode(self, writer, binding, &Value::Int(0))
                    .map_err(|e| in_field(e, template, entry))?;
                continue;
            }
            let user = match self.scope.current().get(&entry.name) {
                Some(value) => value.clone(),
                None => {
                    return Err(Error::Validation {
                        field: entry.name.clone(),
                        offset: writer.position(),
                    });
                }
            };
            if let Some(validator) = &binding.validator {
                if !validator.validate(&user) {
                    return Err(Error::Validation {
                        field: entry.name.clone(),
                        offset: writer.position(),
                    });
                }
            }
            let wire = self
                .convert_encode(binding, user)
                .map_err(|e| in_field(e, template, entry))?;
            codec
                .encode(self, writer, binding, &wire)
                .map_err(|e| in_field(e, template, entry))?;
        }

        if self.scope.depth() == 1 {
            writer.flush();
        }
        if let Some(end) = template.header().as_ref().and_then(|h| h.end().as_ref()) {
            writer.write_bytes(end);
        }
        if let Some((_, checksum)) = template.checksum() {
            if let Some(at) = checksum_slot {
                self.patch_checksum(checksum, writer, frame_start, at)?;
            }
        }
        Ok(())
    }

    fn match_start_magic(&self, header: &CompiledHeader, reader: &mut BitReader<'_>) -> Result<()> {
        let offset = reader.position();
        for start in header.starts() {
            let mut attempt = reader.clone();
            match attempt.read_bytes(start.len()) {
                Ok(bytes) if bytes == start.as_slice() => {
                    *reader = attempt;
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(Error::NoTemplate { offset })
    }

    fn apply_skip_decode(&mut self, skip: &SkipDirective, reader: &mut BitReader<'_>) -> Result<()> {
        let codec = self.codec(DirectiveKind::Skip)?;
        let binding = Binding::new(Directive::Skip(skip.clone()));
        codec.decode(self, reader, &binding).map(|_| ())
    }

    fn apply_skip_encode(&mut self, skip: &SkipDirective, writer: &mut BitWriter) -> Result<()> {
        let codec = self.codec(DirectiveKind::Skip)?;
        let binding = Binding::new(Directive::Skip(skip.clone()));
        codec.encode(self, writer, &binding, &Value::Int(0))
    }

    fn convert_decode(&self, binding: &Binding, wire: Value) -> Result<Value> {
        match self.choose_converter(binding)? {
            Some(converter) => converter.decode(wire),
            None => Ok(wire),
        }
    }

    fn convert_encode(&self, binding: &Binding, user: Value) -> Result<Value> {
        match self.choose_converter(binding)? {
            Some(converter) => converter.encode(user),
            None => Ok(user),
        }
    }

    fn choose_converter(
        &self,
        binding: &Binding,
    ) -> Result<Option<Arc<dyn crate::template::Converter>>> {
        for choice in &binding.converter_choices {
            if choice.condition.is_empty() || self.eval_boolean(&choice.condition)? {
                return Ok(Some(choice.converter.clone()));
            }
        }
        Ok(binding.converter.clone())
    }

    fn verify_checksum(
        &self,
        checksum: &ChecksumDirective,
        reader: &BitReader<'_>,
        frame_start: usize,
        read: u32,
        at: usize,
    ) -> Result<()> {
        let frame_end = reader.position();
        let span = checksum_span(checksum, frame_start, frame_end, at)?;
        let computed =
            checksum.algorithm.calculate(&reader.as_bytes()[span.0..span.1], checksum.initial);
        let computed = computed & width_mask(checksum.bits);
        if computed != read {
            return Err(Error::ChecksumMismatch {
                offset: at,
                computed,
                read,
            });
        }
        Ok(())
    }

    fn patch_checksum(
        &self,
        checksum: &ChecksumDirective,
        writer: &mut BitWriter,
        frame_start: usize,
        at: usize,
    ) -> Result<()> {
        let frame_end = writer.position();
        let span = checksum_span(checksum, frame_start, frame_end, at)?;
        let computed =
            checksum.algorithm.calculate(&writer.as_bytes()[span.0..span.1], checksum.initial);
        let computed = computed & width_mask(checksum.bits);
        let width = usize::from(checksum.bits / 8);
        let mut bytes = [0u8; 4];
        match checksum.order {
            crate::bits::ByteOrder::Big => {
                for (i, slot) in bytes[..width].iter_mut().enumerate() {
                    *slot = (computed >> (8 * (width - 1 - i))) as u8;
                }
            }
            crate::bits::ByteOrder::Little => {
                for (i, slot) in bytes[..width].iter_mut().enumerate() {
                    *slot = (computed >> (8 * i)) as u8;
                }
            }
        }
        writer.patch(at, &bytes[..width]);
        Ok(())
    }
}

fn checksum_span(
    checksum: &ChecksumDirective,
    frame_start: usize,
    frame_end: usize,
    at: usize,
) -> Result<(usize, usize)> {
    let from = frame_start + checksum.skip_start;
    let to = frame_end.saturating_sub(checksum.skip_end);
    if from > to {
        return Err(Error::OutOfRange {
            offset: at,
            reason: format!("checksum span [{from}, {to}) is empty"),
        });
    }
    Ok((from, to))
}

fn width_mask(bits: u8) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

fn in_field(error: Error, template: &Template, entry: &FieldEntry) -> Error {
    match error {
        Error::BadType {
            type_name,
            field,
            reason,
        } if type_name.is_empty() && field.is_empty() => Error::BadType {
            type_name: template.type_name().to_owned(),
            field: entry.name.clone(),
            reason,
        },
        other => other,
    }
}
