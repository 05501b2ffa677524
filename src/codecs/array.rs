use crate::bits::{BitReader, BitWriter};
use crate::codecs::object::{decode_target, encode_target};
use crate::codecs::{type_mismatch, Codec};
use crate::interpreter::Interpreter;
use crate::result::{Error, Result};
use crate::template::{Binding, Directive, DirectiveKind};
use crate::value::Value;

// Every element consumes at least one bit, so a count past the remaining
// buffer can never decode; rejecting it up front also bounds allocation.
fn bounded_count(
    interp: &Interpreter<'_>,
    size: &str,
    reader: &BitReader<'_>,
) -> Result<usize> {
    let count = interp.eval_size(size, reader.position())?;
    if count > 0 && count > reader.remaining_bits() {
        return Err(Error::OutOfRange {
            offset: reader.position(),
            reason: format!("{count} elements exceed the remaining buffer"),
        });
    }
    Ok(count)
}

#[derive(Debug)]
pub struct ArrayPrimitiveCodec;

impl Codec for ArrayPrimitiveCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::ArrayPrimitive
    }

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::ArrayPrimitive { element, size } = binding.directive() else {
            unreachable!("primitive-array codec invoked with {:?}", binding.directive().kind());
        };
        let count = bounded_count(interp, size, reader)?;
        let codec = interp.codec(element.kind())?;
        let element_binding = Binding::new((**element).clone());
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(item) = codec.decode(interp, reader, &element_binding)? {
                items.push(item);
            }
        }
        Ok(Some(Value::List(items)))
    }

    fn encode(
        &self,
        interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let Directive::ArrayPrimitive { element, size } = binding.directive() else {
            unreachable!("primitive-array codec invoked with {:?}", binding.directive().kind());
        };
        let count = interp.eval_size(size, writer.position())?;
        let items = value.as_list().ok_or_else(|| type_mismatch("list", value))?;
        if items.len() != count {
            return Err(type_mismatch(&format!("list of {count} elements"), value));
        }
        let codec = interp.codec(element.kind())?;
        let element_binding = Binding::new((**element).clone());
        for item in items {
            codec.encode(interp, writer, &element_binding, item)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ArrayObjectCodec;

impl Codec for ArrayObjectCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::ArrayObject
    }

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::ArrayObject { target, size } = binding.directive() else {
            unreachable!("object-array codec invoked with {:?}", binding.directive().kind());
        };
        let count = bounded_count(interp, size, reader)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(decode_target(interp, reader, target)?);
        }
        Ok(Some(Value::List(items)))
    }

    fn encode(
        &self,
        interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let Directive::ArrayObject { target, size } = binding.directive() else {
            unreachable!("object-array codec invoked with {:?}", binding.directive().kind());
        };
        let count = interp.eval_size(size, writer.position())?;
        let items = value.as_list().ok_or_else(|| type_mismatch("list", value))?;
        if items.len() != count {
            return Err(type_mismatch(&format!("list of {count} elements"), value));
        }
        for item in items {
            let record = item
                .as_record()
                .ok_or_else(|| type_mismatch("record", item))?;
            encode_target(interp, writer, target, record)?;
        }
        Ok(())
    }
}
