use crate::bits::{BitReader, BitWriter};
use crate::codecs::Codec;
use crate::interpreter::Interpreter;
use crate::result::Result;
use crate::template::{Binding, Directive, DirectiveKind, SkipDirective};
use crate::value::Value;

/// Advances the cursor without producing a value. Sized skips count bits;
/// terminated skips scan bytes.
#[derive(Debug)]
pub struct SkipCodec;

impl Codec for SkipCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::Skip
    }

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::Skip(skip) = binding.directive() else {
            unreachable!("skip codec invoked with {:?}", binding.directive().kind());
        };
        match skip {
            SkipDirective::Bits { size } => {
                let count = interp.eval_size(size, reader.position())?;
                reader.skip_bits(count)?;
            }
            SkipDirective::Until {
                terminator,
                consume,
            } => {
                reader.skip_until(*terminator, *consume)?;
            }
        }
        Ok(None)
    }

    fn encode(
        &self,
        interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        _value: &Value,
    ) -> Result<()> {
        let Directive::Skip(skip) = binding.directive() else {
            unreachable!("skip codec invoked with {:?}", binding.directive().kind());
        };
        match skip {
            SkipDirective::Bits { size } => {
                let count = interp.eval_size(size, writer.position())?;
                writer.write_pad(count);
            }
            SkipDirective::Until {
                terminator,
                consume,
            } => {
                // When the terminator was not consumed on decode, the
                // following field owns the byte.
                if *consume {
                    writer.write_u8(*terminator);
                }
            }
        }
        Ok(())
    }
}

/// Reads and writes the checksum slot; span verification and placeholder
/// patching happen in the interpreter at frame end.
#[derive(Debug)]
pub struct ChecksumCodec;

impl Codec for ChecksumCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::Checksum
    }

    fn decode(
        &self,
        _interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::Checksum(checksum) = binding.directive() else {
            unreachable!("checksum codec invoked with {:?}", binding.directive().kind());
        };
        let value = match checksum.bits {
            8 => reader.read_u8()?.into(),
            16 => reader.read_u16(checksum.order)?.into(),
            32 => reader.read_u32(checksum.order)?,
            _ => unreachable!("checksum width {} rejected at compile", checksum.bits),
        };
        Ok(Some(Value::Int(value.into())))
    }

    fn encode(
        &self,
        _interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        _value: &Value,
    ) -> Result<()> {
        let Directive::Checksum(checksum) = binding.directive() else {
            unreachable!("checksum codec invoked with {:?}", binding.directive().kind());
        };
        writer.write_pad(usize::from(checksum.bits));
        Ok(())
    }
}

/// No bytes; the value comes from an expression over the scope.
#[derive(Debug)]
pub struct EvaluatedCodec;

impl Codec for EvaluatedCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::Evaluated
    }

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        _reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::Evaluated { expression } = binding.directive() else {
            unreachable!("evaluated codec invoked with {:?}", binding.directive().kind());
        };
        interp.eval_value(expression).map(Some)
    }

    fn encode(
        &self,
        _interp: &mut Interpreter<'_>,
        _writer: &mut BitWriter,
        _binding: &Binding,
        _value: &Value,
    ) -> Result<()> {
        Ok(())
    }
}
