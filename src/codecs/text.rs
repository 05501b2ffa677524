use crate::bits::{BitReader, BitWriter};
use crate::codecs::{type_mismatch, Codec};
use crate::interpreter::Interpreter;
use crate::result::Result;
use crate::template::{Binding, Directive, DirectiveKind};
use crate::value::Value;

#[derive(Debug)]
pub struct StringFixedCodec;

impl Codec for StringFixedCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::StringFixed
    }

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::StringFixed { size, charset } = binding.directive() else {
            unreachable!("fixed-string codec invoked with {:?}", binding.directive().kind());
        };
        let count = interp.eval_size(size, reader.position())?;
        Ok(Some(Value::Str(reader.read_text_fixed(count, *charset)?)))
    }

    fn encode(
        &self,
        interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let Directive::StringFixed { size, charset } = binding.directive() else {
            unreachable!("fixed-string codec invoked with {:?}", binding.directive().kind());
        };
        let count = interp.eval_size(size, writer.position())?;
        let text = value.as_str().ok_or_else(|| type_mismatch("string", value))?;
        // Exactly `count` bytes on the wire: truncate or NUL-pad.
        let mut bytes = charset.encode(text);
        bytes.resize(count, 0);
        writer.write_bytes(&bytes);
        Ok(())
    }
}

#[derive(Debug)]
pub struct StringTerminatedCodec;

impl Codec for StringTerminatedCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::StringTerminated
    }

    fn decode(
        &self,
        _interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::StringTerminated {
            terminator,
            consume,
            charset,
        } = binding.directive()
        else {
            unreachable!("terminated-string codec invoked with {:?}", binding.directive().kind());
        };
        let text = reader.read_text_until(*terminator, *charset)?;
        if *consume {
            reader.skip_until(*terminator, true)?;
        }
        Ok(Some(Value::Str(text)))
    }

    fn encode(
        &self,
        _interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let Directive::StringTerminated {
            terminator,
            consume,
            charset,
        } = binding.directive()
        else {
            unreachable!("terminated-string codec invoked with {:?}", binding.directive().kind());
        };
        let text = value.as_str().ok_or_else(|| type_mismatch("string", value))?;
        writer.write_text(text, *charset);
        // A consumed terminator belongs to this field; otherwise the next
        // field owns the byte.
        if *consume {
            writer.write_u8(*terminator);
        }
        Ok(())
    }
}
