use num_bigint::BigInt;

use crate::bits::{BitReader, BitWriter};
use crate::codecs::{type_mismatch, Codec};
use crate::interpreter::Interpreter;
use crate::result::{Error, Result};
use crate::template::{Binding, Directive, DirectiveKind};
use crate::value::Value;

#[derive(Debug)]
pub struct IntegerCodec;

impl Codec for IntegerCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::Integer
    }

    fn decode(
        &self,
        _interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let &Directive::Integer {
            bits,
            order,
            signed,
        } = binding.directive()
        else {
            unreachable!("integer codec invoked with {:?}", binding.directive().kind());
        };
        let value = match (bits, signed) {
            (8, false) => Value::Int(reader.read_u8()?.into()),
            (8, true) => Value::Int(reader.read_i8()?.into()),
            (16, false) => Value::Int(reader.read_u16(order)?.into()),
            (16, true) => Value::Int(reader.read_i16(order)?.into()),
            (32, false) => Value::Int(reader.read_u32(order)?.into()),
            (32, true) => Value::Int(reader.read_i32(order)?.into()),
            (64, false) => Value::from_bigint(BigInt::from(reader.read_u64(order)?)),
            (64, true) => Value::Int(reader.read_i64(order)?),
            _ => unreachable!("integer width {bits} rejected at compile"),
        };
        Ok(Some(value))
    }

    fn encode(
        &self,
        _interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let &Directive::Integer { bits, order, .. } = binding.directive() else {
            unreachable!("integer codec invoked with {:?}", binding.directive().kind());
        };
        let wire = value
            .to_bigint()
            .ok_or_else(|| type_mismatch("integer", value))?;
        writer.write_bigint(&wire, bits.into(), order);
        Ok(())
    }
}

#[derive(Debug)]
pub struct ArbitraryIntegerCodec;

impl Codec for ArbitraryIntegerCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::ArbitraryInteger
    }

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::ArbitraryInteger {
            size,
            order,
            signed,
        } = binding.directive()
        else {
            unreachable!("arbitrary-integer codec invoked with {:?}", binding.directive().kind());
        };
        let count = interp.eval_size(size, reader.position())?;
        let value = reader.read_bigint(count, *order, *signed)?;
        Ok(Some(Value::from_bigint(value)))
    }

    fn encode(
        &self,
        interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let Directive::ArbitraryInteger { size, order, .. } = binding.directive() else {
            unreachable!("arbitrary-integer codec invoked with {:?}", binding.directive().kind());
        };
        let count = interp.eval_size(size, writer.position())?;
        if count == 0 {
            return Err(Error::OutOfRange {
                offset: writer.position(),
                reason: "zero-width integer".into(),
            });
        }
        let wire = value
            .to_bigint()
            .ok_or_else(|| type_mismatch("integer", value))?;
        writer.write_bigint(&wire, count, *order);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FloatCodec;

impl Codec for FloatCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::Float
    }

    fn decode(
        &self,
        _interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let &Directive::Float { order } = binding.directive() else {
            unreachable!("float codec invoked with {:?}", binding.directive().kind());
        };
        Ok(Some(Value::Float(reader.read_f32(order)?.into())))
    }

    fn encode(
        &self,
        _interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let &Directive::Float { order } = binding.directive() else {
            unreachable!("float codec invoked with {:?}", binding.directive().kind());
        };
        let wire = value
            .as_float()
            .ok_or_else(|| type_mismatch("float", value))?;
        writer.write_f32(wire as f32, order);
        Ok(())
    }
}

#[derive(Debug)]
pub struct DoubleCodec;

impl Codec for DoubleCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::Double
    }

    fn decode(
        &self,
        _interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let &Directive::Double { order } = binding.directive() else {
            unreachable!("double codec invoked with {:?}", binding.directive().kind());
        };
        Ok(Some(Value::Float(reader.read_f64(order)?)))
    }

    fn encode(
        &self,
        _interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let &Directive::Double { order } = binding.directive() else {
            unreachable!("double codec invoked with {:?}", binding.directive().kind());
        };
        let wire = value
            .as_float()
            .ok_or_else(|| type_mismatch("float", value))?;
        writer.write_f64(wire, order);
        Ok(())
    }
}

#[derive(Debug)]
pub struct BitSetCodec;

impl Codec for BitSetCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::BitSet
    }

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::BitSet { size, bit_order } = binding.directive() else {
            unreachable!("bitset codec invoked with {:?}", binding.directive().kind());
        };
        let count = interp.eval_size(size, reader.position())?;
        Ok(Some(Value::Bits(reader.read_bits(count, *bit_order)?)))
    }

    fn encode(
        &self,
        interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let Directive::BitSet { size, bit_order } = binding.directive() else {
            unreachable!("bitset codec invoked with {:?}", binding.directive().kind());
        };
        let count = interp.eval_size(size, writer.position())?;
        let Value::Bits(set) = value else {
            return Err(type_mismatch("bits", value));
        };
        if set.len() != count {
            return Err(type_mismatch(&format!("bit set of {count} bits"), value));
        }
        writer.write_bits(set, *bit_order);
        Ok(())
    }
}
