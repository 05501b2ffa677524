use num_bigint::BigInt;

use crate::bits::{BitReader, BitWriter};
use crate::codecs::{type_mismatch, Codec};
use crate::interpreter::Interpreter;
use crate::result::{Error, Result};
use crate::template::{Binding, Choices, Directive, DirectiveKind, ObjectTarget};
use crate::value::{Record, Value};

#[derive(Debug)]
pub struct ObjectCodec;

impl Codec for ObjectCodec {
    fn kind(&self) -> DirectiveKind {
        DirectiveKind::Object
    }

    fn decode(
        &self,
        interp: &mut Interpreter<'_>,
        reader: &mut BitReader<'_>,
        binding: &Binding,
    ) -> Result<Option<Value>> {
        let Directive::Object { target } = binding.directive() else {
            unreachable!("object codec invoked with {:?}", binding.directive().kind());
        };
        decode_target(interp, reader, target).map(Some)
    }

    fn encode(
        &self,
        interp: &mut Interpreter<'_>,
        writer: &mut BitWriter,
        binding: &Binding,
        value: &Value,
    ) -> Result<()> {
        let Directive::Object { target } = binding.directive() else {
            unreachable!("object codec invoked with {:?}", binding.directive().kind());
        };
        let record = value
            .as_record()
            .ok_or_else(|| type_mismatch("record", value))?;
        encode_target(interp, writer, target, record)
    }
}

pub(crate) fn decode_target(
    interp: &mut Interpreter<'_>,
    reader: &mut BitReader<'_>,
    target: &ObjectTarget,
) -> Result<Value> {
    let type_name = match target {
        ObjectTarget::Type(name) => name.clone(),
        ObjectTarget::Choices(choices) => {
            if choices.prefix_size > 0 {
                let prefix = reader.read_bigint(choices.prefix_size, choices.bit_order, false)?;
                let prefix = u64::try_from(&prefix).expect("choice prefix wider than 64 bits");
                interp.scope_mut().set_prefix(prefix);
            }
            select_alternative(interp, choices, reader.position())?
        }
    };
    let template = interp.template(&type_name, reader.position())?;
    let record = interp.decode(&template, reader)?;
    Ok(Value::Record(record))
}

fn select_alternative(
    interp: &Interpreter<'_>,
    choices: &Choices,
    offset: usize,
) -> Result<String> {
    for alternative in &choices.alternatives {
        if alternative.condition.is_empty() || interp.eval_boolean(&alternative.condition)? {
            return Ok(alternative.type_name.clone());
        }
    }
    choices
        .default
        .clone()
        .ok_or(Error::NoTemplate { offset })
}

pub(crate) fn encode_target(
    interp: &mut Interpreter<'_>,
    writer: &mut BitWriter,
    target: &ObjectTarget,
    record: &Record,
) -> Result<()> {
    let type_name = match target {
        ObjectTarget::Type(name) => {
            if record.type_name() != name {
                return Err(Error::BadType {
                    type_name: record.type_name().to_owned(),
                    field: String::new(),
                    reason: format!("directive expects type `{name}`"),
                });
            }
            name.clone()
        }
        ObjectTarget::Choices(choices) => {
            // The alternative is selected by the runtime type; its declared
            // prefix goes on the wire.
            let alternative = choices
                .alternatives
                .iter()
                .find(|a| a.type_name == record.type_name());
            match alternative {
                Some(alternative) => {
                    if choices.prefix_size > 0 {
                        writer.write_bigint(
                            &BigInt::from(alternative.prefix),
                            choices.prefix_size,
                            choices.bit_order,
                        );
                        interp.scope_mut().set_prefix(alternative.prefix);
                    }
                    alternative.type_name.clone()
                }
                None
                    if choices.prefix_size == 0
                        && choices.default.as_deref() == Some(record.type_name()) =>
                {
                    record.type_name().to_owned()
                }
                None => {
                    return Err(Error::BadType {
                        type_name: record.type_name().to_owned(),
                        field: String::new(),
                        reason: "no alternative matches the runtime type".into(),
                    });
                }
            }
        }
    };
    let template = interp.template(&type_name, writer.position())?;
    interp.encode(&template, writer, record)
}
