use serde_json::{json, Map, Value as Json};

use crate::resolver::to_hex;
use crate::template::{Directive, ObjectTarget, SkipDirective, Template};

pub(crate) fn describe_template(template: &Template) -> Json {
    let mut description = Map::new();
    if let Some(header) = template.header() {
        description.insert(
            "header".into(),
            json!({
                "start": header.starts().iter().map(|m| to_hex(m)).collect::<Vec<_>>(),
                "end": header.end().as_ref().map(|m| to_hex(m)),
                "charset": header.charset().name(),
            }),
        );
    }
    let fields: Vec<Json> = template
        .fields()
        .iter()
        .map(|entry| {
            let mut field = Map::new();
            field.insert("name".into(), entry.name().into());
            field.insert(
                "directive".into(),
                describe_directive(entry.binding().directive()),
            );
            let binding = entry.binding();
            if !binding.condition.is_empty() {
                field.insert("condition".into(), binding.condition.clone().into());
            }
            if binding.converter.is_some() || !binding.converter_choices.is_empty() {
                field.insert("converted".into(), true.into());
            }
            if binding.validator.is_some() {
                field.insert("validated".into(), true.into());
            }
            Json::Object(field)
        })
        .collect();
    description.insert("fields".into(), fields.into());
    if !template.evaluated_fields().is_empty() {
        let evaluated: Vec<Json> = template
            .evaluated_fields()
            .iter()
            .map(|f| json!({ "name": f.name.as_str(), "expression": f.expression.as_str() }))
            .collect();
        description.insert("evaluated".into(), evaluated.into());
    }
    if !template.post_processed_fields().is_empty() {
        let post: Vec<Json> = template
            .post_processed_fields()
            .iter()
            .map(|f| {
                json!({
                    "name": f.name.as_str(),
                    "condition": f.condition.as_str(),
                    "onDecode": f.on_decode.as_str(),
                    "onEncode": f.on_encode.as_str(),
                })
            })
            .collect();
        description.insert("postProcessed".into(), post.into());
    }
    Json::Object(description)
}

fn describe_directive(directive: &Directive) -> Json {
    match directive {
        Directive::Integer {
            bits,
            order,
            signed,
        } => json!({
            "kind": "integer",
            "bits": bits,
            "order": format!("{order:?}"),
            "signed": signed,
        }),
        Directive::ArbitraryInteger {
            size,
            order,
            signed,
        } => json!({
            "kind": "arbitrary-integer",
            "size": size,
            "order": format!("{order:?}"),
            "signed": signed,
        }),
        Directive::Float { order } => json!({ "kind": "float", "order": format!("{order:?}") }),
        Directive::Double { order } => json!({ "kind": "double", "order": format!("{order:?}") }),
        Directive::BitSet { size, bit_order } => json!({
            "kind": "bitset",
            "size": size,
            "bitOrder": format!("{bit_order:?}"),
        }),
        Directive::ArrayPrimitive { element, size } => json!({
            "kind": "array-primitive",
            "size": size,
            "element": describe_directive(element),
        }),
        Directive::ArrayObject { target, size } => json!({
            "kind": "array-object",
            "size": size,
            "target": describe_target(target),
        }),
        Directive::Object { target } => json!({
            "kind": "object",
            "target": describe_target(target),
        }),
        Directive::StringFixed { size, charset } => json!({
            "kind": "string-fixed",
            "size": size,
            "charset": charset.name(),
        }),
        Directive::StringTerminated {
            terminator,
            consume,
            charset,
        } => json!({
            "kind": "string-terminated",
            "terminator": terminator,
            "consume": consume,
            "charset": charset.name(),
        }),
        Directive::Skip(SkipDirective::Bits { size }) => {
            json!({ "kind": "skip", "size": size })
        }
        Directive::Skip(SkipDirective::Until {
            terminator,
            consume,
        }) => json!({ "kind": "skip-until", "terminator": terminator, "consume": consume }),
        Directive::Checksum(checksum) => json!({
            "kind": "checksum",
            "bits": checksum.bits,
            "order": format!("{:?}", checksum.order),
            "skipStart": checksum.skip_start,
            "skipEnd": checksum.skip_end,
            "initial": checksum.initial,
        }),
        Directive::Evaluated { expression } => {
            json!({ "kind": "evaluated", "expression": expression })
        }
    }
}

fn describe_target(target: &ObjectTarget) -> Json {
    match target {
        ObjectTarget::Type(name) => json!({ "type": name }),
        ObjectTarget::Choices(choices) => json!({
            "prefixSize": choices.prefix_size,
            "bitOrder": format!("{:?}", choices.bit_order),
            "alternatives": choices
                .alternatives
                .iter()
                .map(|a| json!({
                    "condition": a.condition.as_str(),
                    "prefix": a.prefix,
                    "type": a.type_name.as_str(),
                }))
                .collect::<Vec<_>>(),
            "default": choices.default.clone(),
        }),
    }
}
