use assert_matches::assert_matches;
use boxon::checksum::Crc16Ccitt;
use boxon::{
    Binding, ByteOrder, Charset, ChecksumDirective, Choices, Core, Directive, Error, Header,
    ObjectTarget, ParseOutcome, TemplateBuilder, Value,
};
use std::sync::Arc;

fn imei_core() -> anyhow::Result<Core> {
    let core = Core::builder()
        .add_template(
            TemplateBuilder::new("Imei")
                .header(Header::new("IM"))
                .field(
                    "imei",
                    Directive::StringFixed {
                        size: "15".into(),
                        charset: Charset::UTF_8,
                    },
                ),
        )
        .build()?;
    Ok(core)
}

#[test]
fn fixed_string_roundtrip() -> anyhow::Result<()> {
    let core = imei_core()?;
    let input = b"IM799273987130000";

    let outcomes = core.parser().parse(input);
    assert_eq!(outcomes.len(), 1);
    let ParseOutcome::Success { value, start, end } = &outcomes[0] else {
        panic!("expected a decoded frame, got {outcomes:?}");
    };
    assert_eq!(*start, 0);
    assert_eq!(*end, input.len());
    assert_eq!(
        value.get("imei"),
        Some(&Value::Str("799273987130000".into()))
    );

    let composed = core.composer().compose(&[value.clone()]);
    assert!(composed.failures().is_empty());
    assert_eq!(composed.bytes().as_slice(), input.as_slice());
    Ok(())
}

fn choice_core() -> anyhow::Result<Core> {
    let core = Core::builder()
        .add_type(TemplateBuilder::new("T1").field(
            "value",
            Directive::Integer {
                bits: 16,
                order: ByteOrder::Big,
                signed: false,
            },
        ))
        .add_type(TemplateBuilder::new("T2").field(
            "value",
            Directive::Integer {
                bits: 32,
                order: ByteOrder::Big,
                signed: false,
            },
        ))
        .add_template(
            TemplateBuilder::new("Tc")
                .header(Header::new("tc1"))
                .field(
                    "value",
                    Directive::Object {
                        target: ObjectTarget::Choices(
                            Choices::new(8)
                                .alternative("prefix == 1", 1, "T1")
                                .alternative("prefix == 2", 2, "T2"),
                        ),
                    },
                ),
        )
        .build()?;
    Ok(core)
}

#[test]
fn prefix_polymorphism() -> anyhow::Result<()> {
    let core = choice_core()?;

    let short_frame = b"tc1\x01\x12\x34";
    let outcomes = core.parser().parse(short_frame);
    let value = outcomes[0].value().expect("first alternative decodes");
    let Some(Value::Record(inner)) = value.get("value") else {
        panic!("nested record expected");
    };
    assert_eq!(inner.type_name(), "T1");
    assert_eq!(inner.get("value"), Some(&Value::Int(0x1234)));
    let composed = core.composer().compose(&[value.clone()]);
    assert_eq!(composed.bytes().as_slice(), short_frame.as_slice());

    let long_frame = b"tc1\x02\x11\x22\x33\x44";
    let outcomes = core.parser().parse(long_frame);
    let value = outcomes[0].value().expect("second alternative decodes");
    let Some(Value::Record(inner)) = value.get("value") else {
        panic!("nested record expected");
    };
    assert_eq!(inner.type_name(), "T2");
    assert_eq!(inner.get("value"), Some(&Value::Int(0x11223344)));
    let composed = core.composer().compose(&[value.clone()]);
    assert_eq!(composed.bytes().as_slice(), long_frame.as_slice());
    Ok(())
}

#[test]
fn unmatched_prefix_without_default_fails() -> anyhow::Result<()> {
    let core = choice_core()?;
    let outcomes = core.parser().parse(b"tc1\x07\x00\x00");
    assert_matches!(
        &outcomes[0],
        ParseOutcome::Failure {
            error: Error::NoTemplate { .. },
            ..
        }
    );
    Ok(())
}

#[test]
fn terminated_then_fixed_string() -> anyhow::Result<()> {
    let core = Core::builder()
        .add_template(
            TemplateBuilder::new("Greeting")
                .header(Header::new("hdr,"))
                .field(
                    "name",
                    Directive::StringTerminated {
                        terminator: b',',
                        consume: true,
                        charset: Charset::UTF_8,
                    },
                )
                .field(
                    "payload",
                    Directive::StringFixed {
                        size: "4".into(),
                        charset: Charset::UTF_8,
                    },
                ),
        )
        .build()?;

    let input = b"hdr,Mauro,ABCD";
    let outcomes = core.parser().parse(input);
    let value = outcomes[0].value().expect("frame decodes");
    assert_eq!(value.get("name"), Some(&Value::Str("Mauro".into())));
    assert_eq!(value.get("payload"), Some(&Value::Str("ABCD".into())));

    let composed = core.composer().compose(&[value.clone()]);
    assert_eq!(composed.bytes().as_slice(), input.as_slice());
    Ok(())
}

#[test]
fn sub_byte_integers() -> anyhow::Result<()> {
    let core = Core::builder()
        .add_template(
            TemplateBuilder::new("Packed")
                .header(Header::new("ab"))
                .field(
                    "high",
                    Directive::ArbitraryInteger {
                        size: "12".into(),
                        order: ByteOrder::Big,
                        signed: false,
                    },
                )
                .field(
                    "low",
                    Directive::ArbitraryInteger {
                        size: "4".into(),
                        order: ByteOrder::Big,
                        signed: false,
                    },
                ),
        )
        .build()?;

    let input = b"ab\xAB\xCD";
    let outcomes = core.parser().parse(input);
    let value = outcomes[0].value().expect("frame decodes");
    assert_eq!(value.get("high"), Some(&Value::Int(0xABC)));
    assert_eq!(value.get("low"), Some(&Value::Int(0xD)));

    let composed = core.composer().compose(&[value.clone()]);
    assert_eq!(composed.bytes().as_slice(), input.as_slice());
    Ok(())
}

fn crc_core() -> anyhow::Result<Core> {
    let core = Core::builder()
        .add_template(
            TemplateBuilder::new("Ack")
                .header(Header::new("91"))
                .field(
                    "device",
                    Directive::StringFixed {
                        size: "5".into(),
                        charset: Charset::UTF_8,
                    },
                )
                .field(
                    "crc",
                    Directive::Checksum(ChecksumDirective {
                        bits: 16,
                        order: ByteOrder::Big,
                        algorithm: Arc::new(Crc16Ccitt),
                        skip_start: 0,
                        skip_end: 2,
                        initial: 0,
                    }),
                ),
        )
        .build()?;
    Ok(core)
}

#[test]
fn checksum_verified() -> anyhow::Result<()> {
    let core = crc_core()?;
    // CRC-16/XMODEM over b"9142656" is 0x87F4
    let input = b"9142656\x87\xF4";
    let outcomes = core.parser().parse(input);
    let value = outcomes[0].value().expect("trailer verifies");
    assert_eq!(value.get("device"), Some(&Value::Str("42656".into())));
    assert_eq!(value.get("crc"), Some(&Value::Int(0x87F4)));

    let composed = core.composer().compose(&[value.clone()]);
    assert_eq!(composed.bytes().as_slice(), input.as_slice());
    Ok(())
}

#[test]
fn checksum_mismatch_points_at_trailer() -> anyhow::Result<()> {
    let core = crc_core()?;
    let input = b"9142656\x87\xF5";
    let outcomes = core.parser().parse(input);
    assert_matches!(
        &outcomes[0],
        ParseOutcome::Failure {
            offset: 7,
            error: Error::ChecksumMismatch {
                offset: 7,
                computed: 0x87F4,
                read: 0x87F5,
            },
        }
    );
    Ok(())
}

#[test]
fn recovery_after_unknown_frame() -> anyhow::Result<()> {
    let core = imei_core()?;
    let mut input = b"zzzz".to_vec();
    input.extend_from_slice(b"IM799273987130000");

    let outcomes = core.parser().parse(&input);
    assert_eq!(outcomes.len(), 2);
    assert_matches!(
        &outcomes[0],
        ParseOutcome::Failure {
            offset: 0,
            error: Error::NoTemplate { offset: 0 },
        }
    );
    let ParseOutcome::Success { value, start, end } = &outcomes[1] else {
        panic!("second frame should decode");
    };
    assert_eq!((*start, *end), (4, input.len()));
    assert_eq!(
        value.get("imei"),
        Some(&Value::Str("799273987130000".into()))
    );
    Ok(())
}

#[test]
fn consecutive_frames_decode_in_order() -> anyhow::Result<()> {
    let core = choice_core()?;
    let input = b"tc1\x01\x12\x34tc1\x02\x11\x22\x33\x44";
    let outcomes = core.parser().parse(input);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(ParseOutcome::is_success));

    let records: Vec<_> = outcomes
        .iter()
        .filter_map(|o| o.value().cloned())
        .collect();
    let composed = core.composer().compose(&records);
    assert_eq!(composed.bytes().as_slice(), input.as_slice());
    Ok(())
}

#[test]
fn truncated_frame_reports_eof() -> anyhow::Result<()> {
    let core = imei_core()?;
    let outcomes = core.parser().parse(b"IM7992");
    assert_matches!(
        &outcomes[0],
        ParseOutcome::Failure {
            error: Error::Eof { .. },
            ..
        }
    );
    Ok(())
}

#[test]
fn compose_twice_is_identical() -> anyhow::Result<()> {
    let core = choice_core()?;
    let outcomes = core.parser().parse(b"tc1\x01\x12\x34");
    let value = outcomes[0].value().unwrap().clone();
    let first = core.composer().compose(&[value.clone()]);
    let second = core.composer().compose(&[value]);
    assert_eq!(first.bytes(), second.bytes());
    Ok(())
}

#[test]
fn build_errors() {
    // no header on a message template
    let result = Core::builder()
        .add_template(TemplateBuilder::new("Bare").field(
            "x",
            Directive::Integer {
                bits: 8,
                order: ByteOrder::Big,
                signed: false,
            },
        ))
        .build();
    assert_matches!(result, Err(Error::NoHeader { .. }));

    // two templates claiming the same magic
    let result = Core::builder()
        .add_template(TemplateBuilder::new("A").header(Header::new("xx")))
        .add_template(TemplateBuilder::new("B").header(Header::new("xx")))
        .build();
    assert_matches!(result, Err(Error::DuplicateHeader { .. }));

    // empty magic
    let result = Core::builder()
        .add_template(TemplateBuilder::new("Empty").header(Header::new("")))
        .build();
    assert_matches!(result, Err(Error::EmptyMagic { .. }));

    // more than one checksum field
    let checksum = || {
        Directive::Checksum(ChecksumDirective {
            bits: 16,
            order: ByteOrder::Big,
            algorithm: Arc::new(Crc16Ccitt),
            skip_start: 0,
            skip_end: 2,
            initial: 0,
        })
    };
    let result = Core::builder()
        .add_template(
            TemplateBuilder::new("Doubled")
                .header(Header::new("dd"))
                .field("first", checksum())
                .field("second", checksum()),
        )
        .build();
    assert_matches!(result, Err(Error::MultipleChecksums { .. }));

    // checksum span may not cover the checksum itself
    let result = Core::builder()
        .add_template(
            TemplateBuilder::new("SelfCovering")
                .header(Header::new("sc"))
                .field(
                    "crc",
                    Directive::Checksum(ChecksumDirective {
                        bits: 16,
                        order: ByteOrder::Big,
                        algorithm: Arc::new(Crc16Ccitt),
                        skip_start: 0,
                        skip_end: 0,
                        initial: 0,
                    }),
                ),
        )
        .build();
    assert_matches!(result, Err(Error::BadType { .. }));

    // object directive naming an unregistered type
    let result = Core::builder()
        .add_template(
            TemplateBuilder::new("Dangling")
                .header(Header::new("dg"))
                .field(
                    "value",
                    Directive::Object {
                        target: ObjectTarget::Type("Missing".into()),
                    },
                ),
        )
        .build();
    assert_matches!(result, Err(Error::BadType { .. }));
}

#[test]
fn describe_lists_templates() -> anyhow::Result<()> {
    let core = choice_core()?;
    let description = core.describe();
    let tc = &description["Tc"];
    assert_eq!(tc["header"]["charset"], "UTF-8");
    assert_eq!(tc["fields"][0]["name"], "value");
    assert_eq!(tc["fields"][0]["directive"]["kind"], "object");
    assert!(description.get("T1").is_some());
    Ok(())
}

#[test]
fn end_magic_matched_and_written() -> anyhow::Result<()> {
    let core = Core::builder()
        .add_template(
            TemplateBuilder::new("Wrapped")
                .header(Header::new("<<").end(">>"))
                .field(
                    "value",
                    Directive::Integer {
                        bits: 8,
                        order: ByteOrder::Big,
                        signed: false,
                    },
                ),
        )
        .build()?;

    let input = b"<<\x2A>>";
    let outcomes = core.parser().parse(input);
    let value = outcomes[0].value().expect("frame decodes");
    assert_eq!(value.get("value"), Some(&Value::Int(42)));
    let composed = core.composer().compose(&[value.clone()]);
    assert_eq!(composed.bytes().as_slice(), input.as_slice());

    let outcomes = core.parser().parse(b"<<\x2A!!");
    assert_matches!(
        &outcomes[0],
        ParseOutcome::Failure {
            offset: 3,
            error: Error::NoTemplate { offset: 3 },
        }
    );
    Ok(())
}

#[test]
fn alternative_start_magics() -> anyhow::Result<()> {
    let core = Core::builder()
        .add_template(
            TemplateBuilder::new("Dual")
                .header(Header::new("aa").start("bb"))
                .field(
                    "value",
                    Directive::Integer {
                        bits: 8,
                        order: ByteOrder::Big,
                        signed: false,
                    },
                ),
        )
        .build()?;

    for magic in [b"aa".as_slice(), b"bb".as_slice()] {
        let mut input = magic.to_vec();
        input.push(0x55);
        let outcomes = core.parser().parse(&input);
        let value = outcomes[0].value().expect("either magic resolves");
        assert_eq!(value.get("value"), Some(&Value::Int(0x55)));
    }

    // encode always emits the first declared start
    let outcomes = core.parser().parse(b"bb\x55");
    let composed = core
        .composer()
        .compose(&[outcomes[0].value().unwrap().clone()]);
    assert_eq!(composed.bytes().as_slice(), b"aa\x55".as_slice());
    Ok(())
}

#[test]
fn conditional_field_roundtrip() -> anyhow::Result<()> {
    let core = Core::builder()
        .add_template(
            TemplateBuilder::new("Flagged")
                .header(Header::new("fl"))
                .field(
                    "flags",
                    Directive::Integer {
                        bits: 8,
                        order: ByteOrder::Big,
                        signed: false,
                    },
                )
                .field(
                    "extension",
                    Binding::new(Directive::Integer {
                        bits: 8,
                        order: ByteOrder::Big,
                        signed: false,
                    })
                    .when("flags & 1 == 1"),
                ),
        )
        .build()?;

    let with_extension = b"fl\x01\x7F";
    let outcomes = core.parser().parse(with_extension);
    let value = outcomes[0].value().expect("frame decodes");
    assert_eq!(value.get("extension"), Some(&Value::Int(0x7F)));
    let composed = core.composer().compose(&[value.clone()]);
    assert_eq!(composed.bytes().as_slice(), with_extension.as_slice());

    let without_extension = b"fl\x00";
    let outcomes = core.parser().parse(without_extension);
    let value = outcomes[0].value().expect("frame decodes");
    assert!(value.get("extension").is_none());
    let composed = core.composer().compose(&[value.clone()]);
    assert_eq!(composed.bytes().as_slice(), without_extension.as_slice());
    Ok(())
}
