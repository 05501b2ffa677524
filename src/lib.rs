use std::collections::BTreeMap;
use std::sync::Arc;

use codecs::{Codec, CodecRegistry};
use eval::Evaluator;
use resolver::Resolver;

pub mod bits;
pub mod charset;
pub mod checksum;
pub mod codecs;
mod describe;
pub mod eval;
pub mod frontend;
pub mod interpreter;
pub mod resolver;
pub mod result;
pub mod template;
pub mod value;

pub use bits::{BitReader, BitSet, BitWriter, ByteOrder};
pub use charset::Charset;
pub use eval::{Context, ContextEntry, ContextFn};
pub use frontend::{ComposeFailure, ComposeResponse, Composer, ParseOutcome, Parser};
pub use result::{Error, Result};
pub use template::{
    Binding, ChecksumDirective, Choices, Converter, Directive, DirectiveKind, Header,
    ObjectTarget, SkipDirective, Template, TemplateBuilder, Validator,
};
pub use value::{Record, Value};

/// Immutable bundle of templates, codecs, expression context and the header
/// index; safely shared across threads once built.
#[derive(Debug)]
pub struct Core {
    templates: BTreeMap<String, Arc<Template>>,
    resolver: Resolver,
    codecs: CodecRegistry,
    context: Context,
    evaluator: Evaluator,
}

impl Core {
    pub fn builder() -> CoreBuilder {
        CoreBuilder::new()
    }

    pub fn template(&self, type_name: &str) -> Option<Arc<Template>> {
        self.templates.get(type_name).cloned()
    }

    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn parser(&self) -> Parser<'_> {
        Parser::new(self)
    }

    pub fn composer(&self) -> Composer<'_> {
        Composer::new(self)
    }

    /// JSON-style description of every registered template.
    pub fn describe(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .templates
            .iter()
            .map(|(name, template)| (name.clone(), describe::describe_template(template)))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Collects context entries, codecs and template declarations, then freezes
/// them into a `Core`. Build-fatal errors abort here; nothing frame-level
/// ever mutates the result.
pub struct CoreBuilder {
    context: Context,
    codecs: CodecRegistry,
    templates: Vec<(TemplateBuilder, bool)>,
    strict: bool,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Self {
            context: Context::new(),
            codecs: CodecRegistry::with_defaults(),
            templates: vec![],
            strict: true,
        }
    }

    pub fn add_context(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.context
            .insert(name.to_owned(), ContextEntry::Value(value.into()));
        self
    }

    pub fn add_context_fn(mut self, name: &str, function: ContextFn) -> Self {
        self.context
            .insert(name.to_owned(), ContextEntry::Function(function));
        self
    }

    pub fn register_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codecs.register(codec);
        self
    }

    /// Lenient mode drops fields whose directive kind has no codec instead
    /// of failing the build.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// A framed message type: a header is mandatory and its magics join the
    /// resolver index.
    pub fn add_template(mut self, template: TemplateBuilder) -> Self {
        self.templates.push((template, true));
        self
    }

    /// A nested type only reachable through object directives; never
    /// resolved from the wire directly.
    pub fn add_type(mut self, template: TemplateBuilder) -> Self {
        self.templates.push((template, false));
        self
    }

    pub fn build(self) -> Result<Core> {
        let codecs = self.codecs;
        let mut templates = BTreeMap::new();
        let mut message_names = vec![];
        for (builder, is_message) in self.templates {
            let type_name = builder.type_name().to_owned();
            if is_message && !builder.has_header() {
                return Err(Error::NoHeader { type_name });
            }
            let template = Arc::new(builder.compile(&codecs, self.strict)?);
            if is_message {
                message_names.push(type_name.clone());
            }
            templates.insert(type_name, template);
        }

        for template in templates.values() {
            for entry in template.fields() {
                let mut targets = vec![];
                collect_targets(entry.binding().directive(), &mut targets);
                for target in targets {
                    if !templates.contains_key(target) {
                        return Err(Error::BadType {
                            type_name: template.type_name().to_owned(),
                            field: entry.name().to_owned(),
                            reason: format!("unknown type `{target}`"),
                        });
                    }
                }
            }
        }

        let mut resolver = Resolver::new();
        for name in &message_names {
            let template = &templates[name];
            let header = template
                .header()
                .as_ref()
                .expect("message template has a header");
            for start in header.starts() {
                resolver.insert(start.clone(), *header.charset(), template.clone())?;
            }
        }
        resolver.finalize();

        Ok(Core {
            templates,
            resolver,
            codecs,
            context: self.context,
            evaluator: Evaluator,
        })
    }
}

impl Default for CoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_targets<'t>(directive: &'t Directive, out: &mut Vec<&'t str>) {
    match directive {
        Directive::Object { target } | Directive::ArrayObject { target, .. } => match target {
            ObjectTarget::Type(name) => out.push(name),
            ObjectTarget::Choices(choices) => {
                for alternative in &choices.alternatives {
                    out.push(&alternative.type_name);
                }
                if let Some(default) = &choices.default {
                    out.push(default);
                }
            }
        },
        Directive::ArrayPrimitive { element, .. } => collect_targets(element, out),
        _ => {}
    }
}
