//! Schema registry and field descriptors.
//!
//! A [`Schema`] is the per-type table the dispatcher consults for every
//! parse event. It is assembled once through [`SchemaBuilder`] (directly,
//! or by `#[derive(SaxDocument)]`) and is read-only afterwards.
//!
//! # Declaring fields
//!
//! ```ignore
//! let schema = Schema::builder("Feed")
//!     .element("title", FieldOptions::new())
//!     .element("link", FieldOptions::new().value_attr("href").with_attr("rel", "alternate"))
//!     .attribute("xml:lang", FieldOptions::new().as_name("lang"))
//!     .elements("entry", FieldOptions::new().as_name("entries").class(NestedType::of::<Entry>()).lazy(true))
//!     .build();
//! ```
//!
//! Declaration never fails. Options that cannot be satisfied (for example a
//! nested collection with no nested type) surface only when the dispatcher
//! meets the element.

use crate::document::SaxDocument;
use crate::mapped::Mapped;

/// How a field is populated.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Set once, first occurrence wins.
    Scalar,
    /// Every occurrence is appended to a `Vec`.
    EagerCollection,
    /// Every occurrence is handed to the consumer through the lazy queue.
    LazyCollection,
}

/// Which part of the markup a field binds to.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// A descendant element of the object's element.
    Element,
    /// An attribute of the object's own element.
    Attribute,
    /// The direct text content of the object's own element.
    Value,
}

/// Whether the setter behind a field is generated or supplied by the user.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Accessor {
    #[default]
    Synthesized,
    /// A user-defined setter; never replaced by later declarations.
    Custom,
}

/// A reference to another mapped type whose content is parsed recursively.
#[derive(Debug, Clone, Copy)]
pub struct NestedType {
    schema: fn() -> &'static Schema,
    construct: fn() -> Box<dyn Mapped>,
}

fn construct_default<T: SaxDocument>() -> Box<dyn Mapped> {
    Box::new(T::default())
}

impl NestedType {
    pub fn of<T: SaxDocument>() -> Self {
        Self {
            schema: T::schema,
            construct: construct_default::<T>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.schema().type_name()
    }

    pub fn schema(&self) -> &'static Schema {
        (self.schema)()
    }

    /// Build an empty instance to parse the element's content into.
    pub fn construct(&self) -> Box<dyn Mapped> {
        (self.construct)()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for NestedType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name())
    }
}

/// Describes how one markup name maps onto one field.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    source_name: String,
    target_name: String,
    kind: FieldKind,
    source: Source,
    nested: Option<NestedType>,
    value_attr: Option<String>,
    with: Vec<(String, String)>,
    required: bool,
    accessor: Accessor,
}

impl FieldDescriptor {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn nested(&self) -> Option<&NestedType> {
        self.nested.as_ref()
    }

    /// Attribute of the matching element to read instead of its text.
    pub fn value_attr(&self) -> Option<&str> {
        self.value_attr.as_deref()
    }

    /// Attribute values the element must carry to match.
    pub fn with_filters(&self) -> &[(String, String)] {
        &self.with
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn accessor(&self) -> Accessor {
        self.accessor
    }

    pub fn is_collection(&self) -> bool {
        !matches!(self.kind, FieldKind::Scalar)
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.kind, FieldKind::LazyCollection)
    }

    /// Name of the nested type, if any.
    pub fn data_class(&self) -> Option<&'static str> {
        self.nested.map(|n| n.type_name())
    }

    /// True when every `with` filter is satisfied by `attrs`.
    pub fn matches(&self, attrs: &[(String, String)]) -> bool {
        self.with.iter().all(|(key, expected)| {
            attrs
                .iter()
                .any(|(name, value)| name == key && value == expected)
        })
    }
}

/// Options accepted by every declaration on [`SchemaBuilder`].
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    as_name: Option<String>,
    class: Option<NestedType>,
    lazy: bool,
    required: bool,
    value_attr: Option<String>,
    with: Vec<(String, String)>,
    custom_accessor: bool,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target accessor name. Defaults to the source name.
    pub fn as_name(mut self, name: impl Into<String>) -> Self {
        self.as_name = Some(name.into());
        self
    }

    /// Parse the element's content into a nested object of this type.
    pub fn class(mut self, nested: NestedType) -> Self {
        self.class = Some(nested);
        self
    }

    /// Deliver collection elements through the lazy queue. Ignored for
    /// scalars.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn value_attr(mut self, attr: impl Into<String>) -> Self {
        self.value_attr = Some(attr.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with.push((key.into(), value.into()));
        self
    }

    /// The consumer supplies the setter for this field.
    pub fn custom_accessor(mut self) -> Self {
        self.custom_accessor = true;
        self
    }
}

/// Accumulates field descriptors for one type.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl SchemaBuilder {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: Vec::new(),
        }
    }

    /// Declare a scalar element field.
    pub fn element(self, name: &str, options: FieldOptions) -> Self {
        self.declare(name, Source::Element, FieldKind::Scalar, options)
    }

    /// Declare a scalar field read from the object's own element attribute.
    pub fn attribute(self, name: &str, options: FieldOptions) -> Self {
        self.declare(name, Source::Attribute, FieldKind::Scalar, options)
    }

    /// Declare the field holding the object's own text content.
    ///
    /// The target name defaults to `value`.
    pub fn value(self, options: FieldOptions) -> Self {
        let options = FieldOptions {
            as_name: options.as_name.or_else(|| Some("value".to_string())),
            ..options
        };
        self.declare("", Source::Value, FieldKind::Scalar, options)
    }

    /// Declare a collection element field, eager unless `lazy` is set.
    pub fn elements(self, name: &str, options: FieldOptions) -> Self {
        let kind = if options.lazy {
            FieldKind::LazyCollection
        } else {
            FieldKind::EagerCollection
        };
        self.declare(name, Source::Element, kind, options)
    }

    fn declare(mut self, name: &str, source: Source, kind: FieldKind, options: FieldOptions) -> Self {
        let target_name = options.as_name.unwrap_or_else(|| name.to_string());
        let mut descriptor = FieldDescriptor {
            source_name: name.to_string(),
            target_name,
            kind,
            source,
            nested: options.class,
            value_attr: options.value_attr,
            with: options.with,
            required: options.required,
            accessor: if options.custom_accessor {
                Accessor::Custom
            } else {
                Accessor::Synthesized
            },
        };

        match self.fields.iter_mut().find(|f| {
            f.source_name == descriptor.source_name && f.target_name == descriptor.target_name
        }) {
            Some(existing) => {
                if existing.accessor == Accessor::Custom {
                    descriptor.accessor = Accessor::Custom;
                }
                *existing = descriptor;
            }
            None => self.fields.push(descriptor),
        }
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            type_name: self.type_name,
            fields: self.fields,
        }
    }
}

/// Read-only field table for one mapped type.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct Schema {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn builder(type_name: &'static str) -> SchemaBuilder {
        SchemaBuilder::new(type_name)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// First descriptor bound to `source_name`, in declaration order.
    pub fn lookup(&self, source_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.source_name == source_name)
    }

    /// Element descriptors bound to `name`, in declaration order.
    pub fn elements_named<'s, 'n>(
        &'s self,
        name: &'n str,
    ) -> impl Iterator<Item = &'s FieldDescriptor> + use<'s, 'n> {
        self.fields
            .iter()
            .filter(move |f| f.source == Source::Element && f.source_name == name)
    }

    /// Attribute descriptors bound to `name`.
    pub fn attributes_named<'s, 'n>(
        &'s self,
        name: &'n str,
    ) -> impl Iterator<Item = &'s FieldDescriptor> + use<'s, 'n> {
        self.fields
            .iter()
            .filter(move |f| f.source == Source::Attribute && f.source_name == name)
    }

    pub fn value_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.source == Source::Value)
    }

    pub fn lazy_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.is_lazy())
    }

    /// Every declared descriptor.
    pub fn columns(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Descriptor by target name.
    pub fn column(&self, target_name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.target_name == target_name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.target_name()).collect()
    }

    pub fn data_class(&self, target_name: &str) -> Option<&'static str> {
        self.column(target_name).and_then(|f| f.data_class())
    }

    pub fn is_required(&self, target_name: &str) -> bool {
        self.column(target_name).is_some_and(|f| f.required)
    }
}
