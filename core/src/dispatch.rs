//! Event dispatch: walks tokenizer events and populates mapped objects.
//!
//! The dispatcher keeps one [`Frame`] per open mapped object. The root
//! frame is the caller's object and spans the document element; nested
//! frames are built from a descriptor's [`NestedType`] when a matching
//! element opens and are handed to the parent when it closes.
//!
//! Within a frame:
//! - attributes of the frame's own element populate attribute fields;
//! - direct text of the frame's own element populates the value field;
//! - descendant elements are matched against element fields by name and
//!   `with` filters, and their text (or `value_attr`) is delivered when
//!   they close;
//! - scalar fields are first-wins, collections append every occurrence.
//!
//! Markup that matches nothing is skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::PathBuf;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::config::{DepthGuard, ParseOptions};
use crate::error::Error;
use crate::mapped::{Item, Mapped};
use crate::queue::CancelToken;
use crate::schema::{FieldDescriptor, FieldKind, NestedType, Schema};

/// Document input for a parse.
#[derive(Debug, Clone)]
pub enum Input {
    Text(String),
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::Bytes(bytes)
    }
}

impl From<PathBuf> for Input {
    fn from(path: PathBuf) -> Self {
        Input::File(path)
    }
}

enum Slot<'a> {
    Root(&'a mut dyn Mapped),
    Nested(Box<dyn Mapped>),
}

impl Slot<'_> {
    fn target(&mut self) -> &mut dyn Mapped {
        match self {
            Slot::Root(object) => &mut **object,
            Slot::Nested(object) => object.as_mut(),
        }
    }
}

/// Text being collected for an element field until its element closes.
struct Capture {
    field: &'static FieldDescriptor,
    depth: usize,
    text: String,
}

struct Frame<'a> {
    object: Slot<'a>,
    schema: &'static Schema,
    /// Element depth of the object's own element.
    depth: usize,
    /// Parent descriptor that receives this object when it closes.
    origin: Option<&'static FieldDescriptor>,
    captures: Vec<Capture>,
    value_text: String,
    populated: Vec<&'static str>,
}

impl<'a> Frame<'a> {
    fn root(object: &'a mut dyn Mapped) -> Self {
        let schema = object.mapped_schema();
        Self::new(Slot::Root(object), schema, 1, None)
    }

    fn nested(nested: &NestedType, origin: &'static FieldDescriptor, depth: usize) -> Self {
        Self::new(
            Slot::Nested(nested.construct()),
            nested.schema(),
            depth,
            Some(origin),
        )
    }

    fn new(
        object: Slot<'a>,
        schema: &'static Schema,
        depth: usize,
        origin: Option<&'static FieldDescriptor>,
    ) -> Self {
        Self {
            object,
            schema,
            depth,
            origin,
            captures: Vec::new(),
            value_text: String::new(),
            populated: Vec::new(),
        }
    }

    fn is_populated(&self, field: &FieldDescriptor) -> bool {
        self.populated.contains(&field.target_name())
    }

    fn deliver(&mut self, field: &'static FieldDescriptor, item: Item) -> Result<(), Error> {
        log::trace!(
            "{}.{} <- {:?}",
            self.schema.type_name(),
            field.target_name(),
            item
        );
        match field.kind() {
            FieldKind::Scalar => {
                if self.is_populated(field) {
                    return Ok(());
                }
                self.object.target().set_scalar(field, item)?;
            }
            FieldKind::EagerCollection | FieldKind::LazyCollection => {
                self.object.target().append(field, item)?;
            }
        }
        if !self.is_populated(field) {
            self.populated.push(field.target_name());
        }
        Ok(())
    }

    fn apply_attributes(&mut self, attrs: &[(String, String)]) -> Result<(), Error> {
        let schema = self.schema;
        for (name, value) in attrs {
            for field in schema.attributes_named(name) {
                self.deliver(field, Item::Text(value.clone()))?;
            }
        }
        Ok(())
    }

    /// The object's own element closed: flush its text and check requirements.
    fn close_out(&mut self) -> Result<(), Error> {
        if let Some(field) = self.schema.value_field() {
            if !self.value_text.is_empty() {
                let text = std::mem::take(&mut self.value_text);
                self.deliver(field, Item::Text(text))?;
            }
        }
        for field in self.schema.columns() {
            if field.is_required() && !self.is_populated(field) {
                return Err(Error::MissingRequired {
                    type_name: self.schema.type_name(),
                    field: field.target_name(),
                });
            }
        }
        Ok(())
    }
}

/// Drives a tokenizer over one document and populates one root object.
pub struct Dispatcher<'a> {
    frames: Vec<Frame<'a>>,
    open: Vec<String>,
    guard: DepthGuard,
    options: &'a ParseOptions,
    cancel: &'a CancelToken,
}

impl<'a> Dispatcher<'a> {
    pub fn new(root: &'a mut dyn Mapped, options: &'a ParseOptions, cancel: &'a CancelToken) -> Self {
        Self {
            frames: vec![Frame::root(root)],
            open: Vec::new(),
            guard: DepthGuard::new(),
            options,
            cancel,
        }
    }

    /// Parse `input` to completion.
    pub fn run(mut self, input: Input) -> Result<(), Error> {
        match input {
            Input::Text(text) => self.drive(Reader::from_reader(Cursor::new(text))),
            Input::Bytes(bytes) => self.drive(Reader::from_reader(Cursor::new(bytes))),
            Input::File(path) => {
                let file = File::open(&path)?;
                self.drive(Reader::from_reader(BufReader::new(file)))
            }
        }
    }

    fn drive<R: BufRead>(&mut self, mut reader: Reader<R>) -> Result<(), Error> {
        reader.config_mut().trim_text(self.options.trim_text);
        let mut buf = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => {
                    let (name, attrs) = element_parts(&start)?;
                    self.open(name, attrs)?;
                }
                Event::Empty(start) => {
                    let (name, attrs) = element_parts(&start)?;
                    self.open(name, attrs)?;
                    self.close()?;
                }
                Event::End(_) => self.close()?,
                Event::Text(text) => {
                    let text = text.unescape()?;
                    self.text(&text);
                }
                Event::CData(data) => {
                    let raw = data.into_inner();
                    self.text(&String::from_utf8_lossy(&raw));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        match self.open.last() {
            Some(element) => Err(Error::UnexpectedEof {
                element: element.clone(),
            }),
            None => Ok(()),
        }
    }

    fn top(&mut self) -> &mut Frame<'a> {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn open(&mut self, name: String, attrs: Vec<(String, String)>) -> Result<(), Error> {
        self.open.push(name);
        let depth = self.open.len();
        let name = &self.open[depth - 1];

        let frame = {
            let last = self.frames.len() - 1;
            &mut self.frames[last]
        };
        if depth == 1 {
            return frame.apply_attributes(&attrs);
        }
        if !frame.captures.is_empty() {
            // Markup inside a captured element contributes only its text.
            return Ok(());
        }

        let schema = frame.schema;
        let mut descend = None;
        for field in schema.elements_named(name) {
            if !field.matches(&attrs) {
                continue;
            }
            if field.kind() == FieldKind::Scalar && frame.is_populated(field) {
                continue;
            }
            if let Some(nested) = field.nested() {
                if descend.is_none() {
                    descend = Some((field, nested));
                }
                continue;
            }
            match field.value_attr() {
                Some(attr) => {
                    if let Some((_, value)) = attrs.iter().find(|(key, _)| key == attr) {
                        frame.deliver(field, Item::Text(value.clone()))?;
                    }
                }
                None => frame.captures.push(Capture {
                    field,
                    depth,
                    text: String::new(),
                }),
            }
        }

        if let Some((field, nested)) = descend {
            self.guard.enter(self.options.max_depth)?;
            let mut child = Frame::nested(nested, field, depth);
            child.apply_attributes(&attrs)?;
            self.frames.push(child);
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        let depth = self.open.len();
        if depth == 0 {
            return;
        }
        // Captures left open on outer frames belong to an element that also
        // opened a nested object, and take all of its descendant text.
        for frame in &mut self.frames {
            for capture in &mut frame.captures {
                capture.text.push_str(text);
            }
        }
        let frame = self.top();
        if frame.captures.is_empty() && depth == frame.depth {
            frame.value_text.push_str(text);
        }
    }

    fn close(&mut self) -> Result<(), Error> {
        let depth = self.open.len();
        if depth == 0 {
            return Ok(());
        }

        self.flush_captures(depth)?;
        let frame = self.top();
        if depth == frame.depth {
            frame.close_out()?;
            if self.frames.len() > 1 {
                if let Some(child) = self.frames.pop() {
                    self.guard.exit();
                    if let (Some(origin), Slot::Nested(object)) = (child.origin, child.object) {
                        self.top().deliver(origin, Item::Nested(object))?;
                    }
                    self.flush_captures(depth)?;
                }
            }
        }

        self.open.pop();
        Ok(())
    }

    /// Deliver the top frame's captures if they were opened at `depth`.
    fn flush_captures(&mut self, depth: usize) -> Result<(), Error> {
        let frame = self.top();
        if frame.captures.first().is_some_and(|c| c.depth == depth) {
            for capture in std::mem::take(&mut frame.captures) {
                frame.deliver(capture.field, Item::Text(capture.text))?;
            }
        }
        Ok(())
    }
}

fn element_parts(start: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>), Error> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok((name, attrs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapped::Mapped;
    use crate::schema::FieldOptions;
    use std::any::Any;
    use std::sync::OnceLock;

    #[derive(Debug, Default)]
    struct Entry {
        id: Option<String>,
        title: Option<String>,
        body: Option<String>,
    }

    impl Mapped for Entry {
        fn mapped_schema(&self) -> &'static Schema {
            entry_schema()
        }

        fn set_scalar(&mut self, field: &FieldDescriptor, item: Item) -> Result<(), Error> {
            let text = item.into_text(field)?;
            match field.target_name() {
                "id" => self.id = Some(text),
                "title" => self.title = Some(text),
                "body" => self.body = Some(text),
                other => {
                    return Err(Error::UnknownField {
                        type_name: "Entry",
                        field: other.to_string(),
                    });
                }
            }
            Ok(())
        }

        fn append(&mut self, field: &FieldDescriptor, _item: Item) -> Result<(), Error> {
            Err(Error::UnknownField {
                type_name: "Entry",
                field: field.target_name().to_string(),
            })
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    impl crate::SaxDocument for Entry {
        type Item = ();

        fn schema() -> &'static Schema {
            entry_schema()
        }

        fn lazy_field(&mut self) -> Option<&mut crate::Lazy<()>> {
            None
        }
    }

    fn entry_schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder("Entry")
                .attribute("id", FieldOptions::new())
                .element("title", FieldOptions::new().required())
                .value(FieldOptions::new().as_name("body"))
                .build()
        })
    }

    #[derive(Debug, Default)]
    struct Feed {
        lang: Option<String>,
        title: Option<String>,
        link: Option<String>,
        tags: Vec<String>,
        entries: Vec<Entry>,
    }

    impl Mapped for Feed {
        fn mapped_schema(&self) -> &'static Schema {
            feed_schema()
        }

        fn set_scalar(&mut self, field: &FieldDescriptor, item: Item) -> Result<(), Error> {
            let text = item.into_text(field)?;
            match field.target_name() {
                "lang" => self.lang = Some(text),
                "title" => self.title = Some(text),
                "link" => self.link = Some(text),
                other => {
                    return Err(Error::UnknownField {
                        type_name: "Feed",
                        field: other.to_string(),
                    });
                }
            }
            Ok(())
        }

        fn append(&mut self, field: &FieldDescriptor, item: Item) -> Result<(), Error> {
            match field.target_name() {
                "tags" => self.tags.push(item.into_text(field)?),
                "entries" => self.entries.push(item.into_nested(field)?),
                other => {
                    return Err(Error::UnknownField {
                        type_name: "Feed",
                        field: other.to_string(),
                    });
                }
            }
            Ok(())
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    fn feed_schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder("Feed")
                .attribute("xml:lang", FieldOptions::new().as_name("lang"))
                .element("title", FieldOptions::new())
                .element(
                    "link",
                    FieldOptions::new()
                        .value_attr("href")
                        .with_attr("rel", "alternate"),
                )
                .elements("category", FieldOptions::new().as_name("tags").value_attr("term"))
                .elements(
                    "entry",
                    FieldOptions::new()
                        .as_name("entries")
                        .class(NestedType::of::<Entry>()),
                )
                .build()
        })
    }

    fn dispatch(feed: &mut Feed, xml: &str, options: ParseOptions) -> Result<(), Error> {
        let cancel = CancelToken::new();
        Dispatcher::new(feed, &options, &cancel).run(Input::from(xml))
    }

    const FEED: &str = r#"
        <feed xml:lang="en">
            <title>First</title>
            <link rel="self" href="http://self"/>
            <link rel="alternate" href="http://alt"/>
            <category term="rust"/>
            <category term="xml"/>
            <entry id="1"><title>One</title></entry>
            <entry id="2"><title>Two &amp; more</title></entry>
            <title>Second</title>
        </feed>
    "#;

    #[test]
    fn test_maps_scalars_collections_and_nested() {
        let mut feed = Feed::default();
        dispatch(&mut feed, FEED, ParseOptions::DEFAULT).unwrap();

        assert_eq!(feed.lang.as_deref(), Some("en"));
        assert_eq!(feed.title.as_deref(), Some("First"));
        assert_eq!(feed.link.as_deref(), Some("http://alt"));
        assert_eq!(feed.tags, vec!["rust", "xml"]);
        assert_eq!(feed.entries.len(), 2);
        assert_eq!(feed.entries[0].id.as_deref(), Some("1"));
        assert_eq!(feed.entries[1].title.as_deref(), Some("Two & more"));
    }

    #[test]
    fn test_nested_titles_do_not_leak_to_parent() {
        let mut feed = Feed::default();
        let xml = "<feed><entry><title>Inner</title></entry><title>Outer</title></feed>";
        dispatch(&mut feed, xml, ParseOptions::DEFAULT).unwrap();

        assert_eq!(feed.title.as_deref(), Some("Outer"));
        assert_eq!(feed.entries[0].title.as_deref(), Some("Inner"));
    }

    #[test]
    fn test_value_field_and_cdata() {
        let mut feed = Feed::default();
        let xml = "<feed><entry><title>T</title><![CDATA[a < b]]></entry></feed>";
        dispatch(&mut feed, xml, ParseOptions::DEFAULT).unwrap();

        assert_eq!(feed.entries[0].body.as_deref(), Some("a < b"));
    }

    #[test]
    fn test_missing_required_field() {
        let mut feed = Feed::default();
        let xml = r#"<feed><entry id="3"></entry></feed>"#;
        let err = dispatch(&mut feed, xml, ParseOptions::DEFAULT).unwrap_err();

        assert!(matches!(
            err,
            Error::MissingRequired { type_name: "Entry", field: "title" }
        ));
    }

    #[test]
    fn test_unexpected_eof() {
        let mut feed = Feed::default();
        let err = dispatch(&mut feed, "<feed><title>x</title>", ParseOptions::DEFAULT).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { element } if element == "feed"));
        assert_eq!(feed.title.as_deref(), Some("x"));
    }

    #[test]
    fn test_mismatched_end_tag() {
        let mut feed = Feed::default();
        let err = dispatch(&mut feed, "<feed><title>x</wrong></feed>", ParseOptions::DEFAULT).unwrap_err();
        assert!(matches!(err, Error::Xml(_)));
    }

    #[test]
    fn test_depth_limit() {
        let mut feed = Feed::default();
        let options = ParseOptions::new().with_max_depth(0);
        let err = dispatch(&mut feed, FEED, options).unwrap_err();
        assert!(matches!(err, Error::DepthLimitExceeded { depth: 1, limit: 0 }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut feed = Feed::default();
        let options = ParseOptions::DEFAULT;
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = Dispatcher::new(&mut feed, &options, &cancel)
            .run(Input::from(FEED))
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_missing_file() {
        let mut feed = Feed::default();
        let options = ParseOptions::DEFAULT;
        let cancel = CancelToken::new();

        let err = Dispatcher::new(&mut feed, &options, &cancel)
            .run(Input::File(PathBuf::from("/nonexistent/feed.xml")))
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
