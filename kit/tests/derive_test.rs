//! End-to-end tests for `#[derive(SaxDocument)]` documents.

use saxmap::{Accessor, ConvertError, Error, FieldKind, Lazy, SaxDocument, Source};

#[derive(Debug, Default, SaxDocument)]
struct Items {
    #[sax(attribute)]
    name: Option<String>,
    #[sax(elements = "item", lazy)]
    items: Lazy<String>,
}

#[derive(Debug, Default, PartialEq, SaxDocument)]
struct Author {
    #[sax(element)]
    name: String,
    #[sax(element)]
    email: Option<String>,
}

#[derive(Debug, Default, SaxDocument)]
struct Entry {
    #[sax(attribute)]
    id: u32,
    #[sax(element, required)]
    title: String,
    #[sax(element, nested)]
    author: Option<Author>,
    #[sax(elements = "category", value = "term")]
    categories: Vec<String>,
    #[sax(element = "link", value = "href", with(rel = "alternate"))]
    link: Option<String>,
    #[sax(element, setter = "Entry::set_updated")]
    updated: Option<(u32, u32, u32)>,
}

impl Entry {
    fn set_updated(&mut self, text: String) -> Result<(), ConvertError> {
        let parts: Vec<u32> = text
            .split('-')
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| ConvertError::new(text.as_str(), e))?;
        match parts.as_slice() {
            [y, m, d] => {
                self.updated = Some((*y, *m, *d));
                Ok(())
            }
            _ => Err(ConvertError::new(text, "expected YYYY-MM-DD")),
        }
    }
}

#[derive(Debug, Default, SaxDocument)]
struct Feed {
    #[sax(attribute)]
    version: Option<String>,
    #[sax(element)]
    title: String,
    #[sax(elements = "tag")]
    tags: Vec<String>,
    #[sax(elements = "entry", nested, lazy)]
    entries: Lazy<Entry>,
}

#[derive(Debug, Default, SaxDocument)]
struct Note {
    #[sax(attribute = "xml:lang")]
    lang: Option<String>,
    #[sax(value)]
    text: String,
}

#[derive(Debug, Default, SaxDocument)]
struct Shelf {
    #[sax(elements = "note", nested)]
    notes: Vec<Note>,
    #[sax(element = "count")]
    count: Option<u64>,
    #[sax(element = "flag")]
    flag: bool,
}

const FEED: &str = r#"
<feed version="1.0">
    <title>Example feed</title>
    <tag>rust</tag>
    <entry id="1">
        <title>First</title>
        <author><name>Ada</name><email>ada@example.com</email></author>
        <category term="xml"/>
        <category term="parsing"/>
        <link rel="self" href="http://example.com/1.xml"/>
        <link rel="alternate" href="http://example.com/1"/>
        <updated>2024-01-02</updated>
    </entry>
    <entry id="2">
        <title>Second</title>
    </entry>
    <tag>sax</tag>
</feed>
"#;

#[test]
fn test_lazy_items_in_order() {
    let mut parsing = Items::parse("<items><item>item1</item><item>item2</item><item>item3</item></items>");
    let items = parsing.lazy().collect_all().unwrap();
    assert_eq!(items, vec!["item1", "item2", "item3"]);
    assert!(parsing.lazy().next().is_none());
    parsing.finish().unwrap();
}

#[test]
fn test_malformed_input_yields_values_then_error() {
    let mut parsing = Items::parse("<items><item>item1</item><item>item2</wrong>");

    assert_eq!(parsing.lazy().next().unwrap().unwrap(), "item1");
    assert!(matches!(parsing.lazy().next(), Some(Err(Error::Xml(_)))));
    assert!(parsing.lazy().next().is_none());
    assert!(matches!(parsing.finish(), Err(Error::Xml(_))));
}

#[test]
fn test_unclosed_document() {
    let mut parsing = Items::parse("<items><item>item1</item>");

    assert_eq!(parsing.lazy().next().unwrap().unwrap(), "item1");
    assert!(matches!(
        parsing.lazy().next(),
        Some(Err(Error::UnexpectedEof { element })) if element == "items"
    ));
    assert!(matches!(parsing.finish(), Err(Error::UnexpectedEof { .. })));
}

#[test]
fn test_empty_lazy_collection() {
    let mut parsing = Items::parse(r#"<items name="empty"/>"#);
    assert!(parsing.lazy().next().is_none());

    let items = parsing.finish().unwrap();
    assert_eq!(items.name.as_deref(), Some("empty"));
}

#[test]
fn test_nested_feed() {
    let mut parsing = Feed::parse(FEED);
    let entries = parsing.lazy().collect_all().unwrap();
    let feed = parsing.finish().unwrap();

    assert_eq!(feed.version.as_deref(), Some("1.0"));
    assert_eq!(feed.title, "Example feed");
    assert_eq!(feed.tags, vec!["rust", "sax"]);

    assert_eq!(entries.len(), 2);
    let first = &entries[0];
    assert_eq!(first.id, 1);
    assert_eq!(first.title, "First");
    assert_eq!(
        first.author,
        Some(Author {
            name: "Ada".into(),
            email: Some("ada@example.com".into()),
        })
    );
    assert_eq!(first.categories, vec!["xml", "parsing"]);
    assert_eq!(first.link.as_deref(), Some("http://example.com/1"));
    assert_eq!(first.updated, Some((2024, 1, 2)));

    let second = &entries[1];
    assert_eq!(second.id, 2);
    assert!(second.author.is_none());
    assert!(second.categories.is_empty());
}

#[test]
fn test_missing_required_after_earlier_entries() {
    let xml = r#"<feed><entry id="1"><title>ok</title></entry><entry id="2"/></feed>"#;
    let mut parsing = Feed::parse(xml);

    assert_eq!(parsing.lazy().next().unwrap().unwrap().title, "ok");
    assert!(matches!(
        parsing.lazy().next(),
        Some(Err(Error::MissingRequired { type_name: "Entry", field: "title" }))
    ));
    assert!(parsing.lazy().next().is_none());
    assert!(parsing.finish().is_err());
}

#[test]
fn test_conversion_failure_names_field() {
    let xml = r#"<feed><entry id="abc"><title>x</title></entry></feed>"#;
    let mut parsing = Feed::parse(xml);

    match parsing.lazy().next() {
        Some(Err(Error::Convert { field, value, .. })) => {
            assert_eq!(field, "id");
            assert_eq!(value, "abc");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(parsing.finish(), Err(Error::Convert { .. })));
}

#[test]
fn test_custom_setter_failure() {
    let xml = r#"<feed><entry id="1"><title>x</title><updated>yesterday</updated></entry></feed>"#;
    let mut parsing = Feed::parse(xml);

    assert!(matches!(
        parsing.lazy().next(),
        Some(Err(Error::Convert { field, .. })) if field == "updated"
    ));
}

#[test]
fn test_error_without_lazy_field_reaches_finish() {
    let parsing = Shelf::parse("<shelf><count>many</count></shelf>");
    assert!(matches!(parsing.finish(), Err(Error::Convert { field, .. }) if field == "count"));
}

#[test]
fn test_value_fields_and_scalars() {
    let xml = r#"
        <shelf>
            <note xml:lang="en">hello</note>
            <note><![CDATA[<raw> & text]]></note>
            <count>3</count>
            <count>4</count>
            <flag>true</flag>
            <unknown><skipped>ignored</skipped></unknown>
        </shelf>
    "#;
    let shelf = Shelf::parse(xml).finish().unwrap();

    assert_eq!(shelf.count, Some(3));
    assert!(shelf.flag);
    assert_eq!(shelf.notes.len(), 2);
    assert_eq!(shelf.notes[0].lang.as_deref(), Some("en"));
    assert_eq!(shelf.notes[0].text, "hello");
    assert_eq!(shelf.notes[1].text, "<raw> & text");
}

#[test]
fn test_parse_into_existing_instance() {
    let shelf = Shelf {
        flag: true,
        ..Shelf::default()
    };
    let shelf = shelf
        .parse_into("<shelf><count>9</count></shelf>", saxmap::ParseOptions::DEFAULT)
        .finish()
        .unwrap();

    assert!(shelf.flag);
    assert_eq!(shelf.count, Some(9));
}

#[test]
fn test_parse_missing_file() {
    let parsing = Feed::parse_file("/nonexistent/feed.xml");
    assert!(matches!(parsing.finish(), Err(Error::Io(_))));
}

#[test]
fn test_parse_file() {
    let path = std::env::temp_dir().join(format!("saxmap-feed-{}.xml", std::process::id()));
    std::fs::write(&path, FEED).unwrap();

    let mut parsing = Feed::parse_file(&path);
    let titles: Vec<String> = parsing.lazy().map(|e| e.unwrap().title).collect();
    let feed = parsing.finish().unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(titles, vec!["First", "Second"]);
    assert_eq!(feed.title, "Example feed");
}

#[test]
fn test_schema_introspection() {
    let schema = Entry::schema();

    assert_eq!(schema.type_name(), "Entry");
    assert_eq!(
        schema.column_names(),
        vec!["id", "title", "author", "categories", "link", "updated"]
    );
    assert!(schema.is_required("title"));
    assert!(!schema.is_required("id"));
    assert_eq!(schema.data_class("author"), Some("Author"));
    assert_eq!(schema.data_class("title"), None);

    let id = schema.column("id").unwrap();
    assert_eq!(id.source(), Source::Attribute);

    let categories = schema.column("categories").unwrap();
    assert_eq!(categories.kind(), FieldKind::EagerCollection);
    assert_eq!(categories.source_name(), "category");
    assert_eq!(categories.value_attr(), Some("term"));

    let link = schema.column("link").unwrap();
    assert_eq!(
        link.with_filters(),
        &[("rel".to_string(), "alternate".to_string())]
    );

    assert_eq!(schema.column("updated").unwrap().accessor(), Accessor::Custom);
    assert_eq!(schema.column("title").unwrap().accessor(), Accessor::Synthesized);

    let feed = Feed::schema();
    let lazy = feed.lazy_field().unwrap();
    assert_eq!(lazy.target_name(), "entries");
    assert_eq!(lazy.kind(), FieldKind::LazyCollection);
    assert_eq!(lazy.data_class(), Some("Entry"));
    assert!(Shelf::schema().lazy_field().is_none());
}

#[derive(Debug, Default, SaxDocument)]
struct Child {
    #[sax(element)]
    name: String,
}

#[derive(Debug, Default, SaxDocument)]
struct Parent {
    #[sax(element = "child")]
    raw: Option<String>,
    #[sax(elements = "child", nested)]
    children: Vec<Child>,
    #[sax(element)]
    title: Option<String>,
}

#[test]
fn test_text_and_nested_fields_share_element() {
    let xml = "<p><child><name>n</name></child><title>T</title><child><name>m</name></child></p>";
    let parent = Parent::parse(xml).finish().unwrap();

    assert_eq!(parent.raw.as_deref(), Some("n"));
    assert_eq!(parent.title.as_deref(), Some("T"));
    let names: Vec<&str> = parent.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["n", "m"]);
}
