//! Atom document model.
//!
//! Only the parts of RFC 4287 the reader uses are mapped; everything else
//! in a feed is skipped by the parser.

use saxmap::{ConvertError, Lazy, SaxDocument};

use crate::Timestamp;

/// The root `<feed>` element.
#[derive(Debug, Default, SaxDocument)]
pub struct Feed {
    #[sax(attribute = "xml:lang")]
    pub lang: Option<String>,
    #[sax(element, required)]
    pub id: String,
    #[sax(element, required)]
    pub title: String,
    #[sax(element)]
    pub subtitle: Option<String>,
    #[sax(element)]
    pub updated: Option<Timestamp>,
    #[sax(element = "link", value = "href", with(rel = "alternate"))]
    pub link: Option<String>,
    #[sax(element = "link", value = "href", with(rel = "self"))]
    pub self_link: Option<String>,
    #[sax(element = "author", nested)]
    pub author: Option<Person>,
    #[sax(elements = "entry", nested, lazy)]
    pub entries: Lazy<Entry>,
}

/// One `<entry>`.
#[derive(Debug, Default, Clone, SaxDocument)]
pub struct Entry {
    #[sax(element, required)]
    pub id: String,
    #[sax(element, required)]
    pub title: String,
    #[sax(element)]
    pub updated: Option<Timestamp>,
    /// Atom uses RFC 3339, but feeds converted from RSS often carry
    /// `Tue, 02 Jan 2024` here.
    #[sax(element, setter = "Entry::set_published")]
    pub published: Option<Timestamp>,
    #[sax(element = "link", value = "href", with(rel = "alternate"))]
    pub link: Option<String>,
    #[sax(elements = "author", nested)]
    pub authors: Vec<Person>,
    #[sax(elements = "category", value = "term")]
    pub categories: Vec<String>,
    #[sax(element)]
    pub summary: Option<String>,
    #[sax(element, nested)]
    pub content: Option<Content>,
}

impl Entry {
    fn set_published(&mut self, text: String) -> Result<(), ConvertError> {
        let stamp = Timestamp::parse_rfc3339(&text).or_else(|_| Timestamp::parse_day_month_year(&text))?;
        self.published = Some(stamp);
        Ok(())
    }

    /// `updated`, falling back to `published`.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.updated.or(self.published)
    }
}

/// `<author>` and `<contributor>` constructs.
#[derive(Debug, Default, Clone, PartialEq, Eq, SaxDocument)]
pub struct Person {
    #[sax(element, required)]
    pub name: String,
    #[sax(element)]
    pub email: Option<String>,
    #[sax(element)]
    pub uri: Option<String>,
}

/// `<content type="...">body</content>`.
#[derive(Debug, Default, Clone, PartialEq, Eq, SaxDocument)]
pub struct Content {
    #[sax(attribute = "type")]
    pub kind: Option<String>,
    #[sax(value)]
    pub body: String,
}
