//! Reading feeds entry by entry.

use std::collections::BTreeMap;

use saxmap::SaxDocument;

use crate::{Entry, Feed, FeedError, Timestamp};

/// Aggregate view of a feed, built without holding every entry in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub title: String,
    pub lang: Option<String>,
    pub entry_count: usize,
    pub latest: Option<Timestamp>,
    /// Entry count per category term.
    pub categories: BTreeMap<String, usize>,
    /// Author names in order of first appearance.
    pub authors: Vec<String>,
}

impl FeedSummary {
    fn record(&mut self, entry: Entry) {
        self.entry_count += 1;
        if let Some(stamp) = entry.timestamp() {
            self.latest = self.latest.max(Some(stamp));
        }
        for term in entry.categories {
            *self.categories.entry(term).or_default() += 1;
        }
        for person in entry.authors {
            if !self.authors.contains(&person.name) {
                self.authors.push(person.name);
            }
        }
    }
}

/// Stream every entry of `xml` into a [`FeedSummary`].
pub fn summarize(xml: impl Into<String>) -> Result<FeedSummary, FeedError> {
    let mut parsing = Feed::parse(xml);
    let mut summary = FeedSummary::default();

    for entry in parsing.lazy() {
        summary.record(entry?);
    }

    let feed = parsing.finish()?;
    log::debug!("summarized {} entries of {}", summary.entry_count, feed.id);
    if summary.entry_count == 0 {
        return Err(FeedError::Empty);
    }

    summary.title = feed.title;
    summary.lang = feed.lang;
    if let Some(updated) = feed.updated {
        summary.latest = summary.latest.max(Some(updated));
    }
    Ok(summary)
}

/// The first `limit` entries of `xml`. The rest of the document is not
/// parsed.
pub fn take_entries(xml: impl Into<String>, limit: usize) -> Result<Vec<Entry>, FeedError> {
    let mut parsing = Feed::parse(xml);
    let entries = parsing
        .lazy()
        .take(limit)
        .collect::<Result<Vec<_>, _>>()?;

    parsing.cancel();
    match parsing.finish() {
        Ok(_) | Err(saxmap::Error::Cancelled) => Ok(entries),
        Err(err) => Err(err.into()),
    }
}
