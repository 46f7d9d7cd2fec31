//! Parse entry points and the background parse thread.
//!
//! Every parse moves the target object onto a dedicated thread, attaches
//! its lazy field (if any) to a fresh handoff queue, and returns a
//! [`Parsing`] handle immediately. The caller pulls lazy elements from the
//! handle while the thread keeps dispatching, then calls
//! [`Parsing::finish`] to get the populated object back.
//!
//! ```ignore
//! let mut parsing = Feed::parse(xml);
//! for entry in parsing.lazy() {
//!     println!("{}", entry?.title);
//! }
//! let feed = parsing.finish()?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crate::config::ParseOptions;
use crate::dispatch::{Dispatcher, Input};
use crate::error::Error;
use crate::lazy::{Lazy, LazySeq};
use crate::mapped::Mapped;
use crate::queue::{CancelToken, Consumer, Producer, bounded};
use crate::schema::Schema;

const PARSE_THREAD_NAME: &str = "saxmap-parse";

/// A type that can be populated from a markup document.
///
/// Usually implemented with `#[derive(SaxDocument)]`.
pub trait SaxDocument: Mapped + Default + Sized {
    /// Element type of the lazy field, `()` when there is none.
    type Item: Send + 'static;

    fn schema() -> &'static Schema;

    /// The field whose elements stream through [`Parsing::lazy`].
    fn lazy_field(&mut self) -> Option<&mut Lazy<Self::Item>>;

    /// Parse `content` into a default-constructed instance.
    fn parse(content: impl Into<String>) -> Parsing<Self> {
        Self::default().parse_into(Input::Text(content.into()), ParseOptions::DEFAULT)
    }

    /// Parse the file at `path` into a default-constructed instance.
    fn parse_file(path: impl Into<PathBuf>) -> Parsing<Self> {
        Self::default().parse_into(Input::File(path.into()), ParseOptions::DEFAULT)
    }

    fn parse_with(input: impl Into<Input>, options: ParseOptions) -> Parsing<Self> {
        Self::default().parse_into(input, options)
    }

    /// Parse into this instance, keeping any fields already set.
    fn parse_into(self, input: impl Into<Input>, options: ParseOptions) -> Parsing<Self> {
        spawn_parse(self, input.into(), options)
    }
}

fn spawn_parse<D: SaxDocument>(document: D, input: Input, options: ParseOptions) -> Parsing<D> {
    let cancel = CancelToken::new();
    let (tx, rx) = bounded::<D::Item>();
    let lazy = LazySeq::new(Consumer::new(rx, cancel.clone(), options.pop_timeout));

    let token = cancel.clone();
    let spawned = thread::Builder::new()
        .name(PARSE_THREAD_NAME.to_string())
        .spawn(move || {
            // The producer owns a runtime, which must be built and dropped here.
            let producer = Producer::new(tx, token.clone(), options.push_timeout)?;
            run(document, input, options, producer, token)
        });

    match spawned {
        Ok(handle) => Parsing {
            lazy,
            completion: Completion {
                worker: Worker::Running(handle),
                cancel,
            },
        },
        Err(err) => Parsing::failed(lazy, cancel, err.into()),
    }
}

fn run<D: SaxDocument>(
    mut document: D,
    input: Input,
    options: ParseOptions,
    producer: Producer<D::Item>,
    cancel: CancelToken,
) -> Result<D, Error> {
    let type_name = D::schema().type_name();
    log::debug!("parsing {type_name} from {}", describe(&input));

    if let Some(lazy) = document.lazy_field() {
        lazy.attach(producer.clone());
    }
    let outcome = Dispatcher::new(&mut document, &options, &cancel).run(input);
    if let Some(lazy) = document.lazy_field() {
        lazy.detach();
    }

    match outcome {
        Ok(()) => {
            // A consumer that already walked away does not fail the parse.
            let _ = producer.end();
            log::debug!("parsed {type_name}");
            Ok(document)
        }
        Err(Error::Cancelled) => {
            log::warn!("parse of {type_name} cancelled");
            Err(Error::Cancelled)
        }
        Err(err) => {
            log::debug!("parse of {type_name} failed: {err}");
            if producer.fail(err.clone()).is_ok() {
                let _ = producer.end();
            }
            Err(err)
        }
    }
}

fn describe(input: &Input) -> String {
    match input {
        Input::Text(text) => format!("{} bytes of text", text.len()),
        Input::Bytes(bytes) => format!("{} bytes", bytes.len()),
        Input::File(path) => path.display().to_string(),
    }
}

enum Worker<D> {
    Running(JoinHandle<Result<D, Error>>),
    Failed(Error),
}

/// The outcome half of a running parse.
///
/// Obtained from [`Parsing::into_parts`] when the lazy sequence has to be
/// moved elsewhere. Keep the sequence alive until [`wait`](Self::wait)
/// returns: dropping it early cancels the parse.
pub struct Completion<D> {
    worker: Worker<D>,
    cancel: CancelToken,
}

impl<D> fmt::Debug for Completion<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<D> Completion<D> {
    /// Block until the parse thread exits and return its result.
    pub fn wait(self) -> Result<D, Error> {
        match self.worker {
            Worker::Running(handle) => handle.join().unwrap_or_else(|_| Err(Error::Panicked)),
            Worker::Failed(err) => Err(err),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        match &self.worker {
            Worker::Running(handle) => handle.is_finished(),
            Worker::Failed(_) => true,
        }
    }
}

/// Handle to a parse running on its own thread.
pub struct Parsing<D: SaxDocument> {
    lazy: LazySeq<D::Item>,
    completion: Completion<D>,
}

impl<D: SaxDocument> fmt::Debug for Parsing<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsing")
            .field("type_name", &D::schema().type_name())
            .field("lazy", &self.lazy)
            .field("completion", &self.completion)
            .finish()
    }
}

impl<D: SaxDocument> Parsing<D> {
    fn failed(lazy: LazySeq<D::Item>, cancel: CancelToken, err: Error) -> Self {
        log::warn!("could not start parse of {}: {err}", D::schema().type_name());
        cancel.cancel();
        Self {
            lazy,
            completion: Completion {
                worker: Worker::Failed(err),
                cancel,
            },
        }
    }

    /// Elements of the lazy field, in document order.
    ///
    /// For a type without a lazy field the sequence is empty, apart from a
    /// parse failure which is yielded once.
    pub fn lazy(&mut self) -> &mut LazySeq<D::Item> {
        &mut self.lazy
    }

    /// Stop the parse. The lazy sequence ends and `finish` returns
    /// [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.completion.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.completion.is_finished()
    }

    pub fn into_parts(self) -> (LazySeq<D::Item>, Completion<D>) {
        (self.lazy, self.completion)
    }

    /// Drain any remaining lazy elements and wait for the parse thread.
    ///
    /// Returns the populated object, or the error that ended the parse even
    /// if it was already yielded by the lazy sequence.
    pub fn finish(self) -> Result<D, Error> {
        let Parsing {
            mut lazy,
            completion,
        } = self;

        let mut discarded = 0usize;
        let mut failure = None;
        for item in lazy.by_ref() {
            match item {
                Ok(_) => discarded += 1,
                Err(err) => failure = Some(err),
            }
        }
        if discarded > 0 {
            log::debug!("discarded {discarded} unread lazy elements");
        }

        match (completion.wait(), failure) {
            // Our own pop timeout closed the queue under the producer.
            (Err(Error::Cancelled), Some(err)) => Err(err),
            (outcome, _) => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapped::Item;
    use crate::schema::{FieldDescriptor, FieldOptions};
    use std::any::Any;
    use std::sync::OnceLock;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Items {
        name: Option<String>,
        items: Lazy<String>,
    }

    impl Mapped for Items {
        fn mapped_schema(&self) -> &'static Schema {
            Self::schema()
        }

        fn set_scalar(&mut self, field: &FieldDescriptor, item: Item) -> Result<(), Error> {
            self.name = Some(item.into_text(field)?);
            Ok(())
        }

        fn append(&mut self, field: &FieldDescriptor, item: Item) -> Result<(), Error> {
            self.items.push(item.into_text(field)?)
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }
    }

    impl SaxDocument for Items {
        type Item = String;

        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::builder("Items")
                    .attribute("name", FieldOptions::new())
                    .elements("item", FieldOptions::new().as_name("items").lazy(true))
                    .build()
            })
        }

        fn lazy_field(&mut self) -> Option<&mut Lazy<String>> {
            Some(&mut self.items)
        }
    }

    #[test]
    fn test_lazy_items_then_finish() {
        let mut parsing = Items::parse(
            r#"<items name="list"><item>item1</item><item>item2</item><item>item3</item></items>"#,
        );

        let values = parsing.lazy().collect_all().unwrap();
        assert_eq!(values, vec!["item1", "item2", "item3"]);

        let items = parsing.finish().unwrap();
        assert_eq!(items.name.as_deref(), Some("list"));
        assert!(!items.items.is_attached());
    }

    #[test]
    fn test_failure_reaches_sequence_and_finish() {
        let mut parsing = Items::parse("<items><item>item1</item><item>item2</wrong></items>");

        assert_eq!(parsing.lazy().next().unwrap().unwrap(), "item1");
        assert!(matches!(parsing.lazy().next(), Some(Err(Error::Xml(_)))));
        assert!(parsing.lazy().next().is_none());
        assert!(matches!(parsing.finish(), Err(Error::Xml(_))));
    }

    #[test]
    fn test_finish_without_reading() {
        let parsing = Items::parse("<items><item>a</item><item>b</item></items>");
        assert!(parsing.finish().is_ok());
    }

    #[test]
    fn test_cancel_ends_sequence() {
        let mut parsing = Items::parse("<items><item>a</item><item>b</item><item>c</item></items>");
        parsing.cancel();

        let rest: Vec<_> = parsing.lazy().by_ref().collect();
        assert!(rest.iter().all(Result::is_ok));
        assert!(rest.len() <= 3);
    }

    #[test]
    fn test_dropping_sequence_cancels_parse() {
        let (lazy, completion) = Items::parse("<items><item>a</item><item>b</item></items>").into_parts();
        drop(lazy);

        assert!(matches!(completion.wait(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_missing_file_reported_by_finish() {
        let options = ParseOptions::new().with_pop_timeout(Some(Duration::from_secs(5)));
        let parsing = Items::parse_with(PathBuf::from("/nonexistent/items.xml"), options);

        assert!(matches!(parsing.finish(), Err(Error::Io(_))));
    }

    #[test]
    fn test_parse_into_keeps_existing_fields() {
        let existing = Items {
            name: Some("preset".into()),
            ..Items::default()
        };
        let items = existing
            .parse_into("<items><item>a</item></items>", ParseOptions::DEFAULT)
            .finish()
            .unwrap();
        assert_eq!(items.name.as_deref(), Some("preset"));
    }
}
