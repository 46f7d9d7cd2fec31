#![no_main]

use libfuzzer_sys::fuzz_target;
use saxmap::{Input, Lazy, ParseOptions, SaxDocument};

#[derive(Debug, Default, SaxDocument)]
struct Node {
    #[sax(attribute)]
    id: Option<String>,
    #[sax(element)]
    name: Option<String>,
    #[sax(element = "count")]
    count: Option<i64>,
    #[sax(elements = "tag", value = "term")]
    tags: Vec<String>,
    #[sax(elements = "node", nested)]
    children: Vec<Node>,
    #[sax(value)]
    text: String,
}

#[derive(Debug, Default, SaxDocument)]
struct Root {
    #[sax(element = "title", with(kind = "main"))]
    title: Option<String>,
    #[sax(elements = "node", nested, lazy)]
    nodes: Lazy<Node>,
}

fuzz_target!(|input: (Vec<u8>, ParseOptions)| {
    let (data, options) = input;
    // Timeouts would make the outcome depend on scheduling.
    let options = options
        .with_max_depth(options.max_depth.min(64))
        .with_push_timeout(None)
        .with_pop_timeout(None);
    let mut parsing = Root::parse_with(Input::Bytes(data), options);

    let mut failures = 0;
    for item in parsing.lazy() {
        if item.is_err() {
            failures += 1;
        }
    }
    // A failure is reported once and ends the sequence.
    assert!(failures <= 1);
    assert!(parsing.lazy().next().is_none());

    let finished = parsing.finish();
    assert_eq!(failures == 1, finished.is_err());
});
