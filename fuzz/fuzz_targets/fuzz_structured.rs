#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use saxmap::{Lazy, SaxDocument};

#[derive(Debug, Arbitrary)]
enum Child {
    Item(String),
    Other { name: u8, text: String },
    Nested(Vec<Child>),
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render(children: &[Child], out: &mut String) {
    for child in children {
        match child {
            Child::Item(text) => {
                out.push_str("<item>");
                out.push_str(&escape(text));
                out.push_str("</item>");
            }
            Child::Other { name, text } => {
                let tag = format!("other{}", name % 8);
                out.push_str(&format!("<{tag}>{}</{tag}>", escape(text)));
            }
            Child::Nested(inner) => {
                out.push_str("<group>");
                render(inner, out);
                out.push_str("</group>");
            }
        }
    }
}

fn count_items(children: &[Child]) -> usize {
    children
        .iter()
        .map(|child| match child {
            Child::Item(_) => 1,
            Child::Other { .. } => 0,
            Child::Nested(inner) => count_items(inner),
        })
        .sum()
}

#[derive(Debug, Default, SaxDocument)]
struct Items {
    #[sax(elements = "item", lazy)]
    items: Lazy<String>,
}

fuzz_target!(|children: Vec<Child>| {
    let mut xml = String::from("<items>");
    render(&children, &mut xml);
    xml.push_str("</items>");

    // Well-formed input: every <item>, at any depth, is yielded once in order.
    let mut parsing = Items::parse(xml);
    let yielded = parsing.lazy().collect_all();
    if let Ok(items) = yielded {
        assert_eq!(items.len(), count_items(&children));
        assert!(parsing.finish().is_ok());
    }
});
