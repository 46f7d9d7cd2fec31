//! `LazySeq` as a `futures_core::Stream` for async consumers.
#![cfg(feature = "futures")]

use std::future::poll_fn;
use std::pin::Pin;

use futures_core::Stream;
use saxmap::{Error, Lazy, LazySeq, SaxDocument};

#[derive(Debug, Default, SaxDocument)]
struct Items {
    #[sax(elements = "item", lazy)]
    items: Lazy<u32>,
}

async fn next<T>(seq: &mut LazySeq<T>) -> Option<Result<T, Error>> {
    poll_fn(|cx| Pin::new(&mut *seq).poll_next(cx)).await
}

#[tokio::test]
async fn test_stream_yields_items() {
    let (mut lazy, completion) =
        Items::parse("<items><item>1</item><item>2</item><item>3</item></items>").into_parts();

    let mut values = Vec::new();
    while let Some(item) = next(&mut lazy).await {
        values.push(item.unwrap());
    }

    assert_eq!(values, vec![1, 2, 3]);
    assert!(lazy.is_exhausted());
    assert!(completion.wait().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stream_reports_failure_once() {
    let (mut lazy, completion) = Items::parse("<items><item>1</item><item>x</item></items>").into_parts();

    assert_eq!(next(&mut lazy).await.unwrap().unwrap(), 1);
    assert!(matches!(next(&mut lazy).await, Some(Err(Error::Convert { .. }))));
    assert!(next(&mut lazy).await.is_none());
    assert!(matches!(completion.wait(), Err(Error::Convert { .. })));
}
