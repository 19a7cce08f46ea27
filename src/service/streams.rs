//! Stream adapters over the published snapshot cell.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::watch;

use crate::engine::SnapshotCell;
use crate::store::StatusSnapshot;

/// Replay the latest snapshot, if any, then yield every newly published one.
///
/// Backed by a `watch` channel: a slow consumer skips straight to the newest
/// snapshot. The stream ends when the engine stops.
pub fn snapshots(rx: watch::Receiver<SnapshotCell>) -> impl Stream<Item = Arc<StatusSnapshot>> {
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(snapshot) = current {
                return Some((snapshot, (rx, false)));
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    })
}

/// Drop items equal to the previously yielded one.
pub fn distinct_until_changed<S, T>(stream: S) -> impl Stream<Item = T>
where
    S: Stream<Item = T>,
    T: Clone + PartialEq,
{
    let mut last: Option<T> = None;
    stream.filter_map(move |item| {
        let emit = last.as_ref() != Some(&item);
        if emit {
            last = Some(item.clone());
        }
        futures::future::ready(emit.then_some(item))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_distinct_until_changed_suppresses_repeats() {
        let input = stream::iter(vec![1, 1, 2, 2, 2, 1, 3, 3]);
        let output: Vec<i32> = distinct_until_changed(input).collect().await;
        assert_eq!(output, vec![1, 2, 1, 3]);
    }

    #[tokio::test]
    async fn test_snapshots_skip_empty_cell_and_replay_latest() {
        let (tx, rx) = watch::channel(None);
        let snapshot = Arc::new(StatusSnapshot {
            run: 3,
            ..StatusSnapshot::default()
        });
        tx.send_replace(Some(Arc::clone(&snapshot)));

        let mut stream = Box::pin(snapshots(rx));
        let first = stream.next().await.unwrap();
        assert_eq!(first.run, 3);

        tx.send_replace(Some(Arc::new(StatusSnapshot {
            run: 4,
            ..StatusSnapshot::default()
        })));
        assert_eq!(stream.next().await.unwrap().run, 4);

        drop(tx);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_snapshots_end_when_sender_dropped_before_first() {
        let (tx, rx) = watch::channel::<SnapshotCell>(None);
        drop(tx);
        let mut stream = Box::pin(snapshots(rx));
        assert!(stream.next().await.is_none());
    }
}
