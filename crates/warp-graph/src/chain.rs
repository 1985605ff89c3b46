// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Walking writer chains through the object store.
//!
//! Writer chains are linear: every patch commit has at most one parent (the
//! writer's previous head). Walks follow first parents only and check the
//! cancellation token once per hop, since each hop is a store round-trip.

use tokio_util::sync::CancellationToken;
use warp_store::{ObjectId, ObjectStore};

use crate::error::WarpError;

/// Commits from `head` (inclusive) back to `stop` (exclusive), newest first.
///
/// Returns `None` when `stop` is set but never encountered — the caller's
/// base is not an ancestor of this head.
///
/// # Errors
/// Store failures and [`WarpError::Cancelled`].
pub(crate) async fn segment(
    store: &dyn ObjectStore,
    head: ObjectId,
    stop: Option<ObjectId>,
    cancel: &CancellationToken,
) -> Result<Option<Vec<ObjectId>>, WarpError> {
    let mut collected = Vec::new();
    let mut cursor = Some(head);
    while let Some(id) = cursor {
        if cancel.is_cancelled() {
            return Err(WarpError::Cancelled);
        }
        if Some(id) == stop {
            return Ok(Some(collected));
        }
        collected.push(id);
        let info = store.commit_info(id).await?;
        cursor = info.parents.first().copied();
    }
    if stop.is_some() {
        return Ok(None);
    }
    Ok(Some(collected))
}

/// Number of commits reachable from `head` along first parents (inclusive).
pub(crate) async fn length(
    store: &dyn ObjectStore,
    head: ObjectId,
    cancel: &CancellationToken,
) -> Result<u64, WarpError> {
    segment(store, head, None, cancel)
        .await?
        .map_or(Ok(0), |commits| Ok(commits.len() as u64))
}

/// Whether `ancestor` is an ancestor of (or equal to) `head`.
pub(crate) async fn is_ancestor(
    store: &dyn ObjectStore,
    ancestor: ObjectId,
    head: ObjectId,
    cancel: &CancellationToken,
) -> Result<bool, WarpError> {
    Ok(segment(store, head, Some(ancestor), cancel).await?.is_some())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use warp_store::MemoryStore;

    async fn chain(store: &MemoryStore, len: u8) -> Vec<ObjectId> {
        let mut ids = Vec::new();
        let mut parent: Option<ObjectId> = None;
        for i in 0..len {
            let parents: Vec<ObjectId> = parent.into_iter().collect();
            let id = store
                .commit(Bytes::copy_from_slice(&[i]), &parents)
                .await
                .unwrap();
            ids.push(id);
            parent = Some(id);
        }
        ids
    }

    #[tokio::test]
    async fn segment_stops_exclusive() {
        let store = MemoryStore::new();
        let ids = chain(&store, 4).await;
        let cancel = CancellationToken::new();
        let seg = segment(&store, ids[3], Some(ids[1]), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seg, vec![ids[3], ids[2]]);
    }

    #[tokio::test]
    async fn segment_equal_head_and_stop_is_empty() {
        let store = MemoryStore::new();
        let ids = chain(&store, 2).await;
        let cancel = CancellationToken::new();
        let seg = segment(&store, ids[1], Some(ids[1]), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert!(seg.is_empty());
    }

    #[tokio::test]
    async fn segment_detects_non_ancestor() {
        let store = MemoryStore::new();
        let ids = chain(&store, 2).await;
        let other = store.commit(Bytes::from_static(b"x"), &[]).await.unwrap();
        let cancel = CancellationToken::new();
        assert!(segment(&store, ids[1], Some(other), &cancel)
            .await
            .unwrap()
            .is_none());
        assert!(!is_ancestor(&store, other, ids[1], &cancel).await.unwrap());
        assert!(is_ancestor(&store, ids[0], ids[1], &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn length_counts_whole_chain() {
        let store = MemoryStore::new();
        let ids = chain(&store, 5).await;
        let cancel = CancellationToken::new();
        assert_eq!(length(&store, ids[4], &cancel).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn cancelled_walk_fails_fast() {
        let store = MemoryStore::new();
        let ids = chain(&store, 3).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            segment(&store, ids[2], None, &cancel).await,
            Err(WarpError::Cancelled)
        ));
    }
}
