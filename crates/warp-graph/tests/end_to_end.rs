// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! End-to-end scenarios over the facade and the in-memory store.
//!
//! These are the literal observable-behavior scenarios: single-writer LWW,
//! multi-writer convergence, edge clean-slate, plus the facade read surface.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{open_as, store};
use warp_graph::{PropValue, WarpError};

// ── single-writer LWW ───────────────────────────────────────────────────

#[tokio::test]
async fn later_patch_wins_for_the_same_property() {
    let store = store();
    let graph = open_as(&store, "social", "alice").await;

    graph
        .patch(|p| {
            p.add_node("user:alice")?
                .set_property("user:alice", "weight", 0.5)?;
            Ok(())
        })
        .await
        .unwrap();
    graph
        .patch(|p| {
            p.set_property("user:alice", "weight", 0.8)?;
            Ok(())
        })
        .await
        .unwrap();

    graph.materialize().await.unwrap();
    let props = graph.get_node_props("user:alice").await.unwrap();
    assert_eq!(props.get("weight"), Some(&PropValue::number(0.8)));
}

// ── multi-writer convergence ────────────────────────────────────────────

#[tokio::test]
async fn two_writers_converge_to_the_same_hash() {
    let store = store();
    let alice = open_as(&store, "social", "alice").await;
    let bob = open_as(&store, "social", "bob").await;

    alice
        .patch(|p| {
            p.add_node("project:alpha")?
                .add_node("user:alice")?
                .add_edge("user:alice", "project:alpha", "member")?;
            Ok(())
        })
        .await
        .unwrap();
    bob.patch(|p| {
        p.add_node("project:beta")?
            .add_node("user:bob")?
            .add_edge("user:bob", "project:beta", "member")?;
        Ok(())
    })
    .await
    .unwrap();

    let from_alice = alice.materialize().await.unwrap();
    let from_bob = bob.materialize().await.unwrap();

    assert_eq!(from_alice.nodes().len(), 4);
    assert_eq!(from_alice.edges().len(), 2);
    assert_eq!(from_alice.state_hash(), from_bob.state_hash());

    let writers = alice.discover_writers().await.unwrap();
    let names: Vec<&str> = writers.iter().map(warp_graph::WriterId::as_str).collect();
    assert_eq!(names, vec!["alice", "bob"]);
}

// ── edge clean-slate ────────────────────────────────────────────────────

#[tokio::test]
async fn readded_edge_starts_with_fresh_properties() {
    let store = store();
    let graph = open_as(&store, "social", "w").await;

    graph
        .patch(|p| {
            p.add_node("a")?.add_node("b")?;
            p.add_edge("a", "b", "follows")?
                .set_edge_property("a", "b", "follows", "since", "2025")?;
            Ok(())
        })
        .await
        .unwrap();
    graph
        .patch(|p| {
            p.remove_edge("a", "b", "follows")?;
            Ok(())
        })
        .await
        .unwrap();
    graph
        .patch(|p| {
            p.add_edge("a", "b", "follows")?
                .set_edge_property("a", "b", "follows", "note", "fresh")?;
            Ok(())
        })
        .await
        .unwrap();

    graph.materialize().await.unwrap();
    let props = graph.get_edge_props("a", "b", "follows").await.unwrap();
    assert_eq!(props.len(), 1);
    assert_eq!(props.get("note"), Some(&PropValue::Text("fresh".into())));
    assert!(!props.contains_key("since"));
}

// ── removal semantics through the facade ────────────────────────────────

#[tokio::test]
async fn removed_node_disappears_from_reads() {
    let store = store();
    let graph = open_as(&store, "g", "w").await;

    graph
        .patch(|p| {
            p.add_node("keep")?.add_node("drop")?;
            p.set_property("drop", "k", 1i64)?;
            Ok(())
        })
        .await
        .unwrap();
    graph
        .patch(|p| {
            p.remove_node("drop")?;
            Ok(())
        })
        .await
        .unwrap();

    graph.materialize().await.unwrap();
    assert!(graph.has_node("keep").await.unwrap());
    assert!(!graph.has_node("drop").await.unwrap());
    assert_eq!(graph.get_nodes().await.unwrap(), vec!["keep".to_owned()]);
    assert!(graph.get_node_props("drop").await.unwrap().is_empty());
}

// ── concurrent add beats older remove ───────────────────────────────────

#[tokio::test]
async fn higher_event_add_survives_concurrent_remove() {
    let store = store();
    let w1 = open_as(&store, "g", "w1").await;
    let w2 = open_as(&store, "g", "w2").await;

    w1.patch(|p| {
        p.add_node("n")?;
        Ok(())
    })
    .await
    .unwrap();

    // Both at lamport 2, but w2 > w1 lexicographically: the re-add wins
    // over the remove.
    w2.materialize().await.unwrap();
    w2.patch(|p| {
        p.add_node("n")?;
        Ok(())
    })
    .await
    .unwrap();
    w1.patch(|p| {
        p.remove_node("n")?;
        Ok(())
    })
    .await
    .unwrap();

    w1.materialize().await.unwrap();
    assert!(w1.has_node("n").await.unwrap());
}

// ── query pipeline over the facade ──────────────────────────────────────

#[tokio::test]
async fn query_composes_over_the_materialized_snapshot() {
    let store = store();
    let graph = open_as(&store, "g", "w").await;

    graph
        .patch(|p| {
            p.add_node("user:alice")?
                .add_node("user:bob")?
                .add_node("project:alpha")?;
            p.set_property("user:alice", "role", "admin")?
                .set_property("user:bob", "role", "viewer")?;
            p.add_edge("user:alice", "project:alpha", "member")?;
            Ok(())
        })
        .await
        .unwrap();
    graph.materialize().await.unwrap();

    let result = graph
        .query()
        .await
        .unwrap()
        .match_ids("user:*")
        .where_prop("role", "admin")
        .outgoing("member")
        .run()
        .unwrap();
    let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["project:alpha"]);
}

// ── ceiling reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn ceiling_read_sees_history_and_caches() {
    let store = store();
    let graph = open_as(&store, "g", "w").await;

    graph
        .patch(|p| {
            p.add_node("first")?;
            Ok(())
        })
        .await
        .unwrap();
    graph
        .patch(|p| {
            p.add_node("second")?;
            Ok(())
        })
        .await
        .unwrap();

    // Lamport 1 saw only the first patch.
    let old = graph.materialize_at(1).await.unwrap();
    assert!(old.has_node("first"));
    assert!(!old.has_node("second"));

    // Second call hits the seek cache and agrees bit for bit.
    let again = graph.materialize_at(1).await.unwrap();
    assert_eq!(old.state_hash(), again.state_hash());

    let now = graph.materialize().await.unwrap();
    assert!(now.has_node("second"));
}

// ── builder misuse ──────────────────────────────────────────────────────

#[tokio::test]
async fn committed_builder_refuses_further_use() {
    let store = store();
    let graph = open_as(&store, "g", "w").await;

    let mut builder = graph.create_patch();
    builder.add_node("n").unwrap();
    builder.commit().await.unwrap();
    assert!(matches!(
        builder.add_node("m"),
        Err(WarpError::PatchFinalized)
    ));
    assert!(matches!(
        builder.commit().await,
        Err(WarpError::PatchFinalized)
    ));
}

// ── health surface ──────────────────────────────────────────────────────

#[tokio::test]
async fn chain_length_and_ping() {
    let store = store();
    let graph = open_as(&store, "g", "w").await;
    assert_eq!(graph.writer_chain_length().await.unwrap(), 0);
    for _ in 0..3 {
        graph
            .patch(|p| {
                p.add_node("n")?;
                Ok(())
            })
            .await
            .unwrap();
    }
    assert_eq!(graph.writer_chain_length().await.unwrap(), 3);
    assert!(graph.ping_store().await.unwrap().ok);
}
