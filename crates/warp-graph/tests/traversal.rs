// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Traversal over materialized snapshots, end to end.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{open_as, store};
use warp_graph::{Direction, WarpError};

#[tokio::test]
async fn traversals_run_over_the_materialized_graph() {
    let store = store();
    let graph = open_as(&store, "deps", "w").await;

    // build → test → package, build → lint
    graph
        .patch(|p| {
            for n in ["build", "test", "package", "lint"] {
                p.add_node(n)?;
            }
            p.add_edge("build", "test", "then")?
                .add_edge("test", "package", "then")?
                .add_edge("build", "lint", "then")?;
            Ok(())
        })
        .await
        .unwrap();
    let snap = graph.materialize().await.unwrap();

    let bfs: Vec<(String, usize)> = snap.bfs("build", Direction::Outgoing).unwrap().collect();
    assert_eq!(
        bfs,
        vec![
            ("build".to_owned(), 0),
            ("lint".to_owned(), 1),
            ("test".to_owned(), 1),
            ("package".to_owned(), 2),
        ]
    );

    let topo = snap.topological_sort("build").unwrap();
    assert_eq!(topo, vec!["build", "lint", "test", "package"]);

    let path = snap.shortest_path("build", "package").unwrap();
    assert_eq!(path.path, vec!["build", "test", "package"]);
    assert_eq!(path.length, 2);

    let ancestors: Vec<String> = snap
        .ancestors("package")
        .unwrap()
        .into_iter()
        .map(|(n, _)| n)
        .collect();
    assert_eq!(ancestors, vec!["test", "build"]);
}

#[tokio::test]
async fn removed_edges_change_reachability() {
    let store = store();
    let graph = open_as(&store, "deps", "w").await;
    graph
        .patch(|p| {
            p.add_node("a")?.add_node("b")?.add_edge("a", "b", "e")?;
            Ok(())
        })
        .await
        .unwrap();
    assert!(graph
        .materialize()
        .await
        .unwrap()
        .shortest_path("a", "b")
        .is_ok());

    graph
        .patch(|p| {
            p.remove_edge("a", "b", "e")?;
            Ok(())
        })
        .await
        .unwrap();
    let snap = graph.materialize().await.unwrap();
    assert!(matches!(
        snap.shortest_path("a", "b"),
        Err(WarpError::NoPath)
    ));
}

#[tokio::test]
async fn cycle_created_by_a_second_writer_is_detected() {
    let store = store();
    let alice = open_as(&store, "deps", "alice").await;
    let bob = open_as(&store, "deps", "bob").await;

    alice
        .patch(|p| {
            p.add_node("x")?.add_node("y")?.add_edge("x", "y", "e")?;
            Ok(())
        })
        .await
        .unwrap();
    bob.patch(|p| {
        p.add_node("y")?.add_node("x")?.add_edge("y", "x", "e")?;
        Ok(())
    })
    .await
    .unwrap();

    let snap = alice.materialize().await.unwrap();
    assert!(matches!(
        snap.topological_sort("x"),
        Err(WarpError::HasCycle)
    ));
}
