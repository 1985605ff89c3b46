// SPDX-License-Identifier: Apache-2.0
// © WarpGraph Developers <https://github.com/warpgraph>
//! Pull-based query builder.
//!
//! A query composes stages — id glob match, property equality filters, edge
//! navigation, projection — and executes them as chained lazy iterators
//! over a snapshot: each stage consumes the previous stage's sequence, no
//! intermediate collections, no index beyond the in-memory state.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::WarpError;
use crate::op::PropValue;
use crate::snapshot::Snapshot;

/// One matched node with its projected properties.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryNode {
    /// Node id.
    pub id: String,
    /// Projected properties (empty unless `select`/`select_all` was used).
    pub props: BTreeMap<String, PropValue>,
}

/// Result of running a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Matched nodes in deterministic pipeline order.
    pub nodes: Vec<QueryNode>,
}

#[derive(Debug, Clone)]
enum Stage {
    MatchIds(String),
    WhereProp(String, PropValue),
    Outgoing(String),
    Incoming(String),
}

#[derive(Debug, Clone)]
enum Projection {
    IdOnly,
    Keys(Vec<String>),
    All,
}

/// Composable query over one snapshot.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    snapshot: Arc<Snapshot>,
    stages: Vec<Stage>,
    projection: Projection,
}

impl QueryBuilder {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        Self {
            snapshot,
            stages: Vec::new(),
            projection: Projection::IdOnly,
        }
    }

    /// Keep nodes whose id matches `pattern` (`*` any run, `?` one char).
    pub fn match_ids(mut self, pattern: impl Into<String>) -> Self {
        self.stages.push(Stage::MatchIds(pattern.into()));
        self
    }

    /// Keep nodes whose property `key` equals `value`. Multiple calls are
    /// conjunctive.
    pub fn where_prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.stages
            .push(Stage::WhereProp(key.into(), value.into()));
        self
    }

    /// Navigate to the targets of outgoing `label` edges.
    pub fn outgoing(mut self, label: impl Into<String>) -> Self {
        self.stages.push(Stage::Outgoing(label.into()));
        self
    }

    /// Navigate to the sources of incoming `label` edges.
    pub fn incoming(mut self, label: impl Into<String>) -> Self {
        self.stages.push(Stage::Incoming(label.into()));
        self
    }

    /// Project the listed property keys into the result.
    pub fn select<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Projection::Keys(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Project every visible property into the result.
    pub fn select_all(mut self) -> Self {
        self.projection = Projection::All;
        self
    }

    /// Execute the pipeline.
    ///
    /// # Errors
    /// [`WarpError::InvalidArgument`] on a malformed glob pattern.
    pub fn run(&self) -> Result<QueryResult, WarpError> {
        for stage in &self.stages {
            if let Stage::MatchIds(pattern) = stage {
                validate_pattern(pattern)?;
            }
        }

        let snapshot = &*self.snapshot;
        let mut ids: Box<dyn Iterator<Item = String> + '_> =
            Box::new(snapshot.state().alive_nodes().map(str::to_owned));
        for stage in &self.stages {
            ids = match stage {
                Stage::MatchIds(pattern) => {
                    let pattern = pattern.clone();
                    Box::new(ids.filter(move |id| glob_match(&pattern, id)))
                }
                Stage::WhereProp(key, value) => {
                    let key = key.clone();
                    let value = value.clone();
                    Box::new(ids.filter(move |id| {
                        snapshot.state().node_prop(id, &key) == Some(&value)
                    }))
                }
                Stage::Outgoing(label) => navigate(snapshot, ids, label.clone(), true),
                Stage::Incoming(label) => navigate(snapshot, ids, label.clone(), false),
            };
        }

        let nodes = ids
            .map(|id| {
                let props = match &self.projection {
                    Projection::IdOnly => BTreeMap::new(),
                    Projection::All => snapshot.node_props(&id),
                    Projection::Keys(keys) => {
                        let all = snapshot.node_props(&id);
                        keys.iter()
                            .filter_map(|k| all.get(k).map(|v| (k.clone(), v.clone())))
                            .collect()
                    }
                };
                QueryNode { id, props }
            })
            .collect();
        Ok(QueryResult { nodes })
    }
}

/// Edge navigation with order-preserving dedup.
fn navigate<'s>(
    snapshot: &'s Snapshot,
    ids: Box<dyn Iterator<Item = String> + 's>,
    label: String,
    outgoing: bool,
) -> Box<dyn Iterator<Item = String> + 's> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    Box::new(ids.flat_map(move |id| {
        let bucket = if outgoing {
            snapshot.out_neighbors(&id)
        } else {
            snapshot.in_neighbors(&id)
        };
        let label = label.clone();
        bucket
            .iter()
            .filter(move |(_, edge_label)| *edge_label == label)
            .map(|(other, _)| other.clone())
            .collect::<Vec<_>>()
    })
    .filter(move |id| seen.insert(id.clone())))
}

fn validate_pattern(pattern: &str) -> Result<(), WarpError> {
    if pattern.is_empty() {
        return Err(WarpError::InvalidArgument("empty match pattern".into()));
    }
    Ok(())
}

/// Iterative glob match: `*` matches any run (including empty), `?` exactly
/// one character. Classic two-pointer with star backtracking.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::EventId;
    use crate::ident::WriterId;
    use crate::op::EdgeKey;
    use crate::state::GraphState;

    #[test]
    fn glob_semantics() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("user:*", "user:alice"));
        assert!(!glob_match("user:*", "project:alpha"));
        assert!(glob_match("user:?lice", "user:alice"));
        assert!(!glob_match("user:?lice", "user:lice"));
        assert!(glob_match("*alpha", "project:alpha"));
        assert!(glob_match("a*b*c", "a-xx-b-yy-c"));
        assert!(!glob_match("a*b*c", "a-xx-c"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    fn ev(lamport: u64, seq: u32) -> EventId {
        EventId::new(lamport, WriterId::parse("w").unwrap(), seq)
    }

    fn snapshot() -> Arc<Snapshot> {
        let mut state = GraphState::new();
        let mut seq = 0;
        for id in ["user:alice", "user:bob", "project:alpha", "project:beta"] {
            state.record_node_add(id, ev(1, seq));
            seq += 1;
        }
        state.record_node_prop("user:alice", "role", ev(2, 0), PropValue::Text("admin".into()));
        state.record_node_prop("user:bob", "role", ev(2, 1), PropValue::Text("viewer".into()));
        state.record_node_prop("user:alice", "age", ev(2, 2), PropValue::Int(42));
        state.record_edge_add(
            &EdgeKey::new("user:alice", "project:alpha", "member"),
            ev(3, 0),
        );
        state.record_edge_add(
            &EdgeKey::new("user:bob", "project:beta", "member"),
            ev(3, 1),
        );
        state.record_edge_add(
            &EdgeKey::new("user:alice", "project:beta", "watcher"),
            ev(3, 2),
        );
        Arc::new(Snapshot::build(state).unwrap())
    }

    #[test]
    fn match_and_where_compose() {
        let result = QueryBuilder::new(snapshot())
            .match_ids("user:*")
            .where_prop("role", "admin")
            .run()
            .unwrap();
        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["user:alice"]);
    }

    #[test]
    fn navigation_follows_labels_only() {
        let result = QueryBuilder::new(snapshot())
            .match_ids("user:*")
            .outgoing("member")
            .run()
            .unwrap();
        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["project:alpha", "project:beta"]);
    }

    #[test]
    fn incoming_navigation_reverses() {
        let result = QueryBuilder::new(snapshot())
            .match_ids("project:beta")
            .incoming("watcher")
            .run()
            .unwrap();
        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["user:alice"]);
    }

    #[test]
    fn select_projects_requested_keys() {
        let result = QueryBuilder::new(snapshot())
            .match_ids("user:alice")
            .select(["role"])
            .run()
            .unwrap();
        let node = &result.nodes[0];
        assert_eq!(node.props.len(), 1);
        assert_eq!(
            node.props.get("role"),
            Some(&PropValue::Text("admin".into()))
        );

        let all = QueryBuilder::new(snapshot())
            .match_ids("user:alice")
            .select_all()
            .run()
            .unwrap();
        assert_eq!(all.nodes[0].props.len(), 2);
    }

    #[test]
    fn empty_pattern_is_invalid() {
        let err = QueryBuilder::new(snapshot()).match_ids("").run().unwrap_err();
        assert!(matches!(err, WarpError::InvalidArgument(_)));
    }

    #[test]
    fn navigation_dedupes_targets() {
        // alice and bob both reach their projects; a second hop from both
        // users through "member" must not duplicate shared targets.
        let result = QueryBuilder::new(snapshot())
            .match_ids("*")
            .outgoing("member")
            .run()
            .unwrap();
        let ids: Vec<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["project:alpha", "project:beta"]);
    }
}
