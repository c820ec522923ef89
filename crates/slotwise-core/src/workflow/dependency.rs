//! Dependency resolution over work item graphs.
//!
//! The graph stores an edge `a -> b` when `a` depends on `b` (b must finish
//! before a starts). References are resolved once, at build time, through an
//! id-or-name lookup table: canonical ids win, names are accepted as a legacy
//! fallback within the same scope, and anything else is dropped and reported
//! as a [`DependencyIssue`]. Edges that would close a loop are refused the same
//! way, so a built graph is always acyclic.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

/// Borrowed view of one node handed to [`DependencyGraph::build`].
#[derive(Debug, Clone, Copy)]
pub struct GraphNode<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub dependencies: &'a [String],
}

impl<'a> GraphNode<'a> {
    pub fn new(id: &'a str, name: &'a str, dependencies: &'a [String]) -> Self {
        Self {
            id,
            name,
            dependencies,
        }
    }
}

/// Problem found while resolving references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum DependencyIssue {
    /// A second node reused an id; it was left out of the graph
    DuplicateId { item_id: String },
    /// A reference matched a step name and was translated to its id
    ResolvedByName {
        item_id: String,
        reference: String,
        resolved_id: String,
    },
    /// A reference matched nothing and was dropped
    Unresolved { item_id: String, reference: String },
    /// A node listed itself as a dependency
    SelfReference { item_id: String },
    /// The edge would have closed a cycle and was dropped
    CycleBroken {
        item_id: String,
        dependency_id: String,
    },
}

impl DependencyIssue {
    /// Name translation is routine for legacy data; everything else warrants
    /// a data-integrity warning.
    pub fn is_warning(&self) -> bool {
        !matches!(self, DependencyIssue::ResolvedByName { .. })
    }

    pub fn item_id(&self) -> &str {
        match self {
            DependencyIssue::DuplicateId { item_id }
            | DependencyIssue::ResolvedByName { item_id, .. }
            | DependencyIssue::Unresolved { item_id, .. }
            | DependencyIssue::SelfReference { item_id }
            | DependencyIssue::CycleBroken { item_id, .. } => item_id,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DependencyIssue::DuplicateId { item_id } => {
                format!("duplicate id '{item_id}' ignored")
            }
            DependencyIssue::ResolvedByName {
                item_id,
                reference,
                resolved_id,
            } => format!("'{item_id}' references '{reference}' by name; resolved to '{resolved_id}'"),
            DependencyIssue::Unresolved { item_id, reference } => {
                format!("'{item_id}' depends on unknown '{reference}'; dependency dropped")
            }
            DependencyIssue::SelfReference { item_id } => {
                format!("'{item_id}' lists itself as a dependency; dependency dropped")
            }
            DependencyIssue::CycleBroken {
                item_id,
                dependency_id,
            } => format!(
                "dependency '{item_id}' -> '{dependency_id}' would create a cycle; dependency dropped"
            ),
        }
    }
}

/// Resolved, acyclic dependency graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// node -> nodes it depends on
    deps: Vec<Vec<usize>>,
    /// node -> nodes that depend on it
    dependents: Vec<Vec<usize>>,
    issues: Vec<DependencyIssue>,
}

impl DependencyGraph {
    /// Build a graph where every node shares one name scope.
    pub fn build<'a>(nodes: impl IntoIterator<Item = GraphNode<'a>>) -> Self {
        Self::build_scoped(std::iter::once(nodes))
    }

    /// Build a graph from several name scopes.
    ///
    /// Ids resolve across all scopes; names resolve only inside the scope of
    /// the referencing node, since step names repeat freely between workflows.
    pub fn build_scoped<'a, S>(scopes: impl IntoIterator<Item = S>) -> Self
    where
        S: IntoIterator<Item = GraphNode<'a>>,
    {
        let scopes: Vec<Vec<GraphNode<'a>>> =
            scopes.into_iter().map(|s| s.into_iter().collect()).collect();

        let mut graph = DependencyGraph::default();
        let mut registered: Vec<Vec<Option<usize>>> = Vec::with_capacity(scopes.len());

        for scope in &scopes {
            let mut slots = Vec::with_capacity(scope.len());
            for node in scope {
                if graph.index.contains_key(node.id) {
                    graph.issues.push(DependencyIssue::DuplicateId {
                        item_id: node.id.to_string(),
                    });
                    slots.push(None);
                    continue;
                }
                let idx = graph.ids.len();
                graph.ids.push(node.id.to_string());
                graph.index.insert(node.id.to_string(), idx);
                graph.deps.push(Vec::new());
                graph.dependents.push(Vec::new());
                slots.push(Some(idx));
            }
            registered.push(slots);
        }

        for (scope, slots) in scopes.iter().zip(&registered) {
            let mut names: HashMap<&str, usize> = HashMap::new();
            for (node, slot) in scope.iter().zip(slots) {
                if let Some(idx) = slot {
                    names.entry(node.name).or_insert(*idx);
                }
            }

            for (node, slot) in scope.iter().zip(slots) {
                let Some(source) = *slot else { continue };
                for reference in node.dependencies {
                    let target = match graph.index.get(reference.as_str()) {
                        Some(&idx) => idx,
                        None => match names.get(reference.as_str()) {
                            Some(&idx) => {
                                graph.issues.push(DependencyIssue::ResolvedByName {
                                    item_id: node.id.to_string(),
                                    reference: reference.clone(),
                                    resolved_id: graph.ids[idx].clone(),
                                });
                                idx
                            }
                            None => {
                                graph.issues.push(DependencyIssue::Unresolved {
                                    item_id: node.id.to_string(),
                                    reference: reference.clone(),
                                });
                                continue;
                            }
                        },
                    };

                    if target == source {
                        graph.issues.push(DependencyIssue::SelfReference {
                            item_id: node.id.to_string(),
                        });
                        continue;
                    }
                    if graph.deps[source].contains(&target) {
                        continue;
                    }
                    if graph.reaches(target, source) {
                        graph.issues.push(DependencyIssue::CycleBroken {
                            item_id: node.id.to_string(),
                            dependency_id: graph.ids[target].clone(),
                        });
                        continue;
                    }
                    graph.deps[source].push(target);
                    graph.dependents[target].push(source);
                }
            }
        }

        for issue in graph.issues.iter().filter(|i| i.is_warning()) {
            tracing::warn!(item = issue.item_id(), "{}", issue.describe());
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Issues collected while resolving references.
    pub fn issues(&self) -> &[DependencyIssue] {
        &self.issues
    }

    /// Would adding `source -> target` (source depends on target) create a
    /// cycle?
    ///
    /// True when target already reaches source through existing edges, or
    /// when both ends are the same node. Unknown ids cannot close a loop.
    pub fn would_create_cycle(&self, source_id: &str, target_id: &str) -> bool {
        if source_id == target_id {
            return true;
        }
        match (self.index.get(source_id), self.index.get(target_id)) {
            (Some(&source), Some(&target)) => self.reaches(target, source),
            _ => false,
        }
    }

    /// Depth-first search along dependency edges from `from` looking for `to`.
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            stack.extend(self.deps[node].iter().copied());
        }
        false
    }

    /// Resolved ids this node depends on, in declaration order.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.deps)
    }

    /// Ids of nodes that directly depend on `id`.
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.neighbours(id, &self.dependents)
    }

    /// Every node `id` waits on, directly or transitively, in input order.
    pub fn transitive_dependencies(&self, id: &str) -> Vec<&str> {
        self.closure(id, &self.deps)
    }

    /// Every node waiting on `id`, directly or transitively, in input order.
    pub fn transitive_dependents(&self, id: &str) -> Vec<&str> {
        self.closure(id, &self.dependents)
    }

    fn neighbours<'g>(&'g self, id: &str, edges: &'g [Vec<usize>]) -> Vec<&'g str> {
        self.index
            .get(id)
            .map(|&idx| edges[idx].iter().map(|&n| self.ids[n].as_str()).collect())
            .unwrap_or_default()
    }

    fn closure<'g>(&'g self, id: &str, edges: &'g [Vec<usize>]) -> Vec<&'g str> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };
        let mut found = BTreeSet::new();
        let mut queue: VecDeque<usize> = edges[start].iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            if found.insert(node) {
                queue.extend(edges[node].iter().copied());
            }
        }
        found.into_iter().map(|n| self.ids[n].as_str()).collect()
    }

    /// Longest dependency chain ending at each node.
    ///
    /// Nodes without dependencies sit at level 0. Memoized depth-first; a
    /// node re-entered while still being visited counts as having no further
    /// incoming edges, so malformed input cannot recurse forever.
    pub fn levels(&self) -> BTreeMap<String, usize> {
        let mut memo: Vec<Option<usize>> = vec![None; self.ids.len()];
        let mut visiting = vec![false; self.ids.len()];
        for idx in 0..self.ids.len() {
            self.level_of(idx, &mut memo, &mut visiting);
        }
        self.ids
            .iter()
            .cloned()
            .zip(memo.into_iter().map(|l| l.unwrap_or(0)))
            .collect()
    }

    fn level_of(&self, idx: usize, memo: &mut [Option<usize>], visiting: &mut [bool]) -> usize {
        if let Some(level) = memo[idx] {
            return level;
        }
        if visiting[idx] {
            tracing::warn!(item = %self.ids[idx], "cycle encountered during level assignment");
            return 0;
        }
        visiting[idx] = true;
        let level = self.deps[idx]
            .iter()
            .map(|&dep| self.level_of(dep, memo, visiting) + 1)
            .max()
            .unwrap_or(0);
        visiting[idx] = false;
        memo[idx] = Some(level);
        level
    }

    /// Dependencies-first ordering; ties keep input order.
    pub fn topological_order(&self) -> Vec<&str> {
        let mut remaining: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, &n)| n == 0)
            .map(|(idx, _)| idx)
            .collect();
        let mut order = Vec::with_capacity(self.ids.len());

        while let Some(node) = ready.pop_first() {
            order.push(self.ids[node].as_str());
            for &dependent in &self.dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    struct Fixture {
        rows: Vec<(String, String, Vec<String>)>,
    }

    impl Fixture {
        fn new(rows: &[(&str, &str, &[&str])]) -> Self {
            Self {
                rows: rows
                    .iter()
                    .map(|(id, name, d)| (id.to_string(), name.to_string(), deps(d)))
                    .collect(),
            }
        }

        fn graph(&self) -> DependencyGraph {
            DependencyGraph::build(
                self.rows
                    .iter()
                    .map(|(id, name, d)| GraphNode::new(id, name, d)),
            )
        }
    }

    #[test]
    fn levels_follow_longest_chain() {
        let fx = Fixture::new(&[
            ("a", "A", &[]),
            ("b", "B", &["a"]),
            ("c", "C", &["a"]),
            ("d", "D", &["b", "c"]),
            ("e", "E", &["a", "d"]),
        ]);
        let levels = fx.graph().levels();
        assert_eq!(levels["a"], 0);
        assert_eq!(levels["b"], 1);
        assert_eq!(levels["d"], 2);
        assert_eq!(levels["e"], 3);
    }

    #[test]
    fn would_create_cycle_detects_back_edges() {
        let fx = Fixture::new(&[("a", "A", &[]), ("b", "B", &["a"]), ("c", "C", &["b"])]);
        let graph = fx.graph();
        assert!(graph.would_create_cycle("a", "c"));
        assert!(graph.would_create_cycle("a", "a"));
        assert!(!graph.would_create_cycle("c", "a"));
        assert!(!graph.would_create_cycle("a", "unknown"));
    }

    #[test]
    fn cyclic_input_is_broken_and_reported() {
        let fx = Fixture::new(&[("a", "A", &["c"]), ("b", "B", &["a"]), ("c", "C", &["b"])]);
        let graph = fx.graph();
        assert_eq!(
            graph.issues(),
            &[DependencyIssue::CycleBroken {
                item_id: "c".into(),
                dependency_id: "b".into()
            }]
        );
        assert_eq!(graph.topological_order().len(), 3);
    }

    #[test]
    fn names_resolve_to_ids_and_unknowns_drop() {
        let fx = Fixture::new(&[
            ("s1", "Draft", &[]),
            ("s2", "Review", &["Draft", "ghost"]),
        ]);
        let graph = fx.graph();
        assert_eq!(graph.dependencies_of("s2"), vec!["s1"]);
        assert!(graph.issues().contains(&DependencyIssue::ResolvedByName {
            item_id: "s2".into(),
            reference: "Draft".into(),
            resolved_id: "s1".into(),
        }));
        assert!(graph.issues().contains(&DependencyIssue::Unresolved {
            item_id: "s2".into(),
            reference: "ghost".into(),
        }));
    }

    #[test]
    fn names_do_not_leak_between_scopes() {
        let left = deps(&[]);
        let right = deps(&["Draft"]);
        let graph = DependencyGraph::build_scoped(vec![
            vec![GraphNode::new("w1-s1", "Draft", &left)],
            vec![GraphNode::new("w2-s1", "Publish", &right)],
        ]);
        assert!(graph.dependencies_of("w2-s1").is_empty());
        assert!(matches!(graph.issues()[0], DependencyIssue::Unresolved { .. }));
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let fx = Fixture::new(&[("a", "A", &[]), ("a", "Again", &[])]);
        let graph = fx.graph();
        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.issues(),
            &[DependencyIssue::DuplicateId { item_id: "a".into() }]
        );
    }

    #[test]
    fn reverse_lookup_and_transitive_dependents() {
        let fx = Fixture::new(&[
            ("a", "A", &[]),
            ("b", "B", &["a"]),
            ("c", "C", &["b"]),
            ("d", "D", &[]),
        ]);
        let graph = fx.graph();
        assert_eq!(graph.dependents_of("a"), vec!["b"]);
        assert_eq!(graph.transitive_dependents("a"), vec!["b", "c"]);
        assert_eq!(graph.transitive_dependencies("c"), vec!["a", "b"]);
        assert!(graph.dependents_of("d").is_empty());
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let fx = Fixture::new(&[("c", "C", &["b"]), ("b", "B", &["a"]), ("a", "A", &[])]);
        assert_eq!(fx.graph().topological_order(), vec!["a", "b", "c"]);
    }
}
