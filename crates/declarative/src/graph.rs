//! Dependency graph over declared resources.
//!
//! An edge `A -> B` means "A references B", so B must be provisioned first.
//! Edges are derived purely from the references found in property values;
//! building the graph has no side effects and is deterministic for a given
//! registry.

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::ResourceKind;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// `from` references `to`; `to` must be provisioned before `from`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

/// Directed acyclic graph of resources.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, ResourceKind>,
    /// `node -> {dependency, ...}`
    upstream: BTreeMap<String, BTreeSet<String>>,
    /// `node -> {dependent, ...}`
    downstream: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build and validate the graph for a registry.
    ///
    /// Fails with [`Error::CycleDetected`] on any cycle (a self-reference is a
    /// cycle of one), [`Error::UnresolvedReference`] when a reference names a
    /// missing identity, and [`Error::UnknownAttribute`] when it names an
    /// attribute the target kind does not expose.
    pub fn build(registry: &Registry) -> Result<Self> {
        let mut graph = Self::default();
        for definition in registry.iter() {
            graph.add_node(&definition.identity, definition.kind);
        }

        for definition in registry.iter() {
            for reference in definition.references() {
                if reference.target == definition.identity {
                    return Err(Error::CycleDetected {
                        cycle: vec![definition.identity.clone()],
                    });
                }
                let Some(target_kind) = registry.kind_of(&reference.target) else {
                    return Err(Error::UnresolvedReference {
                        missing: reference.target,
                        referenced_by: definition.identity.clone(),
                    });
                };
                let available = target_kind.output_attributes();
                if !available.contains(&reference.attribute.as_str()) {
                    return Err(Error::UnknownAttribute {
                        referenced_by: definition.identity.clone(),
                        target: reference.target,
                        attribute: reference.attribute,
                        kind: target_kind.to_string(),
                        available: available.iter().map(ToString::to_string).collect(),
                    });
                }
                graph.add_edge(&definition.identity, &reference.target);
            }
        }

        if let Some(cycle) = graph.find_cycle() {
            return Err(Error::CycleDetected { cycle });
        }

        log::debug!(
            "Built dependency graph: {} resources, {} edges",
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Assemble a graph from recorded nodes and dependency lists without
    /// validating it. Dependencies on unknown nodes are dropped.
    pub(crate) fn from_parts<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = (String, ResourceKind, Vec<String>)>,
    {
        let parts: Vec<_> = parts.into_iter().collect();
        let mut graph = Self::default();
        for (identity, kind, _) in &parts {
            graph.add_node(identity, *kind);
        }
        for (identity, _, dependencies) in &parts {
            for dependency in dependencies {
                if graph.nodes.contains_key(dependency) {
                    graph.add_edge(identity, dependency);
                }
            }
        }
        graph
    }

    fn add_node(&mut self, identity: &str, kind: ResourceKind) {
        self.nodes.insert(identity.to_string(), kind);
        self.upstream.entry(identity.to_string()).or_default();
        self.downstream.entry(identity.to_string()).or_default();
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        self.upstream
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.downstream
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.upstream.values().map(BTreeSet::len).sum()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.nodes.contains_key(identity)
    }

    /// Identities in lexicographic order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn kind(&self, identity: &str) -> Option<ResourceKind> {
        self.nodes.get(identity).copied()
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, identity: &str) -> impl Iterator<Item = &str> {
        self.upstream
            .get(identity)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Direct dependents of a node
    pub fn dependents(&self, identity: &str) -> impl Iterator<Item = &str> {
        self.downstream
            .get(identity)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Every edge, sorted
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.upstream
            .iter()
            .flat_map(|(from, tos)| {
                tos.iter().map(move |to| DependencyEdge {
                    from: from.clone(),
                    to: to.clone(),
                })
            })
            .collect()
    }

    /// Every node that directly or transitively depends on `identity`.
    pub fn transitive_dependents(&self, identity: &str) -> BTreeSet<String> {
        walk(identity, &self.downstream)
    }

    /// Every node `identity` directly or transitively depends on.
    pub fn transitive_dependencies(&self, identity: &str) -> BTreeSet<String> {
        walk(identity, &self.upstream)
    }

    /// Restrict to a subset of nodes, keeping only edges between kept nodes.
    pub fn subgraph(&self, keep: &BTreeSet<String>) -> Self {
        Self::from_parts(
            self.nodes
                .iter()
                .filter(|(id, _)| keep.contains(*id))
                .map(|(id, kind)| {
                    let deps = self.dependencies(id).map(ToString::to_string).collect();
                    (id.clone(), *kind, deps)
                }),
        )
    }

    /// Find a cycle, reporting its members in encounter order.
    ///
    /// Nodes and their dependencies are visited in lexicographic order so the
    /// reported cycle is the same on every call.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Visited,
        }

        fn visit<'a>(
            graph: &'a DependencyGraph,
            node: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(node) {
                Some(Mark::Visited) => return None,
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                    return Some(stack[start..].iter().map(ToString::to_string).collect());
                }
                None => {}
            }
            marks.insert(node, Mark::Visiting);
            stack.push(node);
            for dependency in graph.dependencies(node) {
                if let Some(cycle) = visit(graph, dependency, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(node, Mark::Visited);
            None
        }

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        for node in self.nodes() {
            if let Some(cycle) = visit(self, node, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    /// Human-readable dump of every node and its dependencies.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (identity, kind) in &self.nodes {
            let deps: Vec<&str> = self.dependencies(identity).collect();
            let _ = writeln!(out, "{identity} ({kind}) -> [{}]", deps.join(", "));
        }
        out
    }

    /// Graphviz rendering, edges pointing from dependent to dependency.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph resources {\n  rankdir=RL;\n");
        for (identity, kind) in &self.nodes {
            let _ = writeln!(out, "  \"{identity}\" [label=\"{identity}\\n{kind}\"];");
        }
        for edge in self.edges() {
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", edge.from, edge.to);
        }
        out.push_str("}\n");
        out
    }
}

fn walk(start: &str, adjacency: &BTreeMap<String, BTreeSet<String>>) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut queue: Vec<&str> = vec![start];
    while let Some(node) = queue.pop() {
        for next in adjacency.get(node).into_iter().flatten() {
            if seen.insert(next.clone()) {
                queue.push(next);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PropertyValue, ResourceDefinition, Segment};

    fn def(id: &str, kind: ResourceKind, refs: &[(&str, &str)]) -> ResourceDefinition {
        refs.iter()
            .enumerate()
            .fold(ResourceDefinition::new(id, kind), |d, (i, (target, attr))| {
                d.with_ref(format!("p{i}"), *target, *attr)
            })
    }

    fn registry(defs: Vec<ResourceDefinition>) -> Registry {
        Registry::from_definitions(defs).unwrap()
    }

    #[test]
    fn test_edges_follow_references() {
        let registry = registry(vec![
            def("Cert", ResourceKind::Certificate, &[]),
            def("Gateway", ResourceKind::GatewayApi, &[("Cert", "arn")]),
        ]);
        let graph = DependencyGraph::build(&registry).unwrap();
        assert_eq!(
            graph.edges(),
            vec![DependencyEdge {
                from: "Gateway".into(),
                to: "Cert".into()
            }]
        );
        assert_eq!(graph.dependents("Cert").collect::<Vec<_>>(), vec!["Gateway"]);
    }

    #[test]
    fn test_template_references_create_edges() {
        let definition = ResourceDefinition::new("Record", ResourceKind::Record).with(
            "record_name",
            PropertyValue::Template(vec![
                Segment::Text("api.".into()),
                Segment::Reference(crate::types::Reference::new("Zone", "name")),
            ]),
        );
        let registry = registry(vec![def("Zone", ResourceKind::HostedZone, &[]), definition]);
        let graph = DependencyGraph::build(&registry).unwrap();
        assert_eq!(graph.dependencies("Record").collect::<Vec<_>>(), vec!["Zone"]);
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let registry = registry(vec![def("Role", ResourceKind::Role, &[("Role", "arn")])]);
        let err = DependencyGraph::build(&registry).unwrap_err();
        assert!(matches!(err, Error::CycleDetected { cycle } if cycle == vec!["Role"]));
    }

    #[test]
    fn test_cycle_reported_in_encounter_order() {
        let registry = registry(vec![
            def("A", ResourceKind::Role, &[("B", "arn")]),
            def("B", ResourceKind::Role, &[("C", "arn")]),
            def("C", ResourceKind::Role, &[("A", "arn")]),
            def("D", ResourceKind::Role, &[]),
        ]);
        let err = DependencyGraph::build(&registry).unwrap_err();
        match err {
            Error::CycleDetected { cycle } => assert_eq!(cycle, vec!["A", "B", "C"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unresolved_reference() {
        let registry = registry(vec![def(
            "Gateway",
            ResourceKind::GatewayApi,
            &[("ApiCertificate", "arn")],
        )]);
        let err = DependencyGraph::build(&registry).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedReference { missing, referenced_by }
                if missing == "ApiCertificate" && referenced_by == "Gateway"
        ));
    }

    #[test]
    fn test_unknown_attribute() {
        let registry = registry(vec![
            def("Cert", ResourceKind::Certificate, &[]),
            def("Gateway", ResourceKind::GatewayApi, &[("Cert", "fingerprint")]),
        ]);
        let err = DependencyGraph::build(&registry).unwrap_err();
        assert!(matches!(err, Error::UnknownAttribute { attribute, .. } if attribute == "fingerprint"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let registry = registry(vec![
            def("Cert", ResourceKind::Certificate, &[]),
            def("Role", ResourceKind::Role, &[]),
            def("Function", ResourceKind::Function, &[("Role", "arn")]),
            def("Gateway", ResourceKind::GatewayApi, &[("Cert", "arn")]),
        ]);
        let first = DependencyGraph::build(&registry).unwrap();
        let second = DependencyGraph::build(&registry).unwrap();
        assert_eq!(first.edges(), second.edges());
        assert_eq!(first.dump(), second.dump());
    }

    #[test]
    fn test_transitive_dependents() {
        let registry = registry(vec![
            def("Cert", ResourceKind::Certificate, &[]),
            def("Domain", ResourceKind::DomainName, &[("Cert", "arn")]),
            def("Record", ResourceKind::Record, &[("Domain", "target_domain_name")]),
            def("Role", ResourceKind::Role, &[]),
        ]);
        let graph = DependencyGraph::build(&registry).unwrap();
        let dependents = graph.transitive_dependents("Cert");
        assert_eq!(
            dependents.into_iter().collect::<Vec<_>>(),
            vec!["Domain", "Record"]
        );
        assert!(graph.transitive_dependents("Role").is_empty());
    }

    #[test]
    fn test_subgraph_drops_outside_edges() {
        let registry = registry(vec![
            def("Cert", ResourceKind::Certificate, &[]),
            def("Domain", ResourceKind::DomainName, &[("Cert", "arn")]),
        ]);
        let graph = DependencyGraph::build(&registry).unwrap();
        let keep: BTreeSet<String> = ["Domain".to_string()].into();
        let sub = graph.subgraph(&keep);
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.edge_count(), 0);
    }

    #[test]
    fn test_dot_output_lists_edges() {
        let registry = registry(vec![
            def("Cert", ResourceKind::Certificate, &[]),
            def("Domain", ResourceKind::DomainName, &[("Cert", "arn")]),
        ]);
        let dot = DependencyGraph::build(&registry).unwrap().to_dot();
        assert!(dot.contains("\"Domain\" -> \"Cert\";"));
    }
}
