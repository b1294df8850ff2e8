use std::collections::{BTreeMap, HashMap, VecDeque};

use anyhow::{Context, Result};
use cargo_metadata::{DependencyKind, MetadataCommand};

const SERVER_PACKAGE_NAME: &str = "gst-server";
const FORBIDDEN_SERVER_DEPENDENCIES: &[&str] = &["gst-warehouse", "sqlx"];

/// Package name to the names of its non-dev dependencies.
type Graph = HashMap<String, Vec<String>>;

fn main() -> Result<()> {
    let metadata = MetadataCommand::new()
        .exec()
        .context("failed to run `cargo metadata`")?;

    let resolve = metadata
        .resolve
        .as_ref()
        .context("`cargo metadata` did not include a resolved dependency graph")?;

    if !metadata
        .packages
        .iter()
        .any(|p| p.name.as_str() == SERVER_PACKAGE_NAME)
    {
        anyhow::bail!("package `{}` not found in workspace", SERVER_PACKAGE_NAME);
    }

    let id_to_name: HashMap<_, _> = metadata
        .packages
        .iter()
        .map(|p| (p.id.clone(), p.name.to_string()))
        .collect();

    let mut graph = Graph::new();
    for node in &resolve.nodes {
        let Some(name) = id_to_name.get(&node.id) else {
            continue;
        };
        let deps = node
            .deps
            .iter()
            .filter(|dep| {
                dep.dep_kinds
                    .iter()
                    .any(|info| info.kind != DependencyKind::Development)
            })
            .filter_map(|dep| id_to_name.get(&dep.pkg).cloned());
        graph.entry(name.clone()).or_default().extend(deps);
    }

    let violations = forbidden_paths(&graph, SERVER_PACKAGE_NAME, FORBIDDEN_SERVER_DEPENDENCIES);
    if !violations.is_empty() {
        eprintln!(
            "FAIL: `{}` depends on forbidden crate(s):",
            SERVER_PACKAGE_NAME
        );
        for (name, path) in &violations {
            eprintln!("  {}: {}", name, path.join(" -> "));
        }
        std::process::exit(1);
    }

    println!(
        "OK: `{}` has no dependency edge to {}",
        SERVER_PACKAGE_NAME,
        FORBIDDEN_SERVER_DEPENDENCIES.join(", ")
    );

    Ok(())
}

/// Breadth-first walk from `root`; for each forbidden package reached, the
/// shortest chain of package names leading to it.
fn forbidden_paths(graph: &Graph, root: &str, forbidden: &[&str]) -> BTreeMap<String, Vec<String>> {
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([root]);
    let mut found = BTreeMap::new();

    while let Some(current) = queue.pop_front() {
        let Some(deps) = graph.get(current) else {
            continue;
        };

        for dep in deps {
            let dep = dep.as_str();
            if dep == root || parent.contains_key(dep) {
                continue;
            }
            parent.insert(dep, current);

            if forbidden.contains(&dep) {
                let mut path = vec![dep.to_string()];
                let mut cursor = dep;
                while let Some(prev) = parent.get(cursor) {
                    path.push(prev.to_string());
                    cursor = *prev;
                }
                path.reverse();
                found.insert(dep.to_string(), path);
            }

            queue.push_back(dep);
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> Graph {
        edges
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn clean_graph_has_no_violations() {
        let g = graph(&[
            ("gst-server", &["gst-contracts", "axum"]),
            ("gst-contracts", &["serde"]),
            ("gst-cli", &["gst-server", "gst-warehouse"]),
            ("gst-warehouse", &["sqlx"]),
        ]);
        assert!(forbidden_paths(&g, "gst-server", FORBIDDEN_SERVER_DEPENDENCIES).is_empty());
    }

    #[test]
    fn transitive_edge_reports_shortest_path() {
        let g = graph(&[
            ("gst-server", &["gst-contracts", "helper"]),
            ("gst-contracts", &["serde"]),
            ("helper", &["gst-warehouse"]),
            ("gst-warehouse", &["sqlx"]),
        ]);

        let found = forbidden_paths(&g, "gst-server", FORBIDDEN_SERVER_DEPENDENCIES);
        assert_eq!(
            found.get("gst-warehouse"),
            Some(&vec![
                "gst-server".to_string(),
                "helper".to_string(),
                "gst-warehouse".to_string()
            ])
        );
        assert_eq!(found.get("sqlx").map(Vec::len), Some(4));
    }
}
