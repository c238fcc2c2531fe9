use crate::builder::BuildError;
use daggy::{Dag, NodeIndex};
use dashmap::DashMap;
use fxhash::FxHashMap;

/// The import edges observed while walking the dependency graph.
///
/// The walker already refuses to recurse into a cycle, but the ordering
/// guarantee of the engine (a link step only runs once every transitive
/// archive exists) rests on this graph being a DAG, so it is asserted
/// explicitly on every insertion rather than relied on incidentally.
///
#[derive(Debug, Default)]
pub(crate) struct BuildGraph {
    edges: DashMap<String, Vec<String>>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `import_path -> deps` and verify the accumulated graph is
    /// still acyclic.
    ///
    pub fn add_dependencies(&self, import_path: &str, deps: &[String]) -> Result<(), BuildError> {
        self.edges.insert(import_path.to_string(), deps.to_vec());

        let mut dag: Dag<(), (), u32> = Dag::new();
        let mut nodes: FxHashMap<String, NodeIndex> = FxHashMap::default();
        for entry in self.edges.iter() {
            nodes.insert(entry.key().clone(), dag.add_node(()));
        }

        let mut edges = vec![];
        for entry in self.edges.iter() {
            let node_idx = nodes[entry.key()];
            for dep in entry.value() {
                if let Some(dep_idx) = nodes.get(dep) {
                    edges.push((*dep_idx, node_idx));
                }
            }
        }

        dag.extend_with_edges(edges)
            .map_err(|_| BuildError::DependencyCycle {
                path: vec![import_path.to_string()],
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_chain_is_accepted() {
        let graph = BuildGraph::new();
        graph.add_dependencies("a", &[]).unwrap();
        graph.add_dependencies("b", &["a".into()]).unwrap();
        graph.add_dependencies("c", &["b".into()]).unwrap();
    }

    #[test]
    fn a_diamond_is_accepted() {
        let graph = BuildGraph::new();
        graph.add_dependencies("a", &[]).unwrap();
        graph.add_dependencies("b", &["a".into()]).unwrap();
        graph.add_dependencies("c", &["a".into()]).unwrap();
        graph
            .add_dependencies("d", &["b".into(), "c".into()])
            .unwrap();
    }

    #[test]
    fn a_cycle_is_rejected() {
        let graph = BuildGraph::new();
        graph.add_dependencies("a", &["b".into()]).unwrap();
        let err = graph.add_dependencies("b", &["a".into()]).unwrap_err();
        assert_matches!(err, BuildError::DependencyCycle { .. });
    }
}
