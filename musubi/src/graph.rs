//! Dependency graph helpers

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use petgraph::algo::toposort;
use petgraph::graph::{Graph as PetGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

use crate::arena::Shaders;
use crate::errors::*;
use crate::object::ObjectId;

/// Convenience wrapper for `petgraph::Graph`, with edges going from an object to its dependencies
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: PetGraph<ObjectId, ()>,
    nodes: HashMap<ObjectId, NodeIndex<u32>>,
}

impl DependencyGraph {
    /// Collect every object reachable from `roots`
    pub fn build<I>(shaders: &Shaders, roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = ObjectId>,
    {
        let mut graph = DependencyGraph::default();
        let mut expanded = HashSet::default();
        let mut pending: Vec<_> = roots.into_iter().collect();

        while let Some(id) = pending.pop() {
            if !expanded.insert(id) {
                continue;
            }

            let from = graph.node(id);
            for dep in shaders.dependencies(id)? {
                let to = graph.node(dep);
                graph.graph.update_edge(from, to, ());
                pending.push(dep);
            }
        }

        Ok(graph)
    }

    fn node(&mut self, id: ObjectId) -> NodeIndex<u32> {
        let graph = &mut self.graph;
        *self.nodes.entry(id).or_insert_with(|| graph.add_node(id))
    }

    pub fn check_acyclic(&self) -> Result<()> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => bail!(ErrorKind::CyclicDependency(self.graph[cycle.node_id()])),
        }
    }

    /// Dependencies before dependents, each object listed once across all `roots`
    ///
    /// Dependencies of an object come out in the order it declared them.
    pub fn post_order(&self, roots: &[ObjectId]) -> Vec<ObjectId> {
        let mut order = Vec::new();
        let mut roots = roots.iter().filter_map(|id| self.nodes.get(id).cloned());

        let mut dfs = match roots.next() {
            Some(first) => DfsPostOrder::new(&self.graph, first),
            None => return order,
        };

        loop {
            while let Some(node) = dfs.next(&self.graph) {
                order.push(self.graph[node]);
            }

            match roots.next() {
                Some(root) => dfs.move_to(root),
                None => return order,
            }
        }
    }
}
