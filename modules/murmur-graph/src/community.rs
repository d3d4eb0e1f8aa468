//! Boundary to the external layout + stochastic block-model routine. The
//! algorithm itself is a black box: it receives the weighted multigraph
//! and hands back per-vertex block assignments and 2D coordinates.

use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use murmur_common::Community;

use crate::builder::InteractionGraph;

/// What the external routine returns: vertex index → block id, and vertex
/// index → layout position.
#[derive(Debug, Clone, Default)]
pub struct BlockAssignment {
    pub blocks: HashMap<usize, u32>,
    pub positions: HashMap<usize, (f64, f64)>,
}

impl BlockAssignment {
    /// Block of a vertex; unassigned vertices fall into block 0.
    pub fn block_of(&self, vertex: usize) -> u32 {
        self.blocks.get(&vertex).copied().unwrap_or(0)
    }
}

/// External community-detection collaborator.
pub trait CommunityDetector: Send + Sync {
    fn detect(&self, graph: &InteractionGraph) -> Result<BlockAssignment>;
}

/// Fold a block assignment into community records ready to persist back
/// through the store.
pub fn communities_from_blocks(
    graph: &InteractionGraph,
    assignment: &BlockAssignment,
) -> Vec<Community> {
    let mut members: HashMap<u32, Vec<u64>> = HashMap::new();
    for n in graph.graph.node_indices() {
        let block = assignment.block_of(n.index());
        members.entry(block).or_default().push(graph.graph[n].id);
    }

    let mut blocks: Vec<u32> = members.keys().copied().collect();
    blocks.sort_unstable();
    blocks
        .into_iter()
        .map(|block_id| {
            let mut ids = members.remove(&block_id).unwrap_or_default();
            ids.sort_unstable();
            Community {
                id: Uuid::new_v4(),
                block_id,
                name: format!("Network community {block_id}"),
                description: format!(
                    "Automatically computed community with elements from block {block_id}"
                ),
                members: ids,
                created_at: Utc::now(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use murmur_common::Actor;

    fn actor(id: u64) -> Actor {
        Actor::stub(id, Some(format!("u{id}")), None)
    }

    #[test]
    fn members_grouped_by_block() {
        let actors = vec![actor(1), actor(2), actor(3)];
        let graph = GraphBuilder::from_posts(&[], &actors);
        let v1 = graph.vertex(1).unwrap().index();
        let v2 = graph.vertex(2).unwrap().index();
        let v3 = graph.vertex(3).unwrap().index();

        let assignment = BlockAssignment {
            blocks: HashMap::from([(v1, 0), (v2, 1), (v3, 1)]),
            positions: HashMap::new(),
        };
        let communities = communities_from_blocks(&graph, &assignment);

        assert_eq!(communities.len(), 2);
        assert_eq!(communities[0].block_id, 0);
        assert_eq!(communities[0].members, vec![1]);
        assert_eq!(communities[1].block_id, 1);
        assert_eq!(communities[1].members, vec![2, 3]);
        assert_eq!(communities[1].name, "Network community 1");
    }

    #[test]
    fn unassigned_vertices_fall_into_block_zero() {
        let actors = vec![actor(1), actor(2)];
        let graph = GraphBuilder::from_posts(&[], &actors);
        let communities = communities_from_blocks(&graph, &BlockAssignment::default());
        assert_eq!(communities.len(), 1);
        assert_eq!(communities[0].members, vec![1, 2]);
    }
}
