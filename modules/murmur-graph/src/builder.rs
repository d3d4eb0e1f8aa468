//! Folds a post corpus (or an actor set plus social edges) into a
//! weighted, typed, directed multigraph for the external layout and
//! block-model routines.

use std::collections::HashMap;

use petgraph::graph::{Graph, NodeIndex};
use petgraph::Directed;
use tracing::{debug, warn};

use murmur_common::{Actor, ActorId, Post, SocialRelation};

/// Interaction type codes, kept stable for the edge property consumed by
/// the layered block model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Follow,
    Friend,
    Reply,
    Mention,
    Retweet,
    Quote,
}

impl InteractionKind {
    pub fn code(&self) -> i32 {
        match self {
            InteractionKind::Follow | InteractionKind::Friend => 0,
            InteractionKind::Reply => 1,
            InteractionKind::Mention => 2,
            InteractionKind::Retweet => 3,
            InteractionKind::Quote => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VertexInfo {
    pub id: ActorId,
    pub handle: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EdgeInfo {
    pub weight: u32,
    pub interaction_type: i32,
}

/// A directed interaction multigraph with parallel edges between an
/// ordered pair collapsed into one weighted edge.
///
/// The companion weight map is keyed by the unordered `"min-max"` pair of
/// vertex indices, so a reply and a retweet between the same two accounts
/// pool into one undifferentiated weight while `interaction_type` records
/// only the last-written kind. This mirrors the layered-model input the
/// downstream clustering consumes; per-(pair, type) weights were
/// deliberately not adopted.
pub struct InteractionGraph {
    pub graph: Graph<VertexInfo, EdgeInfo, Directed>,
    indexes: HashMap<ActorId, NodeIndex>,
    pub weights: HashMap<String, u32>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            indexes: HashMap::new(),
            weights: HashMap::new(),
        }
    }

    pub fn add_vertex(&mut self, actor: &Actor) -> NodeIndex {
        if let Some(idx) = self.indexes.get(&actor.id) {
            return *idx;
        }
        let idx = self.graph.add_node(VertexInfo {
            id: actor.id,
            handle: actor.handle.clone(),
            display_name: actor.display_name.clone(),
        });
        self.indexes.insert(actor.id, idx);
        idx
    }

    pub fn vertex(&self, id: ActorId) -> Option<NodeIndex> {
        self.indexes.get(&id).copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Unordered pair key for the weight map.
    pub fn edge_key(a: NodeIndex, b: NodeIndex) -> String {
        let (n, m) = (a.index(), b.index());
        if n <= m {
            format!("{n}-{m}")
        } else {
            format!("{m}-{n}")
        }
    }

    /// Record one interaction. Both endpoints must be registered; an
    /// unregistered endpoint drops the interaction with a warning, never
    /// fails the build.
    pub fn add_interaction(&mut self, from: ActorId, to: ActorId, kind: InteractionKind) {
        let (Some(n), Some(m)) = (self.vertex(from), self.vertex(to)) else {
            warn!(from, to, ?kind, "Interaction endpoint not in vertex set, dropped");
            return;
        };
        let key = Self::edge_key(n, m);
        match self.graph.find_edge(n, m) {
            Some(edge) => {
                let info = &mut self.graph[edge];
                info.weight += 1;
                info.interaction_type = kind.code();
                *self.weights.entry(key).or_insert(0) += 1;
            }
            None => {
                self.graph.add_edge(
                    n,
                    m,
                    EdgeInfo {
                        weight: 1,
                        interaction_type: kind.code(),
                    },
                );
                *self.weights.entry(key).or_insert(0) += 1;
            }
        }
    }

    /// Out-degree per vertex index (collapsed edges count once).
    pub fn out_degrees(&self) -> HashMap<usize, u32> {
        self.graph
            .node_indices()
            .map(|n| {
                (
                    n.index(),
                    self.graph
                        .edges_directed(n, petgraph::Direction::Outgoing)
                        .count() as u32,
                )
            })
            .collect()
    }
}

impl Default for InteractionGraph {
    fn default() -> Self {
        Self::new()
    }
}

pub struct GraphBuilder;

impl GraphBuilder {
    /// Build from a post corpus. Edge derivation per post:
    /// reply author → replied-to author; mention author → mentioned;
    /// retweet original author → retweeter (attention flows toward the
    /// amplified account); quote quoted author → quoter.
    pub fn from_posts(posts: &[Post], actors: &[Actor]) -> InteractionGraph {
        let mut graph = InteractionGraph::new();
        for actor in actors {
            graph.add_vertex(actor);
        }
        let by_id: HashMap<_, _> = posts.iter().map(|p| (p.id, p)).collect();

        for post in posts {
            if let Some(parent_id) = post.in_reply_to_post {
                if let Some(parent) = by_id.get(&parent_id) {
                    graph.add_interaction(post.author, parent.author, InteractionKind::Reply);
                }
            }
            for mentioned in &post.mentioned_actors {
                graph.add_interaction(post.author, *mentioned, InteractionKind::Mention);
            }
            if let Some(rt_id) = post.retweeted_post {
                if let Some(original) = by_id.get(&rt_id) {
                    graph.add_interaction(original.author, post.author, InteractionKind::Retweet);
                }
            }
            if let Some(q_id) = post.quoted_post {
                if let Some(quoted) = by_id.get(&q_id) {
                    graph.add_interaction(quoted.author, post.author, InteractionKind::Quote);
                }
            }
        }

        debug!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "Built interaction graph from posts"
        );
        graph
    }

    /// Build from a seed actor set and their social edges. Direction
    /// mirrors the relation: B follows A ⇒ edge A → B.
    pub fn from_social_edges(
        actors: &[Actor],
        edges: &[(ActorId, SocialRelation, Vec<ActorId>)],
    ) -> InteractionGraph {
        let mut graph = InteractionGraph::new();
        for actor in actors {
            graph.add_vertex(actor);
        }

        for (seed, relation, others) in edges {
            for other in others {
                match relation {
                    // `other` follows `seed` ⇒ seed → other.
                    SocialRelation::Followers => {
                        graph.add_interaction(*seed, *other, InteractionKind::Follow)
                    }
                    // `seed` follows `other` ⇒ other → seed.
                    SocialRelation::Friends => {
                        graph.add_interaction(*other, *seed, InteractionKind::Friend)
                    }
                }
            }
        }

        debug!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "Built interaction graph from social edges"
        );
        graph
    }
}
