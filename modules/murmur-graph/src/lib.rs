pub mod builder;
pub mod community;
pub mod export;

pub use builder::{EdgeInfo, GraphBuilder, InteractionGraph, InteractionKind, VertexInfo};
pub use community::{communities_from_blocks, BlockAssignment, CommunityDetector};
pub use export::{graphml, node_link_json, write_artifacts, ArtifactPaths, NodeLinkData};
