pub mod convert;
pub mod pipeline;
pub mod rules;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod track;
pub mod traits;

pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use rules::{matching_rules, RuleMatch};
pub use session::{SessionConfig, SessionHandle, SessionManager, SessionState, TrackSession};
pub use track::compile_track_terms;
pub use traits::PlatformApi;
