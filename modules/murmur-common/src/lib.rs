pub mod config;
pub mod error;
pub mod jobs;
pub mod rules;
pub mod types;

pub use config::Config;
pub use error::MurmurError;
pub use jobs::{JobKind, JobScheduler, ScheduledJob};
pub use rules::{Rule, RuleKind};
pub use types::*;
