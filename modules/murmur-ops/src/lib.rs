pub mod orchestrator;

pub use orchestrator::{
    OperationHandle, OperationKind, OperationOrchestrator, OpsConfig,
};
