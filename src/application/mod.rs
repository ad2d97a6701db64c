pub mod orchestrator;
pub mod risk_gate;

pub use orchestrator::{
    CycleOrchestrator, CycleReport, FailedOrder, OrchestratorError, OrchestratorSettings,
    OrchestratorStatus, SkipReason, WatchedSymbol,
};
pub use risk_gate::RiskGate;
