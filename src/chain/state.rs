//! Run state machine.

use serde::Serialize;
use std::fmt;

/// Observable state of one run.
///
/// ```text
/// AwaitingModel ──assistant──▶ Done
///      │  ▲ └──protocol/timeout/exhausted──▶ Failed
///  call│  │results
///      ▼  │
/// DispatchingTools ──fatal──▶ Failed
/// ```
///
/// A rejected final answer loops `AwaitingModel` back onto itself after a
/// corrective message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    AwaitingModel,
    DispatchingTools,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::AwaitingModel => "awaiting_model",
            RunState::DispatchingTools => "dispatching_tools",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (AwaitingModel, AwaitingModel)
                | (AwaitingModel, DispatchingTools)
                | (AwaitingModel, Done)
                | (AwaitingModel, Failed)
                | (DispatchingTools, AwaitingModel)
                | (DispatchingTools, Failed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_final() {
        for next in [
            RunState::AwaitingModel,
            RunState::DispatchingTools,
            RunState::Done,
            RunState::Failed,
        ] {
            assert!(!RunState::Done.can_transition_to(next));
            assert!(!RunState::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_dispatch_never_finishes_directly() {
        assert!(!RunState::DispatchingTools.can_transition_to(RunState::Done));
        assert!(RunState::DispatchingTools.can_transition_to(RunState::AwaitingModel));
        assert_eq!(
            serde_json::to_value(RunState::DispatchingTools).unwrap(),
            "dispatching_tools"
        );
    }
}
