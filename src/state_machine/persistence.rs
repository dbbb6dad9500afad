use super::guards::ChainGuard;
use crate::error::Result;
use crate::models::{NewTransition, Transition};
use async_trait::async_trait;
use uuid::Uuid;

/// Result of an append: the stored transition and whether this call wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    pub transition: Transition,
    /// `false` when the proposal was a redelivery of an applied transition
    pub created: bool,
}

/// Append-only, per-execution transition storage
#[async_trait]
pub trait TransitionLog: Send + Sync {
    /// Validate `proposal` with `guard` and append it atomically.
    ///
    /// Implementations must evaluate the guard and write the transition under a
    /// lock scoped to `execution_id`, so concurrent appends to one execution are
    /// serialized while different executions never contend. Fails with
    /// `NotFound` when the execution does not exist.
    async fn append_transition(
        &self,
        execution_id: Uuid,
        proposal: NewTransition,
        guard: &ChainGuard,
    ) -> Result<AppendOutcome>;

    /// All transitions of the execution in chain order.
    async fn list_transitions(&self, execution_id: Uuid) -> Result<Vec<Transition>>;

    /// The most recent transition, if any.
    async fn latest_transition(&self, execution_id: Uuid) -> Result<Option<Transition>>;
}

/// Sort transitions into chain order.
pub fn order_chain(mut transitions: Vec<Transition>) -> Vec<Transition> {
    transitions.sort_by_key(|t| t.sort_key);
    transitions
}

/// Check the chain invariants, returning a description of the first violation.
pub fn verify_chain(chain: &[Transition]) -> Option<String> {
    for (index, transition) in chain.iter().enumerate() {
        if usize::try_from(transition.sort_key).ok() != Some(index) {
            return Some(format!(
                "transition {} has sort_key {} at position {index}",
                transition.id, transition.sort_key
            ));
        }

        let expected = match index {
            0 => None,
            _ => chain[index - 1].next.as_ref(),
        };
        if transition.current.as_ref() != expected {
            return Some(format!(
                "transition {} does not continue from its predecessor",
                transition.id
            ));
        }

        if transition.is_terminal() && index + 1 != chain.len() {
            return Some(format!(
                "terminal transition {} is followed by further transitions",
                transition.id
            ));
        }
    }
    None
}
