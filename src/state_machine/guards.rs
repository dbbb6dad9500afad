//! # Chain Guards
//!
//! Pure validation of a proposed transition against the existing chain.
//!
//! Stores call [`ChainGuard::evaluate`] while holding the per-execution append
//! lock, so the decision and the write it authorizes are one atomic step. The
//! guard itself performs no I/O.
//!
//! ## Evaluation Order
//!
//! 1. A proposal identical to the latest transition is a redelivery: return it.
//! 2. A closed chain accepts nothing new. A redelivery of any earlier transition
//!    still succeeds, anything else is `ChainClosed`.
//! 3. `current` must equal the latest `next` (or be empty for the first
//!    transition). On mismatch, an identical earlier transition means a stale
//!    redelivery and succeeds; otherwise the proposal is a genuine conflict.
//! 4. `next` must name a step of the task. Terminal transitions may omit it.

use crate::error::{AgentsError, Result};
use crate::models::{describe_target, NewTransition, Task, Transition, TransitionTarget};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendDecision {
    /// Write the proposal at this chain position
    Append { sort_key: i32 },
    /// The proposal was already applied; nothing is written
    Duplicate(Transition),
}

/// Step positions a chain may move to, captured from the task definition.
#[derive(Debug, Clone, Default)]
pub struct ChainGuard {
    workflow_lengths: BTreeMap<String, usize>,
}

impl ChainGuard {
    pub fn for_task(task: &Task) -> Self {
        let mut workflow_lengths: BTreeMap<String, usize> = task
            .workflows
            .iter()
            .map(|(name, steps)| (name.clone(), steps.len()))
            .collect();
        workflow_lengths.insert(crate::constants::MAIN_WORKFLOW.to_string(), task.main.len());
        Self { workflow_lengths }
    }

    /// A guard that knows no step positions. Used when the task definition is
    /// gone; only redeliveries and terminal transitions can pass it.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn contains(&self, target: &TransitionTarget) -> bool {
        self.workflow_lengths
            .get(&target.workflow)
            .is_some_and(|len| target.step < *len)
    }

    /// Decide whether `proposal` may be appended to `chain`.
    ///
    /// `chain` must be in chain order (ascending `sort_key`).
    pub fn evaluate(
        &self,
        execution_id: Uuid,
        chain: &[Transition],
        proposal: &NewTransition,
    ) -> Result<AppendDecision> {
        let latest = chain.last();

        if let Some(latest) = latest {
            if latest.matches(proposal) {
                return Ok(AppendDecision::Duplicate(latest.clone()));
            }

            if latest.is_terminal() {
                return find_duplicate(chain, proposal)
                    .map(AppendDecision::Duplicate)
                    .ok_or(AgentsError::ChainClosed { execution_id });
            }
        }

        let expected = latest.and_then(|t| t.next.as_ref());
        if proposal.current.as_ref() != expected {
            return find_duplicate(chain, proposal)
                .map(AppendDecision::Duplicate)
                .ok_or_else(|| AgentsError::ChainOrderingViolation {
                    execution_id,
                    expected: describe_target(expected),
                    actual: describe_target(proposal.current.as_ref()),
                });
        }

        match (&proposal.next, proposal.transition_type.is_terminal()) {
            (Some(next), _) if !self.contains(next) => {
                return Err(AgentsError::InvalidStepReference {
                    execution_id,
                    target: next.to_string(),
                })
            }
            (None, false) => {
                return Err(AgentsError::InvalidStepReference {
                    execution_id,
                    target: describe_target(None),
                })
            }
            _ => {}
        }

        let sort_key = i32::try_from(chain.len())
            .map_err(|_| AgentsError::validation("transition chain is too long"))?;
        Ok(AppendDecision::Append { sort_key })
    }
}

fn find_duplicate(chain: &[Transition], proposal: &NewTransition) -> Option<Transition> {
    chain.iter().rev().find(|t| t.matches(proposal)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEntity, NewTask, TaskStep};
    use crate::state_machine::TransitionType;
    use serde_json::{json, Value};

    fn guard() -> ChainGuard {
        let step = || TaskStep::Evaluate(Default::default());
        let task = NewTask {
            agent_id: Uuid::new_v4(),
            name: "two steps".to_string(),
            description: String::new(),
            input_schema: Value::Null,
            main: vec![step(), step()],
            workflows: Default::default(),
            metadata: Value::Null,
        }
        .into_entity(Uuid::new_v4())
        .unwrap();
        ChainGuard::for_task(&task)
    }

    fn proposal(
        kind: TransitionType,
        current: Option<usize>,
        next: Option<usize>,
        output: Value,
    ) -> NewTransition {
        NewTransition::new(
            kind,
            current.map(TransitionTarget::main),
            next.map(TransitionTarget::main),
            output,
        )
    }

    fn apply(guard: &ChainGuard, chain: &mut Vec<Transition>, p: NewTransition) {
        let id = Uuid::nil();
        match guard.evaluate(id, chain, &p).unwrap() {
            AppendDecision::Append { sort_key } => {
                chain.push(Transition::from_proposal(id, p, sort_key))
            }
            AppendDecision::Duplicate(_) => panic!("unexpected duplicate"),
        }
    }

    #[test]
    fn test_contains_steps_of_every_workflow() {
        let step = || TaskStep::Evaluate(Default::default());
        let task = NewTask {
            agent_id: Uuid::new_v4(),
            name: "with cleanup".to_string(),
            description: String::new(),
            input_schema: Value::Null,
            main: vec![step(), step()],
            workflows: [("cleanup".to_string(), vec![step()])].into_iter().collect(),
            metadata: Value::Null,
        }
        .into_entity(Uuid::new_v4())
        .unwrap();
        let guard = ChainGuard::for_task(&task);

        assert!(guard.contains(&TransitionTarget::main(0)));
        assert!(guard.contains(&TransitionTarget::main(1)));
        assert!(!guard.contains(&TransitionTarget::main(2)));
        assert!(guard.contains(&TransitionTarget::new("cleanup", 0)));
        assert!(!guard.contains(&TransitionTarget::new("cleanup", 1)));
        assert!(!guard.contains(&TransitionTarget::new("missing", 0)));
        assert!(!ChainGuard::detached().contains(&TransitionTarget::main(0)));
    }

    #[test]
    fn test_first_transition_must_start_chain() {
        let guard = guard();
        let err = guard
            .evaluate(
                Uuid::nil(),
                &[],
                &proposal(TransitionType::Step, Some(0), Some(1), json!({})),
            )
            .unwrap_err();
        assert!(matches!(err, AgentsError::ChainOrderingViolation { .. }));

        let ok = guard
            .evaluate(
                Uuid::nil(),
                &[],
                &proposal(TransitionType::Step, None, Some(0), json!({})),
            )
            .unwrap();
        assert_eq!(ok, AppendDecision::Append { sort_key: 0 });
    }

    #[test]
    fn test_redelivery_of_latest_is_duplicate() {
        let guard = guard();
        let mut chain = Vec::new();
        apply(&guard, &mut chain, proposal(TransitionType::Step, None, Some(0), json!({})));
        apply(&guard, &mut chain, proposal(TransitionType::Step, Some(0), Some(1), json!({"r": 1})));

        let decision = guard
            .evaluate(
                Uuid::nil(),
                &chain,
                &proposal(TransitionType::Step, Some(0), Some(1), json!({"r": 1})),
            )
            .unwrap();
        assert_eq!(decision, AppendDecision::Duplicate(chain[1].clone()));
    }

    #[test]
    fn test_stale_redelivery_of_earlier_transition_is_duplicate() {
        let guard = guard();
        let mut chain = Vec::new();
        apply(&guard, &mut chain, proposal(TransitionType::Step, None, Some(0), json!({})));
        apply(&guard, &mut chain, proposal(TransitionType::Step, Some(0), Some(1), json!({})));

        let decision = guard
            .evaluate(
                Uuid::nil(),
                &chain,
                &proposal(TransitionType::Step, None, Some(0), json!({})),
            )
            .unwrap();
        assert_eq!(decision, AppendDecision::Duplicate(chain[0].clone()));
    }

    #[test]
    fn test_skipped_step_is_ordering_violation() {
        let guard = guard();
        let mut chain = Vec::new();
        apply(&guard, &mut chain, proposal(TransitionType::Step, None, Some(0), json!({})));

        let err = guard
            .evaluate(
                Uuid::nil(),
                &chain,
                &proposal(TransitionType::Step, Some(1), None, json!({})),
            )
            .unwrap_err();
        match err {
            AgentsError::ChainOrderingViolation {
                expected, actual, ..
            } => {
                assert_eq!(expected, "main[0]");
                assert_eq!(actual, "main[1]");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_payload_is_ordering_violation() {
        let guard = guard();
        let mut chain = Vec::new();
        apply(&guard, &mut chain, proposal(TransitionType::Step, None, Some(0), json!({})));
        apply(&guard, &mut chain, proposal(TransitionType::Step, Some(0), Some(1), json!({"r": 1})));

        let err = guard
            .evaluate(
                Uuid::nil(),
                &chain,
                &proposal(TransitionType::Step, Some(0), Some(1), json!({"r": 2})),
            )
            .unwrap_err();
        assert!(matches!(err, AgentsError::ChainOrderingViolation { .. }));
    }

    #[test]
    fn test_closed_chain_rejects_new_transitions() {
        let guard = guard();
        let mut chain = Vec::new();
        apply(&guard, &mut chain, proposal(TransitionType::Step, None, Some(0), json!({})));
        apply(&guard, &mut chain, proposal(TransitionType::Finish, Some(0), None, json!({"done": true})));

        let err = guard
            .evaluate(
                Uuid::nil(),
                &chain,
                &proposal(TransitionType::Cancelled, None, None, json!({})),
            )
            .unwrap_err();
        assert!(matches!(err, AgentsError::ChainClosed { .. }));

        // Redelivered finish still succeeds
        let decision = guard
            .evaluate(
                Uuid::nil(),
                &chain,
                &proposal(TransitionType::Finish, Some(0), None, json!({"done": true})),
            )
            .unwrap();
        assert!(matches!(decision, AppendDecision::Duplicate(_)));
    }

    #[test]
    fn test_invalid_step_references() {
        let guard = guard();
        let out_of_range = guard
            .evaluate(
                Uuid::nil(),
                &[],
                &proposal(TransitionType::Step, None, Some(2), json!({})),
            )
            .unwrap_err();
        assert!(matches!(out_of_range, AgentsError::InvalidStepReference { .. }));

        let missing_next = guard
            .evaluate(
                Uuid::nil(),
                &[],
                &proposal(TransitionType::StepInProgress, None, None, json!({})),
            )
            .unwrap_err();
        assert!(matches!(missing_next, AgentsError::InvalidStepReference { .. }));

        let unknown_workflow = guard
            .evaluate(
                Uuid::nil(),
                &[],
                &NewTransition::new(
                    TransitionType::Step,
                    None,
                    Some(TransitionTarget::new("cleanup", 0)),
                    json!({}),
                ),
            )
            .unwrap_err();
        assert!(matches!(unknown_workflow, AgentsError::InvalidStepReference { .. }));
    }

    #[test]
    fn test_terminal_transition_may_omit_next() {
        let decision = guard()
            .evaluate(
                Uuid::nil(),
                &[],
                &proposal(TransitionType::Error, None, None, json!({"error": "boom"})),
            )
            .unwrap();
        assert_eq!(decision, AppendDecision::Append { sort_key: 0 });
    }

    #[test]
    fn test_detached_guard_only_allows_terminal() {
        let guard = ChainGuard::detached();
        assert!(guard
            .evaluate(
                Uuid::nil(),
                &[],
                &proposal(TransitionType::Step, None, Some(0), json!({})),
            )
            .is_err());
        assert!(guard
            .evaluate(
                Uuid::nil(),
                &[],
                &proposal(TransitionType::Cancelled, None, None, json!({})),
            )
            .is_ok());
    }
}
