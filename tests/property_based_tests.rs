mod common;

use agents_core::models::{NewTransition, Transition};
use agents_core::state_machine::{verify_chain, ExecutionStatus, TransitionType};
use common::strategies::*;
use common::{finish, step, TestHarness};
use proptest::prelude::*;
use serde_json::json;

const STEPS: usize = 3;

fn proposal_of(transition: &Transition) -> NewTransition {
    NewTransition::new(
        transition.transition_type,
        transition.current.clone(),
        transition.next.clone(),
        transition.output.clone(),
    )
}

/// Apply `ops` to a fresh execution and return the harness, execution id and chain.
async fn run_ops(ops: Vec<ChainOp>) -> (TestHarness, uuid::Uuid, Vec<Transition>) {
    let harness = TestHarness::new().await;
    let task = harness.task().with_steps(STEPS).build().await;
    let execution = harness.start(&task).await;
    let developer_id = harness.developer.id;
    let coordinator = &harness.coordinator;

    for op in ops {
        let latest = coordinator
            .latest_transition(developer_id, execution.id)
            .await
            .unwrap();
        let proposal = match op {
            ChainOp::Advance => match latest.as_ref().map(|t| t.next.clone()) {
                None => step(None, 0),
                Some(Some(next)) if next.step + 1 < STEPS => step(Some(next.step), next.step + 1),
                Some(Some(next)) => finish(next.step, json!({"result": "ok"})),
                Some(None) => step(None, 0),
            },
            ChainOp::RedeliverLatest => match latest.as_ref() {
                Some(latest) => proposal_of(latest),
                None => continue,
            },
            ChainOp::Propose(proposal) => proposal,
            ChainOp::Cancel => {
                coordinator.cancel(developer_id, execution.id).await.unwrap();
                continue;
            }
        };
        // Rejections are expected for arbitrary proposals
        let _ = coordinator
            .report_transition(developer_id, execution.id, proposal)
            .await;
    }

    let chain = coordinator
        .list_transitions(developer_id, execution.id)
        .await
        .unwrap();
    (harness, execution.id, chain)
}

proptest! {
    /// Property: whatever workers report, the stored chain stays linked and ordered
    #[test]
    fn chain_invariant_holds(ops in chain_ops_strategy(STEPS)) {
        let (_harness, _id, chain) = tokio_test::block_on(run_ops(ops));

        prop_assert_eq!(verify_chain(&chain), None);
        if let Some(first) = chain.first() {
            prop_assert!(first.current.is_none());
        }
    }

    /// Property: at most one terminal transition, and it is the last one
    #[test]
    fn single_terminal_invariant_holds(ops in chain_ops_strategy(STEPS)) {
        let (_harness, _id, chain) = tokio_test::block_on(run_ops(ops));

        let terminals: Vec<usize> = chain
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_terminal())
            .map(|(index, _)| index)
            .collect();
        prop_assert!(terminals.len() <= 1);
        if let Some(index) = terminals.first() {
            prop_assert_eq!(*index, chain.len() - 1);
        }
    }

    /// Property: status is the projection of the latest transition
    #[test]
    fn status_matches_latest_transition(ops in chain_ops_strategy(STEPS)) {
        let (harness, execution_id, chain) = tokio_test::block_on(run_ops(ops));
        let status = tokio_test::block_on(
            harness.coordinator.status(harness.developer.id, execution_id),
        )
        .unwrap();

        let expected = match chain.last().map(|t| t.transition_type) {
            None => ExecutionStatus::Queued,
            Some(TransitionType::Step | TransitionType::StepInProgress) => ExecutionStatus::Running,
            Some(TransitionType::AwaitingInput) => ExecutionStatus::AwaitingInput,
            Some(TransitionType::Finish) => ExecutionStatus::Succeeded,
            Some(TransitionType::Error) => ExecutionStatus::Failed,
            Some(TransitionType::Cancelled) => ExecutionStatus::Cancelled,
        };
        prop_assert_eq!(status, expected);
    }

    /// Property: redelivering any stored transition returns it without writing
    #[test]
    fn redelivery_is_idempotent(ops in forward_ops_strategy()) {
        let (harness, execution_id, chain) = tokio_test::block_on(run_ops(ops));
        let developer_id = harness.developer.id;

        for transition in &chain {
            let returned = tokio_test::block_on(harness.coordinator.report_transition(
                developer_id,
                execution_id,
                proposal_of(transition),
            ))
            .unwrap();
            prop_assert_eq!(returned.id, transition.id);
        }

        let after = tokio_test::block_on(
            harness.coordinator.list_transitions(developer_id, execution_id),
        )
        .unwrap();
        prop_assert_eq!(after.len(), chain.len());
    }
}
