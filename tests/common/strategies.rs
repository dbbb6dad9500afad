use agents_core::models::{NewTransition, TransitionTarget};
use agents_core::state_machine::TransitionType;
use proptest::prelude::*;
use proptest::strategy::Just;

/// One action a worker (or an operator) takes against an execution.
#[derive(Debug, Clone)]
pub enum ChainOp {
    /// Report the step that correctly follows the latest transition
    Advance,
    /// Report the latest transition again
    RedeliverLatest,
    /// Report an arbitrary, possibly invalid, transition
    Propose(NewTransition),
    Cancel,
}

pub fn transition_type_strategy() -> impl Strategy<Value = TransitionType> {
    prop::sample::select(TransitionType::ALL.to_vec())
}

/// Positions in `main`, including one past the end.
pub fn target_strategy(steps: usize) -> impl Strategy<Value = Option<TransitionTarget>> {
    prop::option::of((0..=steps).prop_map(TransitionTarget::main))
}

/// Strategy for generating valid JSON outputs
pub fn output_strategy() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::json!({})),
        Just(serde_json::json!({"result": "ok"})),
        Just(serde_json::json!({"number": 42, "boolean": true})),
        Just(serde_json::json!({"nested": {"data": [1, 2, 3]}})),
    ]
}

pub fn proposal_strategy(steps: usize) -> impl Strategy<Value = NewTransition> {
    (
        transition_type_strategy(),
        target_strategy(steps),
        target_strategy(steps),
        output_strategy(),
    )
        .prop_map(|(transition_type, current, next, output)| {
            NewTransition::new(transition_type, current, next, output)
        })
}

pub fn chain_op_strategy(steps: usize) -> impl Strategy<Value = ChainOp> {
    prop_oneof![
        4 => Just(ChainOp::Advance),
        2 => Just(ChainOp::RedeliverLatest),
        3 => proposal_strategy(steps).prop_map(ChainOp::Propose),
        1 => Just(ChainOp::Cancel),
    ]
}

pub fn chain_ops_strategy(steps: usize) -> impl Strategy<Value = Vec<ChainOp>> {
    prop::collection::vec(chain_op_strategy(steps), 1..24)
}

/// Operations that only move forward through `main`, so no transition repeats.
pub fn forward_ops_strategy() -> impl Strategy<Value = Vec<ChainOp>> {
    prop::collection::vec(
        prop_oneof![
            4 => Just(ChainOp::Advance),
            2 => Just(ChainOp::RedeliverLatest),
            1 => Just(ChainOp::Cancel),
        ],
        1..12,
    )
}
