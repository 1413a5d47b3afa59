//! Structured exception handling
//!
//! `spec.md` §4.4 "Exceptions": a raise stores the exception Value on the
//! current thread and walks frames toward the caller, consulting each
//! frame's exception table; `LEAVE_FINALLY` inspects a three-slot state
//! block to decide whether a `finally` clause should continue, re-raise,
//! return, or branch.

use alore_core::Value;

/// The three-slot state a `LEAVE_FINALLY` instruction consults
/// (`spec.md` §4.4). Compiled as plain local slots by the producer; this
/// struct is just the interpreter's view of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinallyIntent {
    /// Fall through: the protected block completed normally.
    Continue,
    /// Re-raise the exception captured in the state block's value slot.
    Reraise,
    /// Return from the enclosing function with the state block's value
    /// slot as the return value.
    Return,
    /// Resume a `break`/`continue`/`goto`-style branch at the given
    /// context depth and target.
    Branch { context_depth: u32, target_pc: u32 },
}

/// The three-slot block itself: `(status, value, context_depth)`.
#[derive(Debug, Clone, Copy)]
pub struct FinallyState {
    pub status: u32,
    pub value: Value,
    pub context_depth: u32,
}

impl FinallyState {
    const STATUS_CONTINUE: u32 = 0;
    const STATUS_RERAISE: u32 = 1;
    const STATUS_RETURN: u32 = 2;
    const STATUS_BRANCH: u32 = 3;

    pub fn continue_normally() -> FinallyState {
        FinallyState {
            status: Self::STATUS_CONTINUE,
            value: Value::NIL,
            context_depth: 0,
        }
    }

    pub fn reraise(exc: Value) -> FinallyState {
        FinallyState {
            status: Self::STATUS_RERAISE,
            value: exc,
            context_depth: 0,
        }
    }

    pub fn returning(value: Value) -> FinallyState {
        FinallyState {
            status: Self::STATUS_RETURN,
            value,
            context_depth: 0,
        }
    }

    pub fn branching(context_depth: u32, target_pc: u32) -> FinallyState {
        FinallyState {
            status: Self::STATUS_BRANCH,
            value: Value::int(target_pc as i64),
            context_depth,
        }
    }

    /// Decode this state block into the intent `LEAVE_FINALLY` should act
    /// on.
    pub fn intent(&self) -> FinallyIntent {
        match self.status {
            Self::STATUS_CONTINUE => FinallyIntent::Continue,
            Self::STATUS_RERAISE => FinallyIntent::Reraise,
            Self::STATUS_RETURN => FinallyIntent::Return,
            Self::STATUS_BRANCH => FinallyIntent::Branch {
                context_depth: self.context_depth,
                target_pc: self.value.as_short_int().unwrap_or(0) as u32,
            },
            other => unreachable!("corrupt finally-state status byte: {other}"),
        }
    }
}

/// One stack frame's worth of unwind bookkeeping, threaded by the
/// interpreter's raise-and-unwind loop.
pub struct UnwindFrame {
    pub function_name: String,
    pub pc: u32,
}

/// Result of walking frames looking for a handler for `exc`
/// (`spec.md` §4.4): either a frame matched and execution should jump to
/// its handler PC, or the exception reaches the thread bottom.
pub enum UnwindOutcome {
    Handled { frame_depth: usize, handler_pc: u32 },
    PropagateToHost,
}

/// Walk `frames` (innermost last) looking for the first (innermost) one
/// whose `handler_for` returns a handler PC for its own recorded `pc`.
/// `handler_for` abstracts over `frame::FunctionInfo::handler_for` so this
/// module doesn't need to depend on the full `Frame` type.
pub fn unwind<'a>(
    frames: &'a [UnwindFrame],
    handler_for: impl Fn(usize, u32) -> Option<u32>,
) -> UnwindOutcome {
    for depth in (0..frames.len()).rev() {
        if let Some(handler_pc) = handler_for(depth, frames[depth].pc) {
            return UnwindOutcome::Handled {
                frame_depth: depth,
                handler_pc,
            };
        }
    }
    UnwindOutcome::PropagateToHost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finally_state_round_trips_each_intent() {
        assert_eq!(FinallyState::continue_normally().intent(), FinallyIntent::Continue);
        assert_eq!(
            FinallyState::reraise(Value::int(1)).intent(),
            FinallyIntent::Reraise
        );
        assert_eq!(
            FinallyState::returning(Value::int(7)).intent(),
            FinallyIntent::Return
        );
        assert_eq!(
            FinallyState::branching(2, 40).intent(),
            FinallyIntent::Branch {
                context_depth: 2,
                target_pc: 40
            }
        );
    }

    #[test]
    fn unwind_finds_innermost_matching_handler() {
        let frames = vec![
            UnwindFrame { function_name: "outer".into(), pc: 3 },
            UnwindFrame { function_name: "inner".into(), pc: 5 },
        ];
        let outcome = unwind(&frames, |depth, pc| if depth == 1 && pc == 5 { Some(99) } else { None });
        match outcome {
            UnwindOutcome::Handled { frame_depth, handler_pc } => {
                assert_eq!(frame_depth, 1);
                assert_eq!(handler_pc, 99);
            }
            UnwindOutcome::PropagateToHost => panic!("expected a handled outcome"),
        }
    }

    #[test]
    fn unwind_with_no_match_propagates_to_host() {
        let frames = vec![UnwindFrame { function_name: "f".into(), pc: 0 }];
        assert!(matches!(unwind(&frames, |_, _| None), UnwindOutcome::PropagateToHost));
    }
}
