//! Explicit finite-state machine for resource lifecycles.
//!
//! The table of legal (from-state, event) -> to-state mappings is the only
//! way a resource's state may change. `apply` returns the next state or a
//! conflict error; persisting the result is the caller's responsibility,
//! which lets the state column act as a single-writer gate: a transition
//! task asserts the expected source state and aborts on mismatch instead of
//! silently overwriting.

pub mod orchestrator;

use thiserror::Error;

use crate::db::enums::ResourceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    BeginCreating,
    ScheduleUpdate,
    BeginUpdating,
    ScheduleDeletion,
    BeginDeleting,
    SetOk,
    SetErred,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Illegal transition {event:?} from state {from}")]
pub struct StateConflictError {
    pub from: ResourceState,
    pub event: LifecycleEvent,
}

/// Apply `event` in state `from`, returning the next state.
pub fn apply(from: ResourceState, event: LifecycleEvent) -> Result<ResourceState, StateConflictError> {
    use LifecycleEvent::*;
    use ResourceState::*;

    let next = match (from, event) {
        (Ok, ScheduleUpdate) => UpdateScheduled,
        // Deletion may be scheduled from any stable state, including Erred:
        // destroy-after-erred must always be possible.
        (Ok, ScheduleDeletion) | (Erred, ScheduleDeletion) => DeletionScheduled,

        (CreationScheduled, BeginCreating) => Creating,
        (UpdateScheduled, BeginUpdating) => Updating,
        (DeletionScheduled, BeginDeleting) => Deleting,

        (Creating, SetOk) | (Updating, SetOk) => Ok,

        // Any in-flight or scheduled step may fail.
        (CreationScheduled, SetErred)
        | (Creating, SetErred)
        | (UpdateScheduled, SetErred)
        | (Updating, SetErred)
        | (DeletionScheduled, SetErred)
        | (Deleting, SetErred) => Erred,

        _ => return Err(StateConflictError { from, event }),
    };
    std::result::Result::Ok(next)
}

/// Initial state for a freshly created resource record.
pub fn initial_state() -> ResourceState {
    ResourceState::CreationScheduled
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent::*;
    use ResourceState::*;

    #[test]
    fn test_creation_chain() {
        let s = initial_state();
        let s = apply(s, BeginCreating).unwrap();
        assert_eq!(s, Creating);
        let s = apply(s, SetOk).unwrap();
        assert_eq!(s, Ok);
    }

    #[test]
    fn test_update_chain() {
        let s = apply(Ok, ScheduleUpdate).unwrap();
        let s = apply(s, BeginUpdating).unwrap();
        assert_eq!(s, Updating);
        assert_eq!(apply(s, SetOk).unwrap(), Ok);
    }

    #[test]
    fn test_deletion_chain() {
        let s = apply(Ok, ScheduleDeletion).unwrap();
        let s = apply(s, BeginDeleting).unwrap();
        assert_eq!(s, Deleting);
    }

    #[test]
    fn test_deletion_allowed_from_erred() {
        assert_eq!(apply(Erred, ScheduleDeletion).unwrap(), DeletionScheduled);
    }

    #[test]
    fn test_failures_reach_erred() {
        for from in [CreationScheduled, Creating, UpdateScheduled, Updating, DeletionScheduled, Deleting] {
            assert_eq!(apply(from, SetErred).unwrap(), Erred);
        }
    }

    #[test]
    fn test_conflicting_transition_is_rejected() {
        // A second concurrent creation task must not re-enter Creating.
        let err = apply(Creating, BeginCreating).unwrap_err();
        assert_eq!(err.from, Creating);

        // Erred is terminal except for deletion scheduling.
        assert!(apply(Erred, SetOk).is_err());
        assert!(apply(Erred, BeginCreating).is_err());
        // Ok cannot fail spontaneously.
        assert!(apply(Ok, SetErred).is_err());
    }
}
