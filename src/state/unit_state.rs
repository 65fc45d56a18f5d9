/// Crawl unit state definitions
///
/// This module defines the atomic schedulable item of a crawl — one
/// (store, category) pagination lane — and the states its page fetches
/// move through.
use crate::catalog::{CategoryId, StoreId};
use std::fmt;

/// The first page cursor of every category pagination sequence
pub const FIRST_PAGE: u32 = 1;

/// The atomic schedulable work item: one page fetch for a category at a store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlUnit {
    /// The store this fetch targets
    pub store: StoreId,

    /// The canonical category identifier
    pub category: CategoryId,

    /// The page cursor, starting at [`FIRST_PAGE`] and strictly increasing
    pub cursor: u32,
}

impl CrawlUnit {
    pub fn new(store: StoreId, category: CategoryId, cursor: u32) -> Self {
        Self {
            store,
            category,
            cursor,
        }
    }
}

impl fmt::Display for CrawlUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "store {} / category {} / page {}",
            self.store, self.category, self.cursor
        )
    }
}

/// Represents the current state of a (store, category) unit
///
/// Retry counts and skip reasons live in the checkpoint record alongside the
/// state tag, so transitions stay observable independent of timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    // ===== Active States =====
    /// The next page cursor is waiting to be fetched
    Pending,

    /// A page fetch for this unit is currently executing
    InFlight,

    // ===== Terminal States =====
    /// The category reported no more pages for this store; closed permanently
    Done,

    /// The last fetch attempt failed; terminal once the retry budget is spent
    Failed,

    /// Excluded by configuration; never fetched
    Skipped,
}

impl UnitState {
    /// Returns true if no further fetches will be scheduled for this unit
    ///
    /// `Failed` is only terminal once the retry budget is exhausted; that
    /// decision belongs to the scheduler, which reads the retry count.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Returns true if the unit may still produce fetches
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InFlight | Self::Failed)
    }

    /// Whether a transition to `next` moves forward in the state machine
    ///
    /// Transitions are monotonic forward except `InFlight -> Pending`, which
    /// is only legal as a crash-recovery requeue, and `Failed -> Pending`
    /// for a retry. Nothing ever leaves `Done` or `Skipped`.
    pub fn may_advance_to(&self, next: UnitState) -> bool {
        match self {
            Self::Pending => matches!(next, Self::InFlight | Self::Skipped),
            Self::InFlight => matches!(next, Self::Done | Self::Failed | Self::Pending),
            Self::Failed => matches!(next, Self::Pending | Self::Failed),
            Self::Done | Self::Skipped => false,
        }
    }

    /// Converts the unit state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a unit state from its database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Returns all possible unit states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::InFlight,
            Self::Done,
            Self::Failed,
            Self::Skipped,
        ]
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!UnitState::Pending.is_terminal());
        assert!(!UnitState::InFlight.is_terminal());
        assert!(!UnitState::Failed.is_terminal());

        assert!(UnitState::Done.is_terminal());
        assert!(UnitState::Skipped.is_terminal());
    }

    #[test]
    fn test_is_active() {
        assert!(UnitState::Pending.is_active());
        assert!(UnitState::InFlight.is_active());
        assert!(UnitState::Failed.is_active());

        assert!(!UnitState::Done.is_active());
        assert!(!UnitState::Skipped.is_active());
    }

    #[test]
    fn test_done_never_regresses() {
        for next in UnitState::all_states() {
            assert!(!UnitState::Done.may_advance_to(next));
            assert!(!UnitState::Skipped.may_advance_to(next));
        }
    }

    #[test]
    fn test_in_flight_requeue_is_legal() {
        assert!(UnitState::InFlight.may_advance_to(UnitState::Pending));
        assert!(UnitState::InFlight.may_advance_to(UnitState::Done));
        assert!(UnitState::InFlight.may_advance_to(UnitState::Failed));
    }

    #[test]
    fn test_failed_retries_back_to_pending() {
        assert!(UnitState::Failed.may_advance_to(UnitState::Pending));
        assert!(!UnitState::Failed.may_advance_to(UnitState::Done));
        assert!(!UnitState::Failed.may_advance_to(UnitState::InFlight));
    }

    #[test]
    fn test_pending_transitions() {
        assert!(UnitState::Pending.may_advance_to(UnitState::InFlight));
        assert!(UnitState::Pending.may_advance_to(UnitState::Skipped));
        assert!(!UnitState::Pending.may_advance_to(UnitState::Done));
    }

    #[test]
    fn test_roundtrip_db_string() {
        for state in UnitState::all_states() {
            let db_str = state.to_db_string();
            let parsed = UnitState::from_db_string(db_str);
            assert_eq!(Some(state), parsed, "Failed roundtrip for {:?}", state);
        }
    }

    #[test]
    fn test_from_db_string_unknown() {
        assert_eq!(UnitState::from_db_string("fetching"), None);
        assert_eq!(UnitState::from_db_string(""), None);
    }

    #[test]
    fn test_unit_display() {
        let unit = CrawlUnit::new(StoreId::new("4588"), CategoryId(1203), 2);
        assert_eq!(format!("{}", unit), "store 4588 / category 1203 / page 2");
    }
}
