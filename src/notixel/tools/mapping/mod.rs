//! Mapping engine: the per-direction correspondence store, the recurring
//! selection, the unmatched-field detector, and the session that keeps them
//! consistent with each other.

pub mod invariants;
pub mod recurring;
pub mod session;
pub mod store;
pub mod unmatched;

pub use invariants::{Notice, enforce_invariants};
pub use recurring::RecurringSelection;
pub use session::{MappingRow, MappingSession, RecurringStatus, SessionView};
pub use store::MappingStore;
pub use unmatched::{UnmatchedFields, detect_unmatched};
