/// Per-class availability state for a booking view
///
/// - `view_model`: pure derived state, mutated only by applying events
/// - `activity`: bounded newest-first log
/// - `binding`: wires a view model to the dispatcher and the registry
pub mod activity;
pub mod binding;
pub mod view_model;

pub use activity::RollingLog;
pub use binding::AvailabilityBinding;
pub use view_model::{
    ActivityEntry, AvailabilityNotice, AvailabilitySnapshot, AvailabilityState,
    AvailabilityViewModel, StatusTier,
};
