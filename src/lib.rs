//! route-composer core
//!
//! Draft-side route construction and optimization reconciliation for a
//! delivery workspace: an editable stop list with time windows and
//! position pins, a remote optimizer behind a narrow contract, and the
//! reconciliation that folds full, partial and failed optimizer outcomes
//! back into the operator's draft.

pub mod backend;
pub mod directions;
pub mod directory;
pub mod draft;
pub mod model;
pub mod optimizer;
pub mod optimizer_data;
pub mod path;
pub mod policy;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod time_window;
pub mod traits;
