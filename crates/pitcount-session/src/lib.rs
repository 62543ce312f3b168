//! pitcount-session: Interactive counting model (sans-IO).
//!
//! Takes the descriptors produced by `pitcount-pipeline` and layers the
//! user's work on top of them: range filters, hand corrections, and the
//! zoom/pan view that both rendering and hit-testing go through.
//!
//! Nothing here touches a window, a timer, or a file. Callers feed in
//! pointer positions, slider values, and instants; they get back counts,
//! render sets, and edit outcomes.

pub mod annotation;
pub mod coalesce;
pub mod edit;
pub mod filter;
pub mod session;
pub mod view;

pub use annotation::{AnnotationState, Origin};
pub use coalesce::UpdateCoalescer;
pub use edit::{EditConfig, EditOutcome, dispatch};
pub use filter::{Domain, Evaluation, FilterDomains, RangeFilter, evaluate};
pub use session::{Frame, Mode, Session, SessionConfig};
pub use view::{DisplayRect, View, ViewConfig, ViewState};
