//! pc-collector: keeps the fragment store fed from the upstream feed.
//!
//! - [`Upstream`] abstracts the remote playcast source; [`HttpUpstream`] is
//!   the reqwest implementation.
//! - [`Collector`] bootstraps from the sync record, then polls full and
//!   delta fragments once per keyframe interval until cancelled.

pub mod collector;
pub mod upstream;

pub use collector::{collect_fragment, Collector, CollectorStats};
pub use upstream::{HttpUpstream, Upstream};
