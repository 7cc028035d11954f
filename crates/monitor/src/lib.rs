//! Vigil results monitor: keeps the result store fresh, derives the visible
//! list, and renders the selected record.
//!
//! Control flow: [`RefreshCoordinator`] fetches and replaces the store,
//! front ends redraw a [`ResultsFrame`] on each new version, and
//! [`ViewState`] reconciles the open selection before rendering its
//! [`DetailView`].

#![forbid(unsafe_code)]

pub mod config;
pub mod detail;
pub mod refresh;
pub mod schedule;
pub mod view;

pub use config::MonitorConfig;
pub use detail::{parse_details, render_detail, AnalysisDetails, DetailView, ParsedDetails, Score, FALLBACK_WARNING};
pub use refresh::{FetchOutcome, Phase, RefreshCoordinator, RefreshStatus};
pub use schedule::CancelHandle;
pub use view::{ResultRow, ResultsFrame, SummaryTiles, ViewState};
