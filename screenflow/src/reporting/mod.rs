//! Reporting over persisted artifacts.
//!
//! Reporting reads stage artifacts through [`crate::store::ArtifactStore`]
//! and never touches in-memory pipeline state.

mod funnel;

pub use funnel::{funnel, render_funnel, FunnelRow};
