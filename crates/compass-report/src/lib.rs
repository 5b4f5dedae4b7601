//! compass-report: presentation data and report documents.
//!
//! Everything here is derived from stored cluster scores: percentage
//! insights, radar-chart geometry and a chart dataset. [`document`] assembles
//! them into a report and hands it to a [`document::DocumentRenderer`].

pub mod chart;
pub mod document;
pub mod html;
pub mod insights;
pub mod radar;
