//! prescreen-report: Rendering of finished interview sessions.
//!
//! JSON and markdown output live on [`prescreen_core::report::InterviewReport`];
//! this crate adds a self-contained HTML page.

pub mod html;
