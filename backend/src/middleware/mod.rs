//! Request middleware.
//!
//! Purpose: Give every request a trace id so a whole sync run can be
//! correlated across log lines and the HTTP response.

pub mod trace;

pub use trace::Trace;
