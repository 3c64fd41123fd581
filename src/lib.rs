//! Recurring compliance tracking.
//!
//! Requirements move through a small status machine ([`transition`]). Completing
//! one that lists required documents is gated on uploads tagged for the same
//! recurrence period ([`period`], [`gate`]). Status changes fan out to admin
//! notifications and a queued email batch ([`notify`]), all through the
//! [`store::RecordStore`] boundary driven by [`service::ComplianceService`].

pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod notify;
pub mod period;
pub mod requirement;
pub mod service;
pub mod store;
pub mod template;
pub mod transition;
pub mod utils;
