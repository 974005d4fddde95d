//! VMForge — VM request lifecycle bounded context.
//!
//! Responsible for the event-sourced request aggregate (pending, approval,
//! cancellation, provisioning progress), its command and query handlers,
//! and the ports those handlers consume (quota, notification, timeline).

pub mod application;
pub mod domain;
