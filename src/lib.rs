//! ghwatch: alerts when rostered GitHub accounts are suspended.
//!
//! One pass per invocation: load the roster, probe every distinct username
//! against the GitHub API concurrently, fold suspensions back into the
//! group/project hierarchy and post an alert to a webhook. Scheduling
//! repeated passes is left to cron, a systemd timer or CI.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;
pub mod roster;

pub mod probe;
pub mod reconcile;
pub mod source;

pub mod notify;
pub mod run;
