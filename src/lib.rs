#![forbid(unsafe_code)]

//! Shared library for the TubePulse binaries: a small toolkit that polls
//! YouTube channel statistics, classifies every upload as Movie, Short or
//! LiveArchive, and records per-video view/like/comment counts over time.

pub mod classify;
pub mod config;
pub mod history;
pub mod milestones;
pub mod notify;
pub mod runner;
pub mod shorts;
pub mod store;
pub mod youtube;
