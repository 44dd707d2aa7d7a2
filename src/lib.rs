//! Job orchestration and monitoring for remote video transcoding.
//!
//! A caller submits a video (an object key in storage); the engine records a
//! job, starts one task on the execution backend, and polls that task until
//! it completes or fails. Job state lives in memory for the lifetime of the
//! [`JobService`].

pub mod backend;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod monitor;
pub mod service;
pub mod ui;

pub use error::JobError;
pub use service::JobService;
