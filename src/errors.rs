//! Error Types
//!
//! This module defines the error types used throughout the compositor core.
//!
//! # Overview
//!
//! The main error type [`VidmixError`] covers all failure modes including:
//! - GPU object and memory allocation failures
//! - Command submission failures
//! - Completion-signal errors
//! - Unsupported render configurations
//!
//! All public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, VidmixError>`.
//!
//! A bounded wait that runs out of time is *not* an error: waits report
//! `Ok(false)` on timeout, since a caller choosing a bounded wait has opted
//! into polling semantics.

use thiserror::Error;

/// The main error type for the compositor core.
#[derive(Error, Debug)]
pub enum VidmixError {
    // ========================================================================
    // GPU Resource Errors
    // ========================================================================
    /// A GPU object or memory allocation failed.
    #[error("GPU allocation failed: {0}")]
    AllocationFailed(String),

    /// A command submission was rejected by the device.
    #[error("Command submission failed: {0}")]
    SubmissionFailed(String),

    /// A completion signal could not be created, reset or waited on.
    #[error("Completion signal error: {0}")]
    SignalError(String),

    /// No compatible render configuration can be derived from a descriptor.
    ///
    /// Surfaced before any resource is pooled against that descriptor.
    #[error("Unsupported render configuration: {0}")]
    UnsupportedConfig(String),

    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// A plane index was outside the frame's plane count.
    #[error("Plane index out of bounds: {plane} (frame has {count} planes)")]
    PlaneIndexOutOfBounds {
        /// The requested plane index
        plane: usize,
        /// Number of planes in the frame
        count: usize,
    },

    /// An operation was attempted on a resource with in-flight GPU work.
    #[error("Resource is in flight: {0}")]
    ResourceInFlight(&'static str),

    // ========================================================================
    // I/O & Threading Errors
    // ========================================================================
    /// I/O error (e.g. the scheduler thread failed to spawn).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for `Result<T, VidmixError>`.
pub type Result<T> = std::result::Result<T, VidmixError>;
