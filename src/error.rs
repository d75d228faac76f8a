//! Error types for the clipboard history engine.

use crate::types::{ItemId, Rejection};
use thiserror::Error;

/// Main error type for history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Content rejected: {0}")]
    Rejected(Rejection),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Save did not verify on read-back: {0}")]
    PersistenceVerification(String),

    #[error("Persistence directory is locked by another process")]
    Locked,

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl HistoryError {
    /// Whether this error is an admission rejection rather than a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(self, HistoryError::Rejected(_))
    }
}

impl From<Rejection> for HistoryError {
    fn from(r: Rejection) -> Self {
        HistoryError::Rejected(r)
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        HistoryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for HistoryError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        HistoryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for HistoryError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        HistoryError::Deserialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for HistoryError {
    fn from(e: tokio::task::JoinError) -> Self {
        HistoryError::TaskFailed(e.to_string())
    }
}

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
