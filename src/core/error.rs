// SPDX-License-Identifier: MIT

//! Error types for preferences management.

use thiserror::Error;

use crate::core::types::ValueKind;

/// Errors that can occur when interacting with preferences.
#[derive(Debug, Error)]
pub enum PrefError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    /// The host store refused an operation.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: ValueKind, got: ValueKind },

    /// A proxy index points outside the persisted sequence.
    #[error("index {index} out of range for `{key}` (length {len})")]
    IndexOutOfRange {
        key: String,
        index: usize,
        len: usize,
    },

    /// A proxy was handed to a list it does not belong to.
    #[error("proxy for `{proxy_key}` used with list `{key}`")]
    ForeignProxy { key: String, proxy_key: String },

    /// A proxy was edited after being removed from its list.
    #[error("proxy was removed from `{0}`")]
    DetachedProxy(String),

    /// A proxy of the list is mutably borrowed by the caller.
    #[error("a proxy of `{0}` is already borrowed")]
    ProxyBorrowed(String),

    #[error("unknown property `{name}` in section {section}")]
    UnknownProperty { section: String, name: String },

    #[error("property `{0}` is not a list")]
    NotAList(String),

    #[error("section {0} was not declared")]
    UnknownSection(String),

    #[error("section {0} declared twice")]
    DuplicateSection(String),

    #[error("preference defaults were already registered with the store")]
    RegistryCommitted,

    #[error("preferences are already installed on this thread")]
    AlreadyInstalled,

    #[error("invalid {kind} value: {raw}")]
    InvalidValue { kind: String, raw: String },
}

/// Result type for preferences operations.
pub type Result<T> = std::result::Result<T, PrefError>;
