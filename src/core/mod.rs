// SPDX-License-Identifier: MIT

//! Value model, errors and the CoreFoundation bridge.

#[cfg(target_os = "macos")]
pub(crate) mod convert;
pub mod error;
#[cfg(target_os = "macos")]
pub(crate) mod foundation;
pub mod types;
