// SPDX-License-Identifier: Apache-2.0
//! Transport-level errors.

use thiserror::Error;

/// Errors raised while standing up or operating a [`crate::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// Binding the reliable or datagram socket failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
