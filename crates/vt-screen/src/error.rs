// SPDX-License-Identifier: MIT
//
// Error type for the screen engine.

use std::io;

use thiserror::Error;

use crate::response::ResponseKind;

/// Everything that can go wrong while driving a terminal.
#[derive(Debug, Error)]
pub enum Error {
    /// Writing to the output sink failed.
    #[error("terminal i/o: {0}")]
    Io(#[from] io::Error),

    /// A query's reply did not arrive before its deadline.
    #[error("timed out waiting for {} response", .kind.name())]
    ResponseTimeout { kind: ResponseKind },

    /// The terminal replied, but with something this engine cannot interpret.
    #[error("unhandled {} response: {text}", .kind.name())]
    UnhandledResponse { kind: ResponseKind, text: String },
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
