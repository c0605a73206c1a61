// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client error type.

use natar_store_proto::WireError;
use std::io;
use thiserror::Error;

/// Errors raised by the store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The shared link is not alive; no new handles are handed out.
    #[error("store link is down")]
    LinkDown,
    /// Socket-level failure (refused, reset, timed out).
    #[error("transport: {0}")]
    Io(#[from] io::Error),
    /// Reply stream lost framing sync.
    #[error("wire: {0}")]
    Wire(#[from] WireError),
    /// Peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
    /// Server answered with an error line.
    #[error("server error: {0}")]
    Server(String),
    /// Reply had a shape the command does not produce.
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        /// Command verb that was sent.
        command: &'static str,
        /// Debug rendering of what came back.
        reply: String,
    },
}

impl StoreError {
    /// True when the handle that produced this error is unusable and must be
    /// replaced (the connection itself failed, not the request).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::LinkDown | Self::Io(_) | Self::Wire(_) | Self::Closed
        )
    }

    /// True for read timeouts, which a blocking listener treats as "nothing yet".
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
        )
    }
}
