// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Command sessions and push subscriptions over TCP.

use crate::{LinkConfig, StoreError, StoreHandle, Subscription};
use natar_store_proto::{decode_reply, ChannelKey, Command, Push, PushMessage, Reply};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

const READ_CHUNK: usize = 64 * 1024;

/// Accumulates socket bytes until a whole reply frame is buffered.
#[derive(Debug, Default)]
pub struct ReplyReader {
    buf: Vec<u8>,
    scratch: Vec<u8>,
}

impl ReplyReader {
    /// Empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from `src` until one reply is complete. Partial data survives a
    /// timeout and is resumed by the next call.
    pub fn next_reply<R: Read>(&mut self, src: &mut R) -> Result<Reply, StoreError> {
        if self.scratch.is_empty() {
            self.scratch.resize(READ_CHUNK, 0);
        }
        loop {
            if let Some((reply, used)) = decode_reply(&self.buf)? {
                self.buf.drain(..used);
                return Ok(reply);
            }
            let n = src.read(&mut self.scratch)?;
            if n == 0 {
                return Err(StoreError::Closed);
            }
            self.buf.extend_from_slice(&self.scratch[..n]);
        }
    }
}

/// A command connection: one socket, strictly request/reply.
#[derive(Debug)]
pub struct StoreSession {
    config: LinkConfig,
    stream: TcpStream,
    reader: ReplyReader,
}

impl StoreSession {
    /// Open a dedicated socket using `config`.
    pub fn connect(config: LinkConfig) -> Result<Self, StoreError> {
        let stream = config.open_stream()?;
        Ok(Self {
            config,
            stream,
            reader: ReplyReader::new(),
        })
    }

    fn call(&mut self, command: Command<'_>) -> Result<Reply, StoreError> {
        self.stream.write_all(&command.encode())?;
        match self.reader.next_reply(&mut self.stream)? {
            Reply::Error(msg) => Err(StoreError::Server(msg)),
            reply => Ok(reply),
        }
    }

    /// Round-trip a `PING`.
    pub fn ping(&mut self) -> Result<(), StoreError> {
        match self.call(Command::Ping)? {
            Reply::Status(s) if s == "PONG" => Ok(()),
            other => Err(unexpected("PING", &other)),
        }
    }
}

fn unexpected(command: &'static str, reply: &Reply) -> StoreError {
    StoreError::UnexpectedReply {
        command,
        reply: format!("{reply:?}"),
    }
}

impl StoreHandle for StoreSession {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.call(Command::Get { key })? {
            Reply::Bulk(value) => Ok(value),
            other => Err(unexpected("GET", &other)),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        match self.call(Command::Set { key, value })? {
            Reply::Status(_) => Ok(()),
            other => Err(unexpected("SET", &other)),
        }
    }

    fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<i64, StoreError> {
        match self.call(Command::Publish { channel, payload })? {
            Reply::Integer(receivers) => Ok(receivers),
            other => Err(unexpected("PUBLISH", &other)),
        }
    }

    /// Opens a second socket dedicated to the feed; a listener thread pushes
    /// messages into a bounded queue and drops them when the queue is full.
    fn subscribe(&mut self, channel: &ChannelKey) -> Result<Subscription, StoreError> {
        let mut stream = self.config.open_stream()?;
        stream.write_all(
            &Command::Subscribe {
                channel: channel.as_str(),
            }
            .encode(),
        )?;
        let mut reader = ReplyReader::new();
        loop {
            match Push::from_reply(reader.next_reply(&mut stream)?) {
                Some(Push::Subscribed { channel: ack, .. }) if ack == channel.as_str() => break,
                other => trace!(?other, "ignoring frame before subscribe ack"),
            }
        }

        let (tx, rx) = mpsc::sync_channel(self.config.queue_depth.max(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let control = stream.try_clone()?;
        let name = channel.to_string();
        thread::Builder::new()
            .name(format!("natar-sub-{name}"))
            .spawn({
                let cancelled = Arc::clone(&cancelled);
                move || listen(stream, reader, &tx, &cancelled)
            })?;
        debug!(channel = %name, "subscribed");

        Ok(Subscription::new(channel.clone(), rx, move || {
            cancelled.store(true, Ordering::SeqCst);
            let mut control = control;
            let unsubscribe = Command::Unsubscribe {
                channel: name.as_str(),
            }
            .encode();
            if let Err(err) = control.write_all(&unsubscribe) {
                debug!(channel = %name, ?err, "unsubscribe write failed");
            }
            let _ = control.shutdown(Shutdown::Both);
            debug!(channel = %name, "unsubscribed");
        }))
    }
}

/// Listener loop for one subscription socket. Exits when the peer closes,
/// the consumer drops its receiver, or the subscription is cancelled.
fn listen(
    mut stream: TcpStream,
    mut reader: ReplyReader,
    tx: &SyncSender<PushMessage>,
    cancelled: &AtomicBool,
) {
    while !cancelled.load(Ordering::SeqCst) {
        let reply = match reader.next_reply(&mut stream) {
            Ok(reply) => reply,
            Err(err) if err.is_timeout() => continue,
            Err(err) => {
                if !cancelled.load(Ordering::SeqCst) {
                    warn!(?err, "subscription feed lost");
                }
                return;
            }
        };
        match Push::from_reply(reply) {
            Some(Push::Message(msg)) => match tx.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(msg)) => {
                    trace!(channel = %msg.channel, "queue full, dropping message");
                }
                Err(TrySendError::Disconnected(_)) => return,
            },
            Some(Push::Unsubscribed { .. }) => return,
            Some(Push::Subscribed { .. }) | None => {}
        }
    }
}
