// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for the table store: the handful of commands the client
//! issues, the replies it reads back, and the push messages delivered on
//! subscribed connections.
//!
//! This crate is pure: no sockets, no threads. `natar-store-client` owns I/O.

pub mod keys;
pub mod wire;

pub use keys::{suffix, ChannelKey};
pub use wire::{decode_reply, encode_command, Reply, WireError};

/// Default store host when no preference is saved.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default store port when no preference is saved.
pub const DEFAULT_PORT: u16 = 6379;

/// Commands issued by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `GET key`
    Get {
        /// Key to read.
        key: &'a str,
    },
    /// `SET key value`
    Set {
        /// Key to write.
        key: &'a str,
        /// Raw value bytes.
        value: &'a [u8],
    },
    /// `PUBLISH channel payload`
    Publish {
        /// Topic name.
        channel: &'a str,
        /// Raw payload bytes.
        payload: &'a [u8],
    },
    /// `SUBSCRIBE channel`
    Subscribe {
        /// Topic name.
        channel: &'a str,
    },
    /// `UNSUBSCRIBE channel`
    Unsubscribe {
        /// Topic name.
        channel: &'a str,
    },
    /// `PING`
    Ping,
}

impl Command<'_> {
    /// Command verb as sent on the wire.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Publish { .. } => "PUBLISH",
            Command::Subscribe { .. } => "SUBSCRIBE",
            Command::Unsubscribe { .. } => "UNSUBSCRIBE",
            Command::Ping => "PING",
        }
    }

    /// Encode into a request frame.
    pub fn encode(&self) -> Vec<u8> {
        let verb = self.verb().as_bytes();
        match *self {
            Command::Get { key } => encode_command(&[verb, key.as_bytes()]),
            Command::Set { key, value } => encode_command(&[verb, key.as_bytes(), value]),
            Command::Publish { channel, payload } => {
                encode_command(&[verb, channel.as_bytes(), payload])
            }
            Command::Subscribe { channel } | Command::Unsubscribe { channel } => {
                encode_command(&[verb, channel.as_bytes()])
            }
            Command::Ping => encode_command(&[verb]),
        }
    }
}

/// Message published on a channel this connection subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// Channel the message arrived on.
    pub channel: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Frames that arrive unsolicited on a subscribed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Push {
    /// A published message.
    Message(PushMessage),
    /// Subscription confirmed; `count` is the connection's active subscription count.
    Subscribed {
        /// Channel confirmed.
        channel: String,
        /// Active subscriptions on this connection.
        count: i64,
    },
    /// Unsubscription confirmed.
    Unsubscribed {
        /// Channel released.
        channel: String,
        /// Remaining subscriptions on this connection.
        count: i64,
    },
}

impl Push {
    /// Interpret a decoded frame as a push. Returns `None` for anything that
    /// is not a three-element `message`/`subscribe`/`unsubscribe` array.
    pub fn from_reply(reply: Reply) -> Option<Self> {
        let Reply::Array(Some(items)) = reply else {
            return None;
        };
        let [kind, channel, third]: [Reply; 3] = items.try_into().ok()?;
        let kind = kind.into_bytes()?;
        let channel = String::from_utf8(channel.into_bytes()?).ok()?;
        match (kind.as_slice(), third) {
            (b"message", payload) => Some(Push::Message(PushMessage {
                channel,
                payload: payload.into_bytes()?,
            })),
            (b"subscribe", Reply::Integer(count)) => Some(Push::Subscribed { channel, count }),
            (b"unsubscribe", Reply::Integer(count)) => Some(Push::Unsubscribed { channel, count }),
            _ => None,
        }
    }

    /// Wire form of a published message, as a server delivers it.
    pub fn encode_message(channel: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + channel.len() + 32);
        Reply::Array(Some(vec![
            Reply::Bulk(Some(b"message".to_vec())),
            Reply::Bulk(Some(channel.as_bytes().to_vec())),
            Reply::Bulk(Some(payload.to_vec())),
        ]))
        .encode(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_ack_is_recognized() {
        let reply = Reply::Array(Some(vec![
            Reply::Bulk(Some(b"subscribe".to_vec())),
            Reply::Bulk(Some(b"camera0".to_vec())),
            Reply::Integer(1),
        ]));
        assert_eq!(
            Push::from_reply(reply),
            Some(Push::Subscribed {
                channel: "camera0".into(),
                count: 1
            })
        );
    }

    #[test]
    fn message_push_carries_binary_payload() {
        let wire = Push::encode_message("camera0:depth", &[0x00, 0xff, 0x0d, 0x0a]);
        let (reply, _) = decode_reply(&wire).unwrap().unwrap();
        match Push::from_reply(reply) {
            Some(Push::Message(m)) => {
                assert_eq!(m.channel, "camera0:depth");
                assert_eq!(m.payload, vec![0x00, 0xff, 0x0d, 0x0a]);
            }
            other => panic!("expected message push, got {other:?}"),
        }
    }

    #[test]
    fn non_push_replies_are_ignored() {
        assert_eq!(Push::from_reply(Reply::Status("OK".into())), None);
        assert_eq!(
            Push::from_reply(Reply::Array(Some(vec![Reply::Integer(1)]))),
            None
        );
    }

    #[test]
    fn set_encodes_binary_value() {
        let bytes = Command::Set {
            key: "k",
            value: &[1, 2],
        }
        .encode();
        assert_eq!(bytes, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$2\r\n\x01\x02\r\n".to_vec());
    }
}
