// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, dead_code)]
//! Loopback store fake speaking the same wire protocol as the real server.

use natar_store_proto::{decode_reply, Push, Reply};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct State {
    values: HashMap<Vec<u8>, Vec<u8>>,
    subscribers: Vec<(Vec<u8>, Option<SocketAddr>, TcpStream)>,
}

pub struct FakeStore {
    pub port: u16,
    state: Arc<Mutex<State>>,
}

impl FakeStore {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for conn in listener.incoming() {
                let Ok(conn) = conn else { break };
                let state = Arc::clone(&shared);
                thread::spawn(move || serve(conn, &state));
            }
        });
        Self { port, state }
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .subscribers
            .iter()
            .filter(|(c, _, _)| c == channel.as_bytes())
            .count()
    }
}

fn serve(conn: TcpStream, state: &Mutex<State>) {
    let peer = conn.peer_addr().ok();
    run(conn, state);
    // Connection gone: its subscriptions go with it.
    state
        .lock()
        .unwrap()
        .subscribers
        .retain(|(_, p, _)| *p != peer);
}

fn run(mut conn: TcpStream, state: &Mutex<State>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        while let Ok(Some((frame, used))) = decode_reply(&buf) {
            buf.drain(..used);
            let Reply::Array(Some(items)) = frame else {
                return;
            };
            let args: Vec<Vec<u8>> = items.into_iter().filter_map(Reply::into_bytes).collect();
            let reply = handle(&args, &conn, state);
            let mut out = Vec::new();
            reply.encode(&mut out);
            if conn.write_all(&out).is_err() {
                return;
            }
        }
        match conn.read(&mut chunk) {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn handle(args: &[Vec<u8>], conn: &TcpStream, state: &Mutex<State>) -> Reply {
    let mut state = state.lock().unwrap();
    match args {
        [verb] if verb == b"PING" => Reply::Status("PONG".into()),
        [verb, key] if verb == b"GET" => Reply::Bulk(state.values.get(key).cloned()),
        [verb, key, value] if verb == b"SET" => {
            state.values.insert(key.clone(), value.clone());
            Reply::Status("OK".into())
        }
        [verb, channel, payload] if verb == b"PUBLISH" => {
            let wire = Push::encode_message(&String::from_utf8_lossy(channel), payload);
            let mut delivered = 0;
            for (c, _, sub) in &mut state.subscribers {
                if c == channel && sub.write_all(&wire).is_ok() {
                    delivered += 1;
                }
            }
            Reply::Integer(delivered)
        }
        [verb, channel] if verb == b"SUBSCRIBE" => {
            if let Ok(writer) = conn.try_clone() {
                state
                    .subscribers
                    .push((channel.clone(), conn.peer_addr().ok(), writer));
            }
            ack("subscribe", channel, 1)
        }
        [verb, channel] if verb == b"UNSUBSCRIBE" => {
            let peer = conn.peer_addr().ok();
            state
                .subscribers
                .retain(|(c, p, _)| !(c == channel && *p == peer));
            ack("unsubscribe", channel, 0)
        }
        _ => Reply::Error("ERR unknown command".into()),
    }
}

fn ack(kind: &str, channel: &[u8], count: i64) -> Reply {
    Reply::Array(Some(vec![
        Reply::Bulk(Some(kind.as_bytes().to_vec())),
        Reply::Bulk(Some(channel.to_vec())),
        Reply::Integer(count),
    ]))
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}
