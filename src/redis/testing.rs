use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redis::{Cmd, Pipeline, RedisResult, Value as RedisValue};

use super::connection::RedisConnection;
use super::transport::{RedisConnector, RedisSession};
use crate::connection::Endpoint;
use crate::error::StoreError;

type Responder = dyn Fn(&[String]) -> RedisResult<RedisValue> + Send + Sync;

#[derive(Default)]
struct FakeState {
    sent: Vec<Vec<String>>,
    urls: Vec<String>,
    fail_connects: u32,
    abort_exec: bool,
}

/// In-memory stand-in for a Redis server: records every command and answers through a
/// per-test responder.
#[derive(Clone)]
pub(crate) struct FakeRedis {
    state: Arc<Mutex<FakeState>>,
    responder: Arc<Responder>,
}

pub(crate) fn data(text: &str) -> RedisValue {
    RedisValue::Data(text.as_bytes().to_vec())
}

/// Decode RESP arrays back into argument lists; arguments must not contain CRLF.
fn unpack(packed: &[u8]) -> Vec<Vec<String>> {
    let text = String::from_utf8_lossy(packed).into_owned();
    let mut lines = text.split("\r\n");
    let mut commands = Vec::new();
    while let Some(header) = lines.next() {
        let Some(count) = header.strip_prefix('*') else {
            break;
        };
        let count: usize = count.parse().unwrap();
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            lines.next();
            args.push(lines.next().unwrap().to_string());
        }
        commands.push(args);
    }
    commands
}

impl FakeRedis {
    pub(crate) fn new(
        responder: impl Fn(&[String]) -> RedisResult<RedisValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            responder: Arc::new(responder),
        }
    }

    /// Answers `OK` to everything.
    pub(crate) fn ok() -> Self {
        Self::new(|_| Ok(RedisValue::Okay))
    }

    pub(crate) fn failing_connects(self, times: u32) -> Self {
        self.state.lock().unwrap().fail_connects = times;
        self
    }

    /// Make every MULTI/EXEC block come back nil, as when a watched key changed.
    pub(crate) fn abort_exec(&self) {
        self.state.lock().unwrap().abort_exec = true;
    }

    pub(crate) fn sent(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().sent.clone()
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.sent().into_iter().map(|args| args.join(" ")).collect()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().urls.clone()
    }

    pub(crate) fn connection(&self) -> RedisConnection {
        let mut endpoint = Endpoint::new();
        endpoint.set_host("localhost").unwrap().set_port(6379).unwrap();
        RedisConnection::with_connector(endpoint, Arc::new(self.clone()))
    }
}

#[async_trait]
impl RedisConnector for FakeRedis {
    async fn connect(&self, url: &str) -> Result<Box<dyn RedisSession>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.urls.push(url.to_string());
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(StoreError::Connect("connection refused".into()));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RedisSession for FakeRedis {
    async fn request(&mut self, cmd: &Cmd) -> RedisResult<RedisValue> {
        let args = unpack(&cmd.get_packed_command()).remove(0);
        self.state.lock().unwrap().sent.push(args.clone());
        (self.responder)(&args)
    }

    async fn request_pipeline(&mut self, pipeline: &Pipeline) -> RedisResult<RedisValue> {
        let commands = unpack(&pipeline.get_packed_pipeline());
        let atomic = commands.first().is_some_and(|args| args[0] == "MULTI");
        let abort = {
            let mut state = self.state.lock().unwrap();
            state.sent.extend(commands.iter().cloned());
            state.abort_exec
        };
        if atomic && abort {
            return Ok(RedisValue::Nil);
        }
        let mut replies = Vec::new();
        for args in &commands {
            if args[0] == "MULTI" || args[0] == "EXEC" {
                continue;
            }
            replies.push((self.responder)(args)?);
        }
        Ok(RedisValue::Bulk(replies))
    }
}
