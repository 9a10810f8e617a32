use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::{Cmd, ToRedisArgs, cmd};
use tracing::debug;

use super::connection::{RedisConnection, flag_reply, reply_value};
use crate::error::{StoreError, is_transport_error};
use crate::types::Value;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Key lifetime for `PSETEX`: sub-millisecond TTLs round up to 1 ms, zero is refused.
fn ttl_millis(ttl: Duration) -> Result<u64, StoreError> {
    if ttl.is_zero() {
        return Err(StoreError::InvalidConfiguration(
            "key TTL must be greater than zero".to_string(),
        ));
    }
    Ok(millis(ttl).max(1))
}

fn script_cmd<A: ToRedisArgs>(name: &str, body: &str, args: &[A]) -> Cmd {
    let mut command = cmd(name);
    command.arg(body).arg(args.len());
    for arg in args {
        command.arg(arg);
    }
    command
}

/// Counters and strings.
impl RedisConnection {
    /// `INCRBY` when `by` is greater than 1, plain `INCR` otherwise. Returns the new value.
    ///
    /// # Errors
    /// Returns `StoreError::ImpossibleValue` when the key does not hold an integer.
    pub async fn incr(&mut self, key: &str, by: i64) -> Result<i64, StoreError> {
        let command = if by > 1 {
            cmd("INCRBY").arg(key).arg(by).clone()
        } else {
            cmd("INCR").arg(key).clone()
        };
        self.fetch(&command).await
    }

    /// `DECRBY` when `by` is greater than 1, plain `DECR` otherwise. Returns the new value.
    ///
    /// # Errors
    /// Returns `StoreError::ImpossibleValue` when the key does not hold an integer.
    pub async fn decr(&mut self, key: &str, by: i64) -> Result<i64, StoreError> {
        let command = if by > 1 {
            cmd("DECRBY").arg(key).arg(by).clone()
        } else {
            cmd("DECR").arg(key).clone()
        };
        self.fetch(&command).await
    }

    /// Returns the length of the string after appending.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn append(&mut self, key: &str, value: impl ToRedisArgs) -> Result<u64, StoreError> {
        self.fetch(cmd("APPEND").arg(key).arg(value)).await
    }

    /// # Errors
    /// Returns `StoreError::KeyNotFound` when the key does not exist.
    pub async fn get(&mut self, key: &str) -> Result<String, StoreError> {
        let value: Option<String> = self.fetch(cmd("GET").arg(key)).await?;
        value.ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Values for `keys`, in order; missing keys map to `None`.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn mget(&mut self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<Option<String>> = self.fetch(cmd("MGET").arg(keys)).await?;
        Ok(keys
            .iter()
            .map(|key| (*key).to_string())
            .zip(values)
            .collect())
    }

    /// `SET`, or `PSETEX` with millisecond resolution when a TTL is given. A TTL below one
    /// millisecond is sent as 1 ms.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` for a zero TTL, otherwise connection or
    /// reply errors.
    pub async fn set(
        &mut self,
        key: &str,
        value: impl ToRedisArgs,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let command = match ttl {
            Some(ttl) => cmd("PSETEX").arg(key).arg(ttl_millis(ttl)?).arg(value).clone(),
            None => cmd("SET").arg(key).arg(value).clone(),
        };
        self.flag(&command).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn mset<K: ToRedisArgs, V: ToRedisArgs>(
        &mut self,
        pairs: &[(K, V)],
    ) -> Result<bool, StoreError> {
        if pairs.is_empty() {
            return Ok(true);
        }
        self.flag(cmd("MSET").arg(pairs)).await
    }

    /// True when the key was created.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn setnx(&mut self, key: &str, value: impl ToRedisArgs) -> Result<bool, StoreError> {
        self.flag(cmd("SETNX").arg(key).arg(value)).await
    }

    /// True when every key was created; nothing is written if any key exists.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn msetnx<K: ToRedisArgs, V: ToRedisArgs>(
        &mut self,
        pairs: &[(K, V)],
    ) -> Result<bool, StoreError> {
        if pairs.is_empty() {
            return Ok(true);
        }
        self.flag(cmd("MSETNX").arg(pairs)).await
    }

    /// Set a new value and return the previous one.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn getset(
        &mut self,
        key: &str,
        value: impl ToRedisArgs,
    ) -> Result<Option<String>, StoreError> {
        self.fetch(cmd("GETSET").arg(key).arg(value)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn strlen(&mut self, key: &str) -> Result<u64, StoreError> {
        self.fetch(cmd("STRLEN").arg(key)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn getbit(&mut self, key: &str, offset: u64) -> Result<bool, StoreError> {
        self.flag(cmd("GETBIT").arg(key).arg(offset)).await
    }

    /// Set one bit and return its previous state.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn setbit(&mut self, key: &str, offset: u64, value: bool) -> Result<bool, StoreError> {
        self.flag(cmd("SETBIT").arg(key).arg(offset).arg(i32::from(value)))
            .await
    }
}

/// Server-side scripts.
impl RedisConnection {
    /// `EVAL` with every argument passed as a key (`numkeys` is `args.len()`).
    ///
    /// # Errors
    /// Returns `StoreError::ScriptExecution` when the server reports a script error.
    pub async fn evaluate<A: ToRedisArgs>(
        &mut self,
        script: &str,
        args: &[A],
    ) -> Result<Value, StoreError> {
        self.run_script(&script_cmd("EVAL", script, args)).await
    }

    /// `EVALSHA` for a script already loaded on the server.
    ///
    /// # Errors
    /// Returns `StoreError::ScriptExecution` when the server reports a script error, including
    /// an unknown hash.
    pub async fn eval_sha<A: ToRedisArgs>(
        &mut self,
        sha: &str,
        args: &[A],
    ) -> Result<Value, StoreError> {
        self.run_script(&script_cmd("EVALSHA", sha, args)).await
    }

    async fn run_script(&mut self, command: &Cmd) -> Result<Value, StoreError> {
        match self.exchange(command).await? {
            Ok(reply) => Ok(reply_value(reply)),
            Err(err) if is_transport_error(&err) => Err(err.into()),
            Err(err) => {
                debug!(error = %err, "redis script failed");
                Err(StoreError::ScriptExecution(err.to_string()))
            }
        }
    }
}

/// Sets and lists.
impl RedisConnection {
    /// Returns the number of members actually added.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn sadd(&mut self, key: &str, members: impl ToRedisArgs) -> Result<u64, StoreError> {
        self.fetch(cmd("SADD").arg(key).arg(members)).await
    }

    /// Returns the number of members actually removed.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn srem(&mut self, key: &str, members: impl ToRedisArgs) -> Result<u64, StoreError> {
        self.fetch(cmd("SREM").arg(key).arg(members)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn spop(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.fetch(cmd("SPOP").arg(key)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn srandmember(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.fetch(cmd("SRANDMEMBER").arg(key)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn scard(&mut self, key: &str) -> Result<u64, StoreError> {
        self.fetch(cmd("SCARD").arg(key)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn sismember(&mut self, key: &str, member: impl ToRedisArgs) -> Result<bool, StoreError> {
        self.flag(cmd("SISMEMBER").arg(key).arg(member)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn smembers(&mut self, key: &str) -> Result<Vec<String>, StoreError> {
        self.fetch(cmd("SMEMBERS").arg(key)).await
    }

    /// Store the difference of `keys` (first minus the rest) in `destination`; returns its size.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn sdiffstore(&mut self, destination: &str, keys: &[&str]) -> Result<u64, StoreError> {
        self.fetch(cmd("SDIFFSTORE").arg(destination).arg(keys)).await
    }

    /// Returns the list length after the push.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn lpush(&mut self, key: &str, values: impl ToRedisArgs) -> Result<u64, StoreError> {
        self.fetch(cmd("LPUSH").arg(key).arg(values)).await
    }

    /// Returns the list length after the push.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn rpush(&mut self, key: &str, values: impl ToRedisArgs) -> Result<u64, StoreError> {
        self.fetch(cmd("RPUSH").arg(key).arg(values)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn lpop(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.fetch(cmd("LPOP").arg(key)).await
    }

    /// # Errors
    /// Returns connection or reply errors.
    pub async fn rpop(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        self.fetch(cmd("RPOP").arg(key)).await
    }

    /// # Errors
    /// Returns `StoreError::ImpossibleValue` when the key holds something other than a list.
    pub async fn llen(&mut self, key: &str) -> Result<u64, StoreError> {
        self.fetch(cmd("LLEN").arg(key)).await
    }

    /// Returns the number of subscribers that received the message.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn publish(&mut self, channel: &str, message: impl ToRedisArgs) -> Result<u64, StoreError> {
        self.fetch(cmd("PUBLISH").arg(channel).arg(message)).await
    }
}

/// Key administration and database selection.
impl RedisConnection {
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        self.flag(cmd("EXISTS").arg(key)).await
    }

    /// False when `source` does not exist.
    ///
    /// # Errors
    /// Returns connection errors and server errors other than a missing source key.
    pub async fn rename(&mut self, source: &str, destination: &str) -> Result<bool, StoreError> {
        self.rename_with("RENAME", source, destination).await
    }

    /// False when `source` does not exist or `destination` already does.
    ///
    /// # Errors
    /// Returns connection errors and server errors other than a missing source key.
    pub async fn renamenx(&mut self, source: &str, destination: &str) -> Result<bool, StoreError> {
        self.rename_with("RENAMENX", source, destination).await
    }

    async fn rename_with(
        &mut self,
        name: &str,
        source: &str,
        destination: &str,
    ) -> Result<bool, StoreError> {
        match self.exchange(cmd(name).arg(source).arg(destination)).await? {
            Ok(reply) => flag_reply(&reply),
            Err(err) if err.to_string().contains("no such key") => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// `PEXPIRE`; false when the key does not exist.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.flag(cmd("PEXPIRE").arg(key).arg(millis(ttl))).await
    }

    /// `PEXPIREAT`; false when the key does not exist.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn expireat(&mut self, key: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.flag(cmd("PEXPIREAT").arg(key).arg(at.timestamp_millis()))
            .await
    }

    /// Remove the TTL; false when there was none or the key does not exist.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn persist(&mut self, key: &str) -> Result<bool, StoreError> {
        self.flag(cmd("PERSIST").arg(key)).await
    }

    /// Remaining time to live; `None` when the key has no TTL or does not exist.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn ttl(&mut self, key: &str) -> Result<Option<Duration>, StoreError> {
        let remaining: i64 = self.fetch(cmd("PTTL").arg(key)).await?;
        Ok(u64::try_from(remaining).ok().map(Duration::from_millis))
    }

    /// Returns the number of keys removed.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn delete(&mut self, keys: &[&str]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.fetch(cmd("DEL").arg(keys)).await
    }

    /// `KEYS pattern`. Blocks the server while it walks the keyspace; see
    /// [`RedisConnection::scan_match`] for large databases.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.fetch(cmd("KEYS").arg(pattern)).await
    }

    /// Walk the keyspace with `SCAN ... MATCH pattern` until the cursor returns to zero.
    /// Keys reported more than once are returned once, in first-seen order.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn scan_match(
        &mut self,
        pattern: &str,
        count: Option<usize>,
    ) -> Result<Vec<String>, StoreError> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let mut command = cmd("SCAN");
            command.arg(cursor).arg("MATCH").arg(pattern);
            if let Some(count) = count {
                command.arg("COUNT").arg(count);
            }
            let (next, batch): (u64, Vec<String>) = self.fetch(&command).await?;
            for key in batch {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            if next == 0 {
                return Ok(keys);
            }
            cursor = next;
        }
    }

    /// Switch the connection to database `index`; later reconnects keep it.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidConfiguration` for a negative index, or reply errors when
    /// the server rejects it.
    pub async fn select(&mut self, index: i64) -> Result<(), StoreError> {
        if index < 0 {
            return Err(StoreError::InvalidConfiguration(format!(
                "database index {index} is negative"
            )));
        }
        self.request(cmd("SELECT").arg(index)).await?;
        self.database = index;
        Ok(())
    }

    /// `FLUSHDB`: empty the selected database.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn flush_database(&mut self) -> Result<(), StoreError> {
        self.request(&cmd("FLUSHDB")).await.map(|_| ())
    }

    /// `FLUSHALL`: empty every database on the server.
    ///
    /// # Errors
    /// Returns connection or reply errors.
    pub async fn flush_instance(&mut self) -> Result<(), StoreError> {
        self.request(&cmd("FLUSHALL")).await.map(|_| ())
    }
}
