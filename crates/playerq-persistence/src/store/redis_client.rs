//! # Redis Store
//!
//! [`StateStore`] on Redis. Each batch runs as a single Lua script: a first
//! pass type-checks every op against the key it touches, and only if all of
//! them pass does the second pass write. Redis runs a script without
//! interleaving other clients, so the reverse-index purge reads the player's
//! field list in the same atomic step that removes it.
//!
//! Index keys are derived inside the script, so batches are not declared to
//! the server key by key. This suits a single node, not Redis Cluster.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Cmd};

use super::traits::{Batch, BatchOp, StateStore};
use crate::config::RedisConfig;
use crate::error::Result;

/// ARGV is a flat run of `<op> <key> <operands...>` groups.
const BATCH_SCRIPT: &str = r"
local arity = { SET = 2, DEL = 1, ZADD = 3, ZREM = 2, ZINCRBY = 3, SADD = 2, PURGE = 3 }
local expects = { SET = 'string', ZADD = 'zset', ZREM = 'zset', ZINCRBY = 'zset', SADD = 'set', PURGE = 'set' }

local kinds = {}
local i = 1
while i <= #ARGV do
  local op, key = ARGV[i], ARGV[i + 1]
  if kinds[key] == nil then
    kinds[key] = redis.call('TYPE', key)['ok']
  end
  local want = expects[op]
  if want and kinds[key] ~= 'none' and kinds[key] ~= want then
    return redis.error_reply('WRONGTYPE Operation against a key holding the wrong kind of value: ' .. key)
  end
  if op == 'DEL' or op == 'PURGE' then
    kinds[key] = 'none'
  else
    kinds[key] = want
  end
  i = i + 1 + arity[op]
end

i = 1
while i <= #ARGV do
  local op, key = ARGV[i], ARGV[i + 1]
  if op == 'SET' then
    redis.call('SET', key, ARGV[i + 2])
  elseif op == 'DEL' then
    redis.call('DEL', key)
  elseif op == 'ZADD' then
    redis.call('ZADD', key, ARGV[i + 3], ARGV[i + 2])
  elseif op == 'ZREM' then
    redis.call('ZREM', key, ARGV[i + 2])
  elseif op == 'ZINCRBY' then
    redis.call('ZINCRBY', key, ARGV[i + 3], ARGV[i + 2])
  elseif op == 'SADD' then
    redis.call('SADD', key, ARGV[i + 2])
  elseif op == 'PURGE' then
    local prefix, member = ARGV[i + 2], ARGV[i + 3]
    for _, field in ipairs(redis.call('SMEMBERS', key)) do
      local index = prefix .. field
      if redis.call('TYPE', index)['ok'] == 'zset' then
        redis.call('ZREM', index, member)
      end
    end
    redis.call('DEL', key)
  end
  i = i + 1 + arity[op]
end
return 0
";

/// Redis state store over a managed connection
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect using the given configuration
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        tracing::debug!(url = %config.url, "Redis state store connected");
        Ok(Self { conn })
    }
}

/// Flatten a batch into the script's ARGV.
pub(crate) fn batch_args(batch: &Batch) -> Vec<String> {
    let mut args = Vec::new();
    for op in batch.ops() {
        match op {
            BatchOp::Set { key, value } => {
                args.extend(["SET".to_string(), key.clone(), value.clone()]);
            }
            BatchOp::Delete { key } => args.extend(["DEL".to_string(), key.clone()]),
            BatchOp::SortedSetAdd { key, member, score } => {
                args.extend(["ZADD".to_string(), key.clone(), member.clone(), score.to_string()]);
            }
            BatchOp::SortedSetRemove { key, member } => {
                args.extend(["ZREM".to_string(), key.clone(), member.clone()]);
            }
            BatchOp::SortedSetIncrement { key, member, delta } => {
                args.extend(["ZINCRBY".to_string(), key.clone(), member.clone(), delta.to_string()]);
            }
            BatchOp::SetAdd { key, member } => {
                args.extend(["SADD".to_string(), key.clone(), member.clone()]);
            }
            BatchOp::PurgeIndexed {
                reverse_key,
                index_prefix,
                member,
            } => {
                args.extend([
                    "PURGE".to_string(),
                    reverse_key.clone(),
                    index_prefix.clone(),
                    member.clone(),
                ]);
            }
        }
    }
    args
}

/// The `EVAL` command that applies a batch.
pub(crate) fn batch_command(batch: &Batch) -> Cmd {
    let mut cmd = redis::cmd("EVAL");
    cmd.arg(BATCH_SCRIPT).arg(0).arg(batch_args(batch));
    cmd
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn sorted_set(&self, key: &str) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        let members: Vec<(String, f64)> = conn.zrange_withscores(key, 0, -1).await?;
        Ok(members)
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn.zscore(key, member).await?;
        Ok(score)
    }

    async fn execute(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();

        let _: () = batch_command(&batch).query_async(&mut conn).await?;
        Ok(())
    }
}
