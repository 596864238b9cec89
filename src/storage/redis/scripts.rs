//! Lua scripts executed atomically by Redis

use redis::Script;

/// Prune, count, and conditionally insert into a sorted-set window.
///
/// KEYS[1] window key
/// ARGV[1] member, ARGV[2] limit, ARGV[3] cutoff score (inclusive),
/// ARGV[4] now score, ARGV[5] ttl seconds
///
/// Returns `{allowed, count}`.
const WINDOW_CHECK_AND_INSERT: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[2])
redis.call('ZREMRANGEBYSCORE', key, '-inf', ARGV[3])
local count = redis.call('ZCARD', key)
if count >= limit then
  return {0, count}
end
redis.call('ZADD', key, ARGV[4], ARGV[1])
redis.call('EXPIRE', key, ARGV[5])
return {1, redis.call('ZCARD', key)}
"#;

/// Add to a counter unless the new total would exceed the limit.
///
/// KEYS[1] counter key
/// ARGV[1] amount, ARGV[2] limit, ARGV[3] ttl seconds
///
/// Returns `{allowed, total}`.
const COUNTER_ADD_BOUNDED: &str = r#"
local key = KEYS[1]
local amount = tonumber(ARGV[1])
local total = redis.call('INCRBY', key, amount)
if redis.call('TTL', key) < 0 then
  redis.call('EXPIRE', key, ARGV[3])
end
if total > tonumber(ARGV[2]) then
  return {0, redis.call('DECRBY', key, amount)}
end
return {1, total}
"#;

#[derive(Clone)]
pub(crate) struct Scripts {
    pub(crate) window_check_and_insert: Script,
    pub(crate) counter_add_bounded: Script,
}

impl Scripts {
    pub(crate) fn load() -> Self {
        Self {
            window_check_and_insert: Script::new(WINDOW_CHECK_AND_INSERT),
            counter_add_bounded: Script::new(COUNTER_ADD_BOUNDED),
        }
    }
}
