//! Lua scripts executed atomically by Redis.
//!
//! Redis runs each script to completion before serving any other command,
//! which gives the decrement its read-check-write atomicity. Scripts are sent
//! with `EVALSHA` and fall back to `EVAL` on `NOSCRIPT`.
//!
//! Status codes and messages must stay in sync with
//! [`DecrementOutcome`](flash_sale_core::DecrementOutcome).

use redis::Script;
use std::sync::LazyLock;

/// Reserve units for one user.
///
/// ```text
/// KEYS[1] stock counter    ARGV[1] quantity
/// KEYS[2] sold-out flag    ARGV[2] participation TTL (ms)
/// KEYS[3] participation    ARGV[3] sold-out TTL (ms)
/// ```
///
/// Returns `{code, message, value}`.
const DECREMENT_LUA: &str = r"
if redis.call('EXISTS', KEYS[2]) == 1 then
    return {1, 'sold_out', 0}
end

if redis.call('EXISTS', KEYS[3]) == 1 then
    return {2, 'duplicate_user', 0}
end

local raw = redis.call('GET', KEYS[1])
if not raw then
    return {3, 'stock_not_found', 0}
end

if not string.match(raw, '^%-?%d+$') then
    return redis.error_reply('stock counter is not an integer')
end
local stock = tonumber(raw)

local quantity = tonumber(ARGV[1])
if stock < quantity then
    redis.call('SET', KEYS[2], '1', 'PX', ARGV[3])
    return {4, 'insufficient_stock', stock}
end

local remaining = redis.call('DECRBY', KEYS[1], quantity)
redis.call('SET', KEYS[3], '1', 'PX', ARGV[2])
if remaining <= 0 then
    redis.call('SET', KEYS[2], '1', 'PX', ARGV[3])
end

return {0, 'success', remaining}
";

/// Give units back and clear both flags.
///
/// ```text
/// KEYS[1] stock counter    ARGV[1] quantity
/// KEYS[2] sold-out flag    ARGV[2] TTL (ms) applied if the counter had expired
/// KEYS[3] participation
/// ```
///
/// Returns the new counter.
const RESTORE_LUA: &str = r"
local stock = redis.call('INCRBY', KEYS[1], ARGV[1])
if redis.call('PTTL', KEYS[1]) == -1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end

redis.call('DEL', KEYS[2])
redis.call('DEL', KEYS[3])

return stock
";

/// Read several counters at once. Absent counters come back as nil.
const BATCH_STOCK_LUA: &str = r"
return redis.call('MGET', unpack(KEYS))
";

/// Compiled decrement script.
pub static DECREMENT: LazyLock<Script> = LazyLock::new(|| Script::new(DECREMENT_LUA));

/// Compiled restore script.
pub static RESTORE: LazyLock<Script> = LazyLock::new(|| Script::new(RESTORE_LUA));

/// Compiled batch stock script.
pub static BATCH_STOCK: LazyLock<Script> = LazyLock::new(|| Script::new(BATCH_STOCK_LUA));

/// Most keys passed to one batch script call; `unpack` is limited by the Lua stack.
pub const BATCH_CHUNK_SIZE: usize = 1024;
