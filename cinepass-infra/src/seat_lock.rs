use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cinepass_domain::store::SeatLockStore;
use cinepass_domain::{Error, Result};
use redis::AsyncCommands;
use tracing::debug;
use uuid::Uuid;

/// Seat ownership per showtime, kept in two Redis hashes:
/// `holds:{schedule_id}` for pending admissions (TTL on the whole hash) and
/// `confirmed:{schedule_id}` for paid seats (no TTL). Both the multi-seat
/// hold and the hold-to-confirmed transfer run as single Lua scripts, so a
/// batch either lands completely or not at all.
#[derive(Clone)]
pub struct RedisSeatLockStore {
    client: redis::Client,
    hold_script: redis::Script,
    confirm_script: redis::Script,
}

// Rejects the whole batch on the first seat present in either namespace and
// returns that seat; otherwise writes every seat and refreshes the hash TTL.
const HOLD_SCRIPT: &str = r#"
for i = 3, #ARGV do
    local seat = ARGV[i]
    if redis.call('HEXISTS', KEYS[1], seat) == 1 or redis.call('HEXISTS', KEYS[2], seat) == 1 then
        return seat
    end
end
for i = 3, #ARGV do
    redis.call('HSET', KEYS[1], ARGV[i], ARGV[2])
end
redis.call('EXPIRE', KEYS[1], tonumber(ARGV[1]))
return ''
"#;

// Moves each held seat into the confirmed hash, keeping its holder, and
// deletes the holds hash once it empties.
const CONFIRM_SCRIPT: &str = r#"
local moved = 0
for i = 1, #ARGV do
    local owner = redis.call('HGET', KEYS[1], ARGV[i])
    if owner then
        redis.call('HSET', KEYS[2], ARGV[i], owner)
        redis.call('HDEL', KEYS[1], ARGV[i])
        moved = moved + 1
    end
end
if redis.call('HLEN', KEYS[1]) == 0 then
    redis.call('DEL', KEYS[1])
end
return moved
"#;

impl RedisSeatLockStore {
    pub fn new(connection_string: &str) -> Result<Self> {
        let client = redis::Client::open(connection_string).map_err(Error::transient)?;
        Ok(Self {
            client,
            hold_script: redis::Script::new(HOLD_SCRIPT),
            confirm_script: redis::Script::new(CONFIRM_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(Error::transient)
    }

    fn holds_key(schedule_id: Uuid) -> String {
        format!("holds:{schedule_id}")
    }

    fn confirmed_key(schedule_id: Uuid) -> String {
        format!("confirmed:{schedule_id}")
    }
}

#[async_trait]
impl SeatLockStore for RedisSeatLockStore {
    async fn hold_seats(
        &self,
        schedule_id: Uuid,
        user_id: Uuid,
        seats: &[String],
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.connection().await?;

        let conflict: String = self
            .hold_script
            .key(Self::holds_key(schedule_id))
            .key(Self::confirmed_key(schedule_id))
            .arg(ttl.as_secs())
            .arg(user_id.to_string())
            .arg(seats)
            .invoke_async(&mut conn)
            .await
            .map_err(Error::transient)?;

        if !conflict.is_empty() {
            return Err(Error::SeatUnavailable(conflict));
        }

        debug!(%schedule_id, %user_id, seats = seats.len(), "seats held");
        Ok(())
    }

    async fn release_seats(&self, schedule_id: Uuid, seats: &[String]) -> Result<()> {
        if seats.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        let _: () = conn
            .hdel(Self::holds_key(schedule_id), seats)
            .await
            .map_err(Error::transient)?;
        Ok(())
    }

    async fn confirm_seats(&self, schedule_id: Uuid, seats: &[String]) -> Result<u64> {
        let mut conn = self.connection().await?;

        let moved: u64 = self
            .confirm_script
            .key(Self::holds_key(schedule_id))
            .key(Self::confirmed_key(schedule_id))
            .arg(seats)
            .invoke_async(&mut conn)
            .await
            .map_err(Error::transient)?;

        debug!(%schedule_id, moved, "seats confirmed");
        Ok(moved)
    }

    async fn is_seat_available(&self, schedule_id: Uuid, seat: &str) -> Result<bool> {
        let mut conn = self.connection().await?;

        let held: bool = conn
            .hexists(Self::holds_key(schedule_id), seat)
            .await
            .map_err(Error::transient)?;
        if held {
            return Ok(false);
        }

        let confirmed: bool = conn
            .hexists(Self::confirmed_key(schedule_id), seat)
            .await
            .map_err(Error::transient)?;
        Ok(!confirmed)
    }

    async fn held_seats(&self, schedule_id: Uuid) -> Result<HashMap<String, String>> {
        let mut conn = self.connection().await?;
        conn.hgetall(Self::holds_key(schedule_id))
            .await
            .map_err(Error::transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RedisSeatLockStore {
        RedisSeatLockStore::new("redis://127.0.0.1:6379").unwrap()
    }

    fn seats(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    #[ignore] // requires redis
    async fn hold_is_all_or_nothing() {
        let store = store();
        let schedule = Uuid::new_v4();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let ttl = Duration::from_secs(60);

        store
            .hold_seats(schedule, u1, &seats(&["A1", "A2"]), ttl)
            .await
            .unwrap();

        // A2 collides, so A3 must stay free too.
        let err = store
            .hold_seats(schedule, u2, &seats(&["A2", "A3"]), ttl)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SeatUnavailable(seat) if seat == "A2"));
        assert!(store.is_seat_available(schedule, "A3").await.unwrap());

        let holds = store.held_seats(schedule).await.unwrap();
        assert_eq!(holds.len(), 2);
        assert_eq!(holds.get("A1"), Some(&u1.to_string()));
    }

    #[tokio::test]
    #[ignore] // requires redis
    async fn confirm_moves_holds_permanently() {
        let store = store();
        let schedule = Uuid::new_v4();
        let user = Uuid::new_v4();
        let ttl = Duration::from_secs(60);

        store
            .hold_seats(schedule, user, &seats(&["B1", "B2"]), ttl)
            .await
            .unwrap();
        let moved = store
            .confirm_seats(schedule, &seats(&["B1", "B2"]))
            .await
            .unwrap();
        assert_eq!(moved, 2);

        // Confirmed seats block new holds even though the holds hash is gone.
        assert!(store.held_seats(schedule).await.unwrap().is_empty());
        assert!(!store.is_seat_available(schedule, "B1").await.unwrap());
        let err = store
            .hold_seats(schedule, Uuid::new_v4(), &seats(&["B1"]), ttl)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SeatUnavailable(_)));
    }

    #[tokio::test]
    #[ignore] // requires redis
    async fn release_is_idempotent() {
        let store = store();
        let schedule = Uuid::new_v4();
        let user = Uuid::new_v4();

        store
            .hold_seats(schedule, user, &seats(&["C1"]), Duration::from_secs(60))
            .await
            .unwrap();
        store.release_seats(schedule, &seats(&["C1"])).await.unwrap();
        store.release_seats(schedule, &seats(&["C1"])).await.unwrap();
        assert!(store.is_seat_available(schedule, "C1").await.unwrap());
    }
}
