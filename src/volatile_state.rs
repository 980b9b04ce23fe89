use serenity::all::UserId;
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;

/// State which is lost across sessions
pub struct VolatileState {
    pub last_spoke: LastSpoke,
    pub ping_cooldown: Cooldown,
}

/// When each user last sent a message the bot saw, forgotten after `window`
pub struct LastSpoke {
    window: Duration,
    seen: HashMap<UserId, Instant>,
    pruned: Instant,
}

/// Per-user rate limit
pub struct Cooldown {
    per: Duration,
    last: HashMap<UserId, Instant>,
    pruned: Instant,
}

const PING_COOLDOWN: Duration = Duration::from_secs(2);
/// How recently someone must have spoken to count as awake
const AWAKE_WINDOW: Duration = Duration::from_secs(60);

impl VolatileState {
    pub fn new() -> Self {
        Self {
            last_spoke: LastSpoke::new(AWAKE_WINDOW),
            ping_cooldown: Cooldown::new(PING_COOLDOWN),
        }
    }
}

/// Drop entries older than `age`, at most once per `age`
fn prune(entries: &mut HashMap<UserId, Instant>, pruned: &mut Instant, age: Duration, now: Instant) {
    if now.duration_since(*pruned) < age {
        return;
    }
    entries.retain(|_, at| now.duration_since(*at) <= age);
    *pruned = now;
}

impl LastSpoke {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
            pruned: Instant::now(),
        }
    }

    pub fn update(&mut self, id: UserId) {
        let now = Instant::now();
        prune(&mut self.seen, &mut self.pruned, self.window, now);
        self.seen.insert(id, now);
    }

    /// Whether `id` spoke within the window
    pub fn recently(&self, id: UserId) -> bool {
        match self.seen.get(&id) {
            Some(last) => Instant::now().duration_since(*last) <= self.window,
            None => false,
        }
    }
}

impl Cooldown {
    pub fn new(per: Duration) -> Self {
        Self {
            per,
            last: HashMap::new(),
            pruned: Instant::now(),
        }
    }

    /// Records the attempt if allowed.  Otherwise returns how long is left.
    pub fn try_acquire(&mut self, id: UserId) -> Result<(), Duration> {
        let now = Instant::now();
        prune(&mut self.last, &mut self.pruned, self.per, now);

        match self.last.get(&id) {
            Some(last) if now.duration_since(*last) < self.per => {
                Err(self.per - now.duration_since(*last))
            }
            _ => {
                self.last.insert(id, now);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId::new(1);

    #[tokio::test(start_paused = true)]
    async fn last_spoke_window() {
        let mut last_spoke = LastSpoke::new(Duration::from_secs(60));
        assert!(!last_spoke.recently(USER));

        last_spoke.update(USER);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(last_spoke.recently(USER));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!last_spoke.recently(USER));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown() {
        let mut cooldown = Cooldown::new(Duration::from_secs(2));
        assert!(cooldown.try_acquire(USER).is_ok());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(
            cooldown.try_acquire(USER),
            Err(Duration::from_millis(1500))
        );
        // Other users are unaffected
        assert!(cooldown.try_acquire(UserId::new(2)).is_ok());

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(cooldown.try_acquire(USER).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entries_are_forgotten() {
        let mut last_spoke = LastSpoke::new(Duration::from_secs(60));
        let mut cooldown = Cooldown::new(Duration::from_secs(2));
        for id in 1..=100 {
            last_spoke.update(UserId::new(id));
            cooldown.try_acquire(UserId::new(id)).unwrap();
        }
        assert_eq!(last_spoke.seen.len(), 100);
        assert_eq!(cooldown.last.len(), 100);

        tokio::time::advance(Duration::from_secs(61)).await;
        last_spoke.update(USER);
        cooldown.try_acquire(USER).unwrap();

        assert_eq!(last_spoke.seen.len(), 1);
        assert_eq!(cooldown.last.len(), 1);
        assert!(last_spoke.recently(USER));
    }
}
