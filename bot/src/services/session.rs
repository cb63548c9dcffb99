use crate::models::Video;
use log::{debug, warn};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// What a `choose` selection resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    Picked(Video),
    /// Not a number or out of range; the offer is withdrawn.
    Invalid,
    NothingPending,
}

struct PendingEntry {
    videos: Vec<Video>,
    offered_at: Instant,
}

/// Last result listing offered to each user.
///
/// Bounded: the least recently offered users are evicted past `capacity`, and
/// offers older than `ttl` are treated as gone.
pub struct PendingChoices {
    entries: Mutex<LruCache<String, PendingEntry>>,
    ttl: Duration,
}

impl Default for PendingChoices {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl PendingChoices {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// The entries survive a panic in another holder of the lock.
    fn entries(&self) -> MutexGuard<'_, LruCache<String, PendingEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("Pending choices lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Replaces whatever the user had pending.
    pub fn offer(&self, user_id: &str, videos: Vec<Video>) {
        let evicted = self.entries().push(
            user_id.to_string(),
            PendingEntry {
                videos,
                offered_at: Instant::now(),
            },
        );
        if let Some((evicted, _)) = evicted {
            if evicted != user_id {
                debug!("Evicted pending choice of user {evicted}");
            }
        }
    }

    /// Resolves a 1-based selection; every outcome except `NothingPending` clears the offer.
    pub fn choose(&self, user_id: &str, selection: &str) -> Choice {
        let entry = self.entries().pop(user_id);

        let entry = match entry {
            Some(entry) if entry.offered_at.elapsed() <= self.ttl => entry,
            Some(_) => {
                debug!("Pending choice of user {user_id} expired");
                return Choice::NothingPending;
            }
            None => return Choice::NothingPending,
        };

        match selection.trim().parse::<usize>() {
            Ok(number) if number >= 1 && number <= entry.videos.len() => {
                Choice::Picked(entry.videos[number - 1].clone())
            }
            _ => Choice::Invalid,
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
