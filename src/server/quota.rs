use crate::types::Mode;
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Who is calling, resolved from request headers before streaming starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Caller {
    Authenticated(String),
    Guest(String),
}

impl Caller {
    /// A bearer token found in `tokens` authenticates; anything else is a
    /// guest identified by `x-guest-id`.
    pub fn from_headers(headers: &HeaderMap, tokens: &HashSet<String>) -> Self {
        let bearer = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());
        if let Some(token) = bearer {
            if tokens.contains(token) {
                return Caller::Authenticated(token.to_string());
            }
            tracing::debug!("unrecognized bearer token, treating caller as guest");
        }

        let guest_id = headers
            .get("x-guest-id")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or("anonymous");
        Caller::Guest(guest_id.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Caller::Authenticated(_) => "authenticated",
            Caller::Guest(_) => "guest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// No quota applies to this caller and mode.
    Unmetered,
    Allowed { remaining: u32 },
    Exceeded,
}

#[async_trait]
pub trait QuotaGate: Send + Sync {
    async fn check(&self, caller: &Caller, mode: Mode) -> QuotaDecision;
}

const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_MAX_GUESTS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct GuestUsage {
    count: u32,
    window_start: Instant,
}

/// In-memory per-guest limit on suggestion requests.
///
/// Counts reset once a guest's window elapses. At most `max_guests` ids are
/// tracked: when full, expired entries are pruned first, then the entry with
/// the oldest window is evicted (that guest starts over).
pub struct GuestQuota {
    limit: u32,
    window: Duration,
    max_guests: usize,
    used: Mutex<HashMap<String, GuestUsage>>,
}

impl GuestQuota {
    pub fn new(limit: u32) -> Self {
        Self::with_bounds(limit, DEFAULT_WINDOW, DEFAULT_MAX_GUESTS)
    }

    pub fn with_bounds(limit: u32, window: Duration, max_guests: usize) -> Self {
        Self {
            limit,
            window,
            max_guests: max_guests.max(1),
            used: Mutex::new(HashMap::new()),
        }
    }

    pub fn tracked_guests(&self) -> usize {
        self.used.lock().map(|used| used.len()).unwrap_or_default()
    }

    fn make_room(&self, used: &mut HashMap<String, GuestUsage>, now: Instant) {
        used.retain(|_, usage| now.duration_since(usage.window_start) < self.window);
        if used.len() < self.max_guests {
            return;
        }
        let oldest = used
            .iter()
            .min_by_key(|(_, usage)| usage.window_start)
            .map(|(guest_id, _)| guest_id.clone());
        if let Some(guest_id) = oldest {
            tracing::debug!(tracked = used.len(), "guest quota full, evicting oldest entry");
            used.remove(&guest_id);
        }
    }
}

#[async_trait]
impl QuotaGate for GuestQuota {
    async fn check(&self, caller: &Caller, mode: Mode) -> QuotaDecision {
        let Caller::Guest(guest_id) = caller else {
            return QuotaDecision::Unmetered;
        };
        if mode != Mode::Suggestion {
            return QuotaDecision::Unmetered;
        }

        let Ok(mut used) = self.used.lock() else {
            return QuotaDecision::Exceeded;
        };
        let now = Instant::now();
        if !used.contains_key(guest_id) && used.len() >= self.max_guests {
            self.make_room(&mut used, now);
        }

        let usage = used.entry(guest_id.clone()).or_insert(GuestUsage {
            count: 0,
            window_start: now,
        });
        if now.duration_since(usage.window_start) >= self.window {
            *usage = GuestUsage {
                count: 0,
                window_start: now,
            };
        }
        if usage.count >= self.limit {
            return QuotaDecision::Exceeded;
        }
        usage.count += 1;
        QuotaDecision::Allowed {
            remaining: self.limit - usage.count,
        }
    }
}
