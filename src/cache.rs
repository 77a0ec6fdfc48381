use crate::{
    Result,
    payload::RawStatusPayload,
    transport::{
        ApiRequest,
        Transport,
        request_json,
        request_url,
    },
};
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use futures::{
    FutureExt,
    future::{
        BoxFuture,
        Shared,
    },
};
use serde_json::Value;
use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
    time::Duration,
};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<RawStatusPayload>>>>;

struct CacheEntry {
    payload: Arc<RawStatusPayload>,
    fetched_at: DateTime<Utc>,
    ticket: u64,
}

struct InFlight {
    ticket: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    in_flight: Option<InFlight>,
    // tickets are handed out when a fetch starts
    next_ticket: u64,
    // fetches with a ticket below this were started before the last invalidation
    floor: u64,
}

impl CacheState {
    fn take_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Stores a completed fetch unless a newer one already landed or the
    /// cache was invalidated after it started.
    fn settle(&mut self, ticket: u64, payload: &Arc<RawStatusPayload>, now: DateTime<Utc>) {
        if self.in_flight.as_ref().is_some_and(|f| f.ticket == ticket) {
            self.in_flight = None;
        }
        if ticket < self.floor {
            tracing::debug!("discarding status fetch #{ticket} started before invalidation");
            return;
        }
        if self.entry.as_ref().is_some_and(|e| e.ticket > ticket) {
            tracing::debug!("discarding status fetch #{ticket}; a newer snapshot is cached");
            return;
        }
        self.entry = Some(CacheEntry {
            payload: payload.clone(),
            fetched_at: now,
            ticket,
        });
    }

    fn abandon(&mut self, ticket: u64) {
        if self.in_flight.as_ref().is_some_and(|f| f.ticket == ticket) {
            self.in_flight = None;
        }
    }
}

/// Holds the most recent status payload for a fixed TTL.
///
/// Concurrent readers share one in-flight fetch. A failed fetch leaves any
/// previous entry in place and the error reaches every reader that joined it.
pub struct StatusCache<T, C = crate::cache::SystemClock> {
    transport: Arc<T>,
    clock: Arc<C>,
    ttl: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl<T, C> Clone for StatusCache<T, C> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            clock: self.clock.clone(),
            ttl: self.ttl,
            state: self.state.clone(),
        }
    }
}

impl<T: Transport, C: Clock> StatusCache<T, C> {
    pub fn new(transport: Arc<T>, clock: Arc<C>, ttl: Duration) -> Self {
        Self {
            transport,
            clock,
            ttl,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Cached payload while fresh, otherwise the result of a single shared fetch.
    pub async fn get_status(&self) -> Result<Arc<RawStatusPayload>> {
        let fetch = {
            let mut state = self.lock();
            let now = self.clock.now();
            if let Some(entry) = &state.entry
                && self.is_fresh(entry, now)
            {
                tracing::trace!("serving cached status #{}", entry.ticket);
                return Ok(entry.payload.clone());
            }
            match &state.in_flight {
                Some(in_flight) => {
                    tracing::debug!("joining in-flight status fetch #{}", in_flight.ticket);
                    in_flight.fetch.clone()
                }
                None => self.start_fetch(&mut state, false),
            }
        };
        fetch.await
    }

    /// Fetches regardless of the remaining TTL and replaces the entry.
    pub async fn refresh_status(&self) -> Result<Arc<RawStatusPayload>> {
        let fetch = {
            let mut state = self.lock();
            self.start_fetch(&mut state, true)
        };
        fetch.await
    }

    /// Drops the entry without fetching; fetches already in flight will not
    /// repopulate it.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.entry = None;
        state.in_flight = None;
        state.floor = state.next_ticket + 1;
        tracing::debug!("status cache invalidated");
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.lock().entry.as_ref().map(|e| e.fetched_at)
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(entry.fetched_at) < ttl
    }

    fn start_fetch(&self, state: &mut CacheState, force_refresh: bool) -> SharedFetch {
        let ticket = state.take_ticket();
        let transport = self.transport.clone();
        let clock = self.clock.clone();
        let shared_state = self.state.clone();
        tracing::debug!("starting status fetch #{ticket} (refresh: {force_refresh})");
        let fetch = async move {
            let result = fetch_status(transport.as_ref(), force_refresh).await;
            let mut state = lock_state(&shared_state);
            match result {
                Ok(payload) => {
                    let payload = Arc::new(payload);
                    state.settle(ticket, &payload, clock.now());
                    Ok(payload)
                }
                Err(e) => {
                    tracing::warn!("status fetch #{ticket} failed: {e}");
                    state.abandon(ticket);
                    Err(e)
                }
            }
        }
        .boxed()
        .shared();
        state.in_flight = Some(InFlight {
            ticket,
            fetch: fetch.clone(),
        });
        fetch
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    // state stays consistent even if a holder panicked
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn fetch_status<T: Transport>(
    transport: &T,
    force_refresh: bool,
) -> Result<RawStatusPayload> {
    let mut request = ApiRequest::get(["status"]);
    if force_refresh {
        request = request.with_query("refresh", 1);
    }
    let url = request_url(transport, &request);
    let value: Value = request_json(transport, request).await?;
    RawStatusPayload::from_value(&url, value)
}
