//! Single-flight coordination of access-token refreshes.
//!
//! One [`SessionManager`] is built per process and shared by handle. Every
//! request that needs a fresh token goes through [`SessionManager::refresh_or_wait`]:
//! the first caller performs the refresh, everyone arriving while it is in
//! flight parks a continuation in a FIFO queue, and all of them observe the
//! same outcome once it settles.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::auth_store::SessionStore;
use crate::error::AuthError;
use crate::error::Result;
use crate::refresh::TokenRefresher;
use crate::token_data::Session;
use crate::token_data::is_expired;

/// Delay between a failed refresh and the `Invalidated` notification, so that
/// callers rejected by the same failure can finish reporting first.
pub const DEFAULT_INVALIDATION_DELAY: Duration = Duration::from_millis(100);

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh stored a new access token.
    Refreshed,
    /// The session could not be recovered and was cleared. Hosts should send
    /// the user back to the login flow.
    Invalidated { reason: String },
    /// The user logged out explicitly.
    LoggedOut,
}

type Waiter = oneshot::Sender<Result<String>>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<Waiter>,
}

enum Role {
    Leader,
    Waiter(oneshot::Receiver<Result<String>>),
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    refresher: Arc<dyn TokenRefresher>,
    state: Mutex<RefreshState>,
    events: broadcast::Sender<SessionEvent>,
    invalidation_delay: Duration,
    refresh_attempts: AtomicU64,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("invalidation_delay", &self.invalidation_delay)
            .field("refresh_attempts", &self.refresh_attempts())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            refresher,
            state: Mutex::new(RefreshState::default()),
            events,
            invalidation_delay: DEFAULT_INVALIDATION_DELAY,
            refresh_attempts: AtomicU64::new(0),
        }
    }

    pub fn with_invalidation_delay(mut self, delay: Duration) -> Self {
        self.invalidation_delay = delay;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Number of refresh calls handed to the transport since construction.
    pub fn refresh_attempts(&self) -> u64 {
        self.refresh_attempts.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> Result<Option<Session>> {
        Ok(self
            .store
            .load()?
            .filter(|session| !session.access_token.is_empty()))
    }

    pub fn current_token(&self) -> Result<Option<String>> {
        Ok(self.session()?.map(|session| session.access_token))
    }

    /// Persist the pair returned by a successful login.
    pub fn store_login(&self, access_token: String, refresh_token: Option<String>) -> Result<()> {
        let refresh_token = match refresh_token {
            Some(token) => Some(token),
            // Cookie-based deployments only hand out the access token.
            None => self.store.load()?.and_then(|s| s.refresh_token),
        };
        let session = Session {
            access_token,
            refresh_token,
            last_refresh: Some(Utc::now()),
        };
        self.store.save(&session)?;
        info!("session stored");
        Ok(())
    }

    /// Clear both tokens. Returns whether a session existed.
    pub fn logout(&self) -> Result<bool> {
        let removed = self.store.clear()?;
        let _ = self.events.send(SessionEvent::LoggedOut);
        Ok(removed)
    }

    /// Token to attach to an outgoing request.
    ///
    /// `None` when nobody is logged in. An expired or undecodable token is
    /// refreshed first (or the caller waits for the refresh already running).
    pub async fn valid_token(&self) -> Result<Option<String>> {
        let Some(session) = self.session()? else {
            return Ok(None);
        };
        if !is_expired(&session.access_token, Utc::now()) {
            return Ok(Some(session.access_token));
        }
        debug!("access token expired; refreshing before send");
        self.refresh_or_wait(Some(session.access_token.as_str()))
            .await
            .map(Some)
    }

    /// Called after the server rejected `rejected_token` with 401/403.
    ///
    /// If another refresh already replaced the token in the meantime the new
    /// one is returned without hitting the auth service again.
    pub async fn refresh_after_rejection(&self, rejected_token: Option<&str>) -> Result<String> {
        if let Some(session) = self.session()?
            && Some(session.access_token.as_str()) != rejected_token
            && !is_expired(&session.access_token, Utc::now())
        {
            debug!("token was already replaced by a concurrent refresh");
            return Ok(session.access_token);
        }
        self.refresh_or_wait(rejected_token).await
    }

    /// Start a refresh, or join the one in flight.
    ///
    /// `seen` is the access token the caller judged unusable. A leader that
    /// finds a different, unexpired token in the store by the time it takes
    /// over returns that one instead of refreshing again.
    pub async fn refresh_or_wait(&self, seen: Option<&str>) -> Result<String> {
        let role = {
            let mut state = self.lock_state();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                debug!(queued = state.waiters.len(), "waiting for in-flight refresh");
                Role::Waiter(rx)
            } else {
                state.in_flight = true;
                Role::Leader
            }
        };

        match role {
            Role::Waiter(rx) => rx
                .await
                .unwrap_or_else(|_| Err(AuthError::refresh_failed("refresh cancelled"))),
            Role::Leader => {
                let cycle = RefreshCycle {
                    manager: self,
                    settled: false,
                };
                let outcome = self.run_refresh(seen).await;
                cycle.finish(&outcome);
                outcome
            }
        }
    }

    async fn run_refresh(&self, seen: Option<&str>) -> Result<String> {
        let previous = match self.store.load() {
            Ok(session) => session,
            Err(err) => {
                let err = AuthError::from(err);
                self.invalidate(&err);
                return Err(err);
            }
        };
        // A cycle may have settled between the caller's expiry check and
        // this one taking the lead.
        if let Some(session) = &previous
            && !session.access_token.is_empty()
            && Some(session.access_token.as_str()) != seen
            && !is_expired(&session.access_token, Utc::now())
        {
            debug!("stored token already replaced; skipping refresh");
            return Ok(session.access_token.clone());
        }
        let refresh_token = previous.and_then(|session| session.refresh_token);

        self.refresh_attempts.fetch_add(1, Ordering::SeqCst);
        let tokens = match self.refresher.refresh(refresh_token.as_deref()).await {
            Ok(tokens) => tokens,
            Err(err) => {
                self.invalidate(&err);
                return Err(err);
            }
        };

        let session = Session {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.or(refresh_token),
            last_refresh: Some(Utc::now()),
        };
        if let Err(err) = self.store.save(&session) {
            let err = AuthError::from(err);
            self.invalidate(&err);
            return Err(err);
        }

        info!("access token refreshed");
        let _ = self.events.send(SessionEvent::Refreshed);
        Ok(tokens.access_token)
    }

    fn invalidate(&self, err: &AuthError) {
        warn!("session invalidated: {err}");
        if let Err(clear_err) = self.store.clear() {
            warn!("failed to clear session: {clear_err}");
        }
        let events = self.events.clone();
        let delay = self.invalidation_delay;
        let reason = err.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::Invalidated { reason });
        });
    }

    fn settle(&self, outcome: &Result<String>) {
        let waiters = {
            let mut state = self.lock_state();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "refresh settled");
        for waiter in waiters {
            // A waiter whose caller went away is simply skipped.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owned by the leader of a refresh cycle. If the leader's future is dropped
/// before the refresh settles, the queued waiters are released with an error
/// and the in-flight flag is cleared.
struct RefreshCycle<'a> {
    manager: &'a SessionManager,
    settled: bool,
}

impl RefreshCycle<'_> {
    fn finish(mut self, outcome: &Result<String>) {
        self.settled = true;
        self.manager.settle(outcome);
    }
}

impl Drop for RefreshCycle<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("refresh leader dropped before completion");
            self.manager
                .settle(&Err(AuthError::refresh_failed("refresh cancelled")));
        }
    }
}
