//! Sealing session state machine.
//!
//! A seal request spans an OAuth redirect, so the document fingerprint and
//! seal geometry have to survive until the identity provider calls back. The
//! pending work is kept in a [`PendingOperationStore`] keyed by
//! [`SessionToken`], and every step is a checked transition of
//! [`SealingState`].
//!
//! ```text
//! Idle --begin_auth--> AwaitingAuth --auth_completed--> Sealing --sealed--> Sealed
//!  |                        |                              |
//!  +--start_sealing---------|----------------------------->+
//!                           +--auth_failed--> Failed <--failed--+
//! Failed --begin_auth--> AwaitingAuth;  any --reset--> Idle
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::builder::build_package;
use crate::compact::CompactAttestationData;
use crate::error::{Result, SealError};
use crate::package::{DocumentHashes, ExclusionZone, Identity, UnsignedAttestationPackage};

/// Default lifetime of a pending operation (15 minutes)
pub const PENDING_OPERATION_TTL_SECS: u64 = 900;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SealingState {
    Idle,
    AwaitingAuth { provider: String },
    Sealing { identity: Identity },
    Sealed { compact: Box<CompactAttestationData> },
    Failed { reason: String },
}

impl SealingState {
    pub fn name(&self) -> &'static str {
        match self {
            SealingState::Idle => "Idle",
            SealingState::AwaitingAuth { .. } => "AwaitingAuth",
            SealingState::Sealing { .. } => "Sealing",
            SealingState::Sealed { .. } => "Sealed",
            SealingState::Failed { .. } => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SealingState::Sealed { .. } | SealingState::Failed { .. })
    }

    /// Apply `event`, returning the next state.
    pub fn apply(self, event: SealingEvent) -> Result<SealingState> {
        use SealingEvent as E;
        use SealingState as S;

        match (self, event) {
            (_, E::Reset) => Ok(S::Idle),
            (S::Idle | S::Failed { .. }, E::BeginAuth { provider }) => {
                Ok(S::AwaitingAuth { provider })
            }
            (S::AwaitingAuth { provider }, E::AuthCompleted { identity }) => {
                if identity.provider != provider {
                    return Err(SealError::IdentityMismatch(format!(
                        "authentication started with '{}' but completed with '{}'",
                        provider, identity.provider
                    )));
                }
                Ok(S::Sealing { identity })
            }
            (S::AwaitingAuth { .. }, E::AuthFailed { reason }) => Ok(S::Failed { reason }),
            (S::Idle, E::StartSealing { identity }) => Ok(S::Sealing { identity }),
            (S::Sealing { .. }, E::Sealed { compact }) => Ok(S::Sealed { compact }),
            (S::Sealing { .. }, E::Failed { reason }) => Ok(S::Failed { reason }),
            (state, event) => Err(SealError::InvalidTransition {
                from: state.name(),
                event: event.name(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealingEvent {
    BeginAuth { provider: String },
    AuthCompleted { identity: Identity },
    AuthFailed { reason: String },
    /// Caller is already authenticated; skip the provider round trip.
    StartSealing { identity: Identity },
    Sealed { compact: Box<CompactAttestationData> },
    Failed { reason: String },
    Reset,
}

impl SealingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SealingEvent::BeginAuth { .. } => "begin_auth",
            SealingEvent::AuthCompleted { .. } => "auth_completed",
            SealingEvent::AuthFailed { .. } => "auth_failed",
            SealingEvent::StartSealing { .. } => "start_sealing",
            SealingEvent::Sealed { .. } => "sealed",
            SealingEvent::Failed { .. } => "failed",
            SealingEvent::Reset => "reset",
        }
    }
}

/// Document-derived inputs waiting for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSeal {
    pub hashes: DocumentHashes,
    pub exclusion_zone: ExclusionZone,
    pub user_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub state: SealingState,
    pub draft: PendingSeal,
}

/// Storage for in-flight sealing sessions.
pub trait PendingOperationStore: Send + Sync {
    fn put(&self, token: &SessionToken, operation: PendingOperation);

    fn get(&self, token: &SessionToken) -> Option<PendingOperation>;

    /// Retrieve and remove.
    fn take(&self, token: &SessionToken) -> Option<PendingOperation>;

    /// Run `change` against the stored operation while holding its entry
    /// exclusively. Fails with `SessionNotFound` for unknown or expired tokens.
    fn update(
        &self,
        token: &SessionToken,
        change: &mut dyn FnMut(&mut PendingOperation) -> Result<()>,
    ) -> Result<()>;
}

struct PendingEntry {
    operation: PendingOperation,
    expires_at: Instant,
}

/// In-memory store with a fixed time-to-live per entry.
pub struct InMemoryPendingStore {
    entries: DashMap<SessionToken, PendingEntry>,
    ttl: Duration,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(PENDING_OPERATION_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Remove expired entries (called periodically)
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryPendingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryPendingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryPendingStore")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl PendingOperationStore for InMemoryPendingStore {
    fn put(&self, token: &SessionToken, operation: PendingOperation) {
        self.cleanup_expired();
        self.entries.insert(
            token.clone(),
            PendingEntry {
                operation,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    fn get(&self, token: &SessionToken) -> Option<PendingOperation> {
        let now = Instant::now();
        let operation = self
            .entries
            .get(token)
            .and_then(|entry| (entry.expires_at > now).then(|| entry.operation.clone()));
        if operation.is_none() {
            self.entries.remove_if(token, |_, entry| entry.expires_at <= now);
        }
        operation
    }

    fn take(&self, token: &SessionToken) -> Option<PendingOperation> {
        let (_, entry) = self.entries.remove(token)?;
        if entry.expires_at > Instant::now() {
            Some(entry.operation)
        } else {
            None
        }
    }

    fn update(
        &self,
        token: &SessionToken,
        change: &mut dyn FnMut(&mut PendingOperation) -> Result<()>,
    ) -> Result<()> {
        let now = Instant::now();
        let outcome = match self.entries.get_mut(token) {
            Some(mut entry) if entry.expires_at > now => Some(change(&mut entry.operation)),
            _ => None,
        };
        match outcome {
            Some(result) => result,
            None => {
                self.entries.remove_if(token, |_, entry| entry.expires_at <= now);
                Err(SealError::SessionNotFound)
            }
        }
    }
}

/// Drives sealing sessions through the state machine, persisting each step.
#[derive(Debug)]
pub struct SealingSession<S> {
    store: S,
}

impl<S: PendingOperationStore> SealingSession<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a fingerprinted document and return its session token.
    pub fn open(&self, draft: PendingSeal) -> SessionToken {
        let token = SessionToken::generate();
        self.store.put(
            &token,
            PendingOperation {
                state: SealingState::Idle,
                draft,
            },
        );
        tracing::debug!(session = %token, "Sealing session opened");
        token
    }

    pub fn state(&self, token: &SessionToken) -> Result<SealingState> {
        Ok(self.load(token)?.state)
    }

    pub fn begin_auth(&self, token: &SessionToken, provider: impl Into<String>) -> Result<SealingState> {
        self.transition(
            token,
            SealingEvent::BeginAuth {
                provider: provider.into(),
            },
        )
    }

    /// Record the provider callback and build the package to send for signing.
    pub fn auth_completed(
        &self,
        token: &SessionToken,
        identity: Identity,
    ) -> Result<UnsignedAttestationPackage> {
        self.transition(token, SealingEvent::AuthCompleted { identity })?;
        self.unsigned_package(token)
    }

    pub fn auth_failed(&self, token: &SessionToken, reason: impl Into<String>) -> Result<SealingState> {
        self.transition(
            token,
            SealingEvent::AuthFailed {
                reason: reason.into(),
            },
        )
    }

    pub fn start_sealing(
        &self,
        token: &SessionToken,
        identity: Identity,
    ) -> Result<UnsignedAttestationPackage> {
        self.transition(token, SealingEvent::StartSealing { identity })?;
        self.unsigned_package(token)
    }

    pub fn sealed(&self, token: &SessionToken, compact: CompactAttestationData) -> Result<SealingState> {
        self.transition(
            token,
            SealingEvent::Sealed {
                compact: Box::new(compact),
            },
        )
    }

    pub fn failed(&self, token: &SessionToken, reason: impl Into<String>) -> Result<SealingState> {
        self.transition(
            token,
            SealingEvent::Failed {
                reason: reason.into(),
            },
        )
    }

    pub fn reset(&self, token: &SessionToken) -> Result<SealingState> {
        self.transition(token, SealingEvent::Reset)
    }

    /// Remove the session, returning its final operation.
    pub fn close(&self, token: &SessionToken) -> Result<PendingOperation> {
        self.store.take(token).ok_or(SealError::SessionNotFound)
    }

    fn load(&self, token: &SessionToken) -> Result<PendingOperation> {
        self.store.get(token).ok_or(SealError::SessionNotFound)
    }

    fn transition(&self, token: &SessionToken, event: SealingEvent) -> Result<SealingState> {
        let event_name = event.name();
        let mut event = Some(event);
        let mut next = None;
        self.store.update(token, &mut |operation: &mut PendingOperation| -> Result<()> {
            let from = operation.state.name();
            let event = event.take().ok_or(SealError::InvalidTransition {
                from,
                event: event_name,
            })?;
            operation.state = operation.state.clone().apply(event)?;
            tracing::debug!(session = %token, from, event = event_name, to = operation.state.name(), "Sealing transition");
            next = Some(operation.state.clone());
            Ok(())
        })?;
        next.ok_or(SealError::SessionNotFound)
    }

    fn unsigned_package(&self, token: &SessionToken) -> Result<UnsignedAttestationPackage> {
        let operation = self.load(token)?;
        match operation.state {
            SealingState::Sealing { identity } => Ok(build_package(
                operation.draft.hashes,
                identity,
                operation.draft.exclusion_zone,
                operation.draft.user_url,
            )),
            other => Err(SealError::InvalidTransition {
                from: other.name(),
                event: "build_package",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::FillColor;
    use crate::package::{FullAttestationPackage, ServiceInfo};

    fn draft() -> PendingSeal {
        PendingSeal {
            hashes: DocumentHashes {
                cryptographic: "aa".into(),
                p_hash: "bb".into(),
                d_hash: "cc".into(),
            },
            exclusion_zone: ExclusionZone::new(0, 0, 100, 100, FillColor::white()),
            user_url: None,
        }
    }

    fn compact_for(unsigned: UnsignedAttestationPackage) -> CompactAttestationData {
        let full = FullAttestationPackage::from_parts(
            unsigned,
            crate::package::ServerAddendum {
                timestamp: "2025-01-01T00:00:00.000Z".into(),
                service_info: ServiceInfo {
                    public_key_id: "key-1".into(),
                },
            },
        );
        CompactAttestationData::from_package(&full, "sig")
    }

    #[test]
    fn test_oauth_happy_path() {
        let session = SealingSession::new(InMemoryPendingStore::new());
        let token = session.open(draft());
        assert_eq!(session.state(&token).unwrap(), SealingState::Idle);

        session.begin_auth(&token, "google").unwrap();
        let unsigned = session
            .auth_completed(&token, Identity::new("google", "a@b.com"))
            .unwrap();
        assert_eq!(unsigned.identity.identifier, "a@b.com");
        assert_eq!(unsigned.hashes, draft().hashes);

        let state = session.sealed(&token, compact_for(unsigned)).unwrap();
        assert!(state.is_terminal());
        assert_eq!(state.name(), "Sealed");

        session.close(&token).unwrap();
        assert!(matches!(session.state(&token), Err(SealError::SessionNotFound)));
    }

    #[test]
    fn test_provider_switch_is_rejected() {
        let session = SealingSession::new(InMemoryPendingStore::new());
        let token = session.open(draft());
        session.begin_auth(&token, "google").unwrap();
        let err = session
            .auth_completed(&token, Identity::new("github", "a@b.com"))
            .unwrap_err();
        assert!(matches!(err, SealError::IdentityMismatch(_)));
        assert_eq!(session.state(&token).unwrap().name(), "AwaitingAuth");
    }

    #[test]
    fn test_invalid_transitions() {
        let session = SealingSession::new(InMemoryPendingStore::new());
        let token = session.open(draft());

        let err = session.failed(&token, "boom").unwrap_err();
        assert!(matches!(
            err,
            SealError::InvalidTransition { from: "Idle", event: "failed" }
        ));
        assert!(session
            .auth_completed(&token, Identity::new("google", "a@b.com"))
            .is_err());
    }

    #[test]
    fn test_failure_then_retry_then_reset() {
        let session = SealingSession::new(InMemoryPendingStore::new());
        let token = session.open(draft());
        session.begin_auth(&token, "google").unwrap();
        assert_eq!(
            session.auth_failed(&token, "denied").unwrap(),
            SealingState::Failed { reason: "denied".into() }
        );
        assert_eq!(session.begin_auth(&token, "github").unwrap().name(), "AwaitingAuth");
        assert_eq!(session.reset(&token).unwrap(), SealingState::Idle);

        session
            .start_sealing(&token, Identity::new("github", "a@b.com"))
            .unwrap();
        assert_eq!(session.failed(&token, "signing failed").unwrap().name(), "Failed");
    }

    #[test]
    fn test_unknown_session() {
        let session = SealingSession::new(InMemoryPendingStore::new());
        let token = SessionToken::generate();
        assert!(matches!(
            session.begin_auth(&token, "google"),
            Err(SealError::SessionNotFound)
        ));
    }

    #[test]
    fn test_expired_entries() {
        let store = InMemoryPendingStore::with_ttl(Duration::ZERO);
        let session = SealingSession::new(store);
        let token = session.open(draft());
        assert!(matches!(session.state(&token), Err(SealError::SessionNotFound)));
        assert!(session.store().is_empty(), "expired entry evicted on read");

        let token = session.open(draft());
        assert!(matches!(
            session.begin_auth(&token, "google"),
            Err(SealError::SessionNotFound)
        ));
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_put_sweeps_expired_entries() {
        let store = InMemoryPendingStore::with_ttl(Duration::ZERO);
        for _ in 0..5 {
            store.put(
                &SessionToken::generate(),
                PendingOperation {
                    state: SealingState::Idle,
                    draft: draft(),
                },
            );
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_transitions_apply_once() {
        let session = SealingSession::new(InMemoryPendingStore::new());
        let token = session.open(draft());
        session
            .start_sealing(&token, Identity::new("google", "a@b.com"))
            .unwrap();

        let (session, token) = (&session, &token);
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| scope.spawn(move || session.failed(token, format!("worker {}", i))))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, SealError::InvalidTransition { from: "Failed", .. })));
        assert_eq!(session.state(token).unwrap().name(), "Failed");
    }

    #[test]
    fn test_state_serialization_is_tagged() {
        let json = serde_json::to_value(SealingState::AwaitingAuth {
            provider: "google".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "awaitingAuth");
        assert_eq!(json["provider"], "google");
    }
}
