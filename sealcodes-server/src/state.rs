//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{SubsecRound, Utc};
use sealcodes_core::{
    AttestationSigner, Ed25519Signer, InMemoryKeyRegistry, KeyRegistry, MockSigner, SealError,
    SignerStrategy, SigningKeyRecord, SigningService, Verifier,
};
use sqlx::PgPool;

use crate::auth::{IdentityResolver, JwtIdentityResolver};
use crate::config::Config;
use crate::db::{self, PostgresKeyRegistry};

pub type SharedRegistry = Arc<dyn KeyRegistry>;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Identity gate and signer for `/sign-attestation`
    pub signing: SigningService,
    /// Registry-backed verifier for `/verify-signature`
    pub verifier: Arc<Verifier<SharedRegistry>>,
    /// Bearer token validation (`None` rejects every signing request)
    pub identity_resolver: Option<Arc<dyn IdentityResolver>>,
    /// Postgres pool when the registry is database-backed
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(signing: SigningService, registry: SharedRegistry) -> Self {
        Self {
            signing,
            verifier: Arc::new(Verifier::new(registry)),
            identity_resolver: None,
            db_pool: None,
        }
    }

    pub fn with_identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.identity_resolver = Some(resolver);
        self
    }

    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Build the production state: signer, key registry and auth from `config`.
    pub async fn from_config(config: &Config) -> Result<Self, SealError> {
        let signer = build_signer(config)?;
        let signing = match &signer {
            Some(signer) => SigningService::new(signer.clone()),
            None => {
                tracing::warn!("No ATTESTATION_PRIVATE_KEY set, signing requests will fail");
                SigningService::unconfigured()
            }
        };

        let (registry, pool): (SharedRegistry, Option<PgPool>) = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url, config)
                    .await
                    .map_err(|e| SealError::RegistryError(e.to_string()))?;
                (Arc::new(PostgresKeyRegistry::new(pool.clone())), Some(pool))
            }
            None => {
                tracing::warn!("No DATABASE_URL set, using in-memory key registry");
                let registry = InMemoryKeyRegistry::new();
                if let Some(signer) = signer.as_ref().filter(|s| s.strategy().is_cryptographic()) {
                    // Attestation timestamps carry milliseconds only.
                    registry.insert(SigningKeyRecord::ed25519(
                        signer.key_id(),
                        BASE64.encode(signer.public_key()),
                        Utc::now().trunc_subsecs(3),
                    ));
                    tracing::info!(key_id = signer.key_id(), "Registered active key in memory");
                }
                (Arc::new(registry), None)
            }
        };

        let mut state = Self::new(signing, registry);
        if let Some(pool) = pool {
            state = state.with_db_pool(pool);
        }
        match &config.auth_jwt_secret {
            Some(secret) => {
                state = state
                    .with_identity_resolver(Arc::new(JwtIdentityResolver::new(secret.as_bytes())));
            }
            None => tracing::warn!("No AUTH_JWT_SECRET set, signing requests will be rejected"),
        }
        Ok(state)
    }
}

/// `None` when the strategy needs a private key and none is configured.
pub fn build_signer(config: &Config) -> Result<Option<Arc<dyn AttestationSigner>>, SealError> {
    match config.signer_strategy {
        SignerStrategy::Mock => {
            tracing::warn!(key_id = %config.signing_key_id, "Using MOCK signer (not cryptographic)");
            let signer: Arc<dyn AttestationSigner> =
                Arc::new(MockSigner::new(config.signing_key_id.clone()));
            Ok(Some(signer))
        }
        SignerStrategy::Ed25519 => match &config.attestation_private_key {
            Some(pem) => {
                let signer =
                    Ed25519Signer::from_pkcs8_pem(config.signing_key_id.clone(), pem.as_str())
                        .map_err(|e| {
                            SealError::ServerConfiguration(format!(
                                "ATTESTATION_PRIVATE_KEY is not a valid Ed25519 PKCS#8 key: {}",
                                e
                            ))
                        })?;
                tracing::info!(key_id = %config.signing_key_id, "Ed25519 signer loaded");
                let signer: Arc<dyn AttestationSigner> = Arc::new(signer);
                Ok(Some(signer))
            }
            None => Ok(None),
        },
    }
}
