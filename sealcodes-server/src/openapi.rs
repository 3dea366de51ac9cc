//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `/api-docs/openapi.json`.

use sealcodes_core::compact::{
    CompactHashes, CompactIdentity, CompactPerceptual, CompactService, CompactZone,
};
use sealcodes_core::{
    CompactAttestationData, DocumentHashes, ExclusionZone, Identity, SignatureEnvelope,
    SignatureVerificationResult, UnsignedAttestationPackage, VerificationDetails,
    VerificationFailure,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::{HealthResponse, ReadyResponse, VerifyRequest};

/// seal.codes attestation API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "seal.codes attestation API",
        version = "0.1.0",
        description = r#"
## Signed attestations for sealed documents

A client fingerprints a document (with the seal area neutralized), sends
the hashes and the signer's identity to `POST /sign-attestation`, and
embeds the signed result in a QR seal. Anyone who scans the seal can send
the compact attestation to `POST /verify-signature`.

- Signatures are Ed25519 over a single canonical JSON form of the package.
- Public keys come from the server's key registry only.
- Keys carry a validity window; attestations outside it are rejected.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Signing", description = "Sign attestation packages for authenticated users"),
        (name = "Verification", description = "Verify compact attestations against the key registry"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::sign::sign_handler,
        crate::handlers::verify::verify_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            UnsignedAttestationPackage,
            DocumentHashes,
            Identity,
            ExclusionZone,
            SignatureEnvelope,
            VerifyRequest,
            CompactAttestationData,
            CompactHashes,
            CompactPerceptual,
            CompactIdentity,
            CompactService,
            CompactZone,
            SignatureVerificationResult,
            VerificationDetails,
            VerificationFailure,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_protocol_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/sign-attestation"));
        assert!(doc.paths.paths.contains_key("/verify-signature"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
