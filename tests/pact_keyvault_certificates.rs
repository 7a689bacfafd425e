//! Pact contract tests for the Azure Key Vault certificates API
//!
//! These tests define the contract between the issuer and the Key Vault
//! certificate endpoints, driving the real `KeyVaultSigner` against a Pact mock
//! server.

mod common;

use azure_keyvault_issuer::signer::token::ServicePrincipalCredential;
use azure_keyvault_issuer::signer::{
    CredentialStrategy, KeyVaultSigner, Signer, SignerError, TokenSource,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{csr_pem, init_rustls, StaticTokenCredential};
use pact_consumer::builders::InteractionBuilder;
use pact_consumer::prelude::*;
use serde_json::json;
use std::sync::Arc;

const CERT_NAME: &str = "web-1";
const ISSUER: &str = "digicert";
const VAULT_RESOURCE: &str = "https://vault.azure.net";

fn certificate_der() -> Vec<u8> {
    vec![0x30, 0x82, 0x03, 0x1f, 0x30, 0x82, 0x02, 0x07]
}

fn signer(mock_url: &str) -> KeyVaultSigner {
    let tokens = TokenSource::from_credential(
        CredentialStrategy::ServicePrincipal,
        Arc::new(StaticTokenCredential),
        VAULT_RESOURCE,
    );
    KeyVaultSigner::new(mock_url, tokens).expect("signer")
}

fn csr() -> Vec<u8> {
    csr_pem("web.example.com", &["web.example.com", "www.example.com"]).into_bytes()
}

fn pending_not_found(i: &mut InteractionBuilder) {
    i.request
        .method("GET")
        .path(format!("/certificates/{CERT_NAME}/pending"))
        .header("authorization", "Bearer test-token")
        .query_param("api-version", "7.4");
    i.response
        .status(404)
        .header("content-type", "application/json")
        .json_body(json!({
            "error": {
                "code": "PendingCertificateNotFound",
                "message": "Pending certificate not found: web-1"
            }
        }));
}

#[tokio::test]
async fn test_create_and_fetch_certificate_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Azure-Keyvault-Issuer", "Azure-Key-Vault");

    pact_builder
        .interaction("look up a pending certificate operation", "", |mut i| {
            i.given("no certificate operation exists for web-1");
            pending_not_found(&mut i);
            i
        })
        .interaction("create a certificate through a CA issuer", "", |mut i| {
            i.given("the digicert issuer exists");
            i.request
                .method("POST")
                .path(format!("/certificates/{CERT_NAME}/create"))
                .header("authorization", "Bearer test-token")
                .header("content-type", "application/json")
                .query_param("api-version", "7.4")
                .json_body(json!({
                    "policy": {
                        "x509_props": {
                            "subject": "CN=web.example.com",
                            "sans": { "dns_names": ["web.example.com", "www.example.com"] }
                        },
                        "issuer": { "name": ISSUER }
                    },
                    "attributes": {}
                }));
            i.response
                .status(202)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id": "https://my-vault1.vault.azure.net/certificates/web-1/pending",
                    "issuer": { "name": ISSUER },
                    "status": "completed",
                    "target": "https://my-vault1.vault.azure.net/certificates/web-1"
                }));
            i
        })
        .interaction("get the issued certificate", "", |mut i| {
            i.given("certificate web-1 has been issued");
            i.request
                .method("GET")
                .path(format!("/certificates/{CERT_NAME}"))
                .header("authorization", "Bearer test-token")
                .query_param("api-version", "7.4");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id": "https://my-vault1.vault.azure.net/certificates/web-1/abc123",
                    "cer": STANDARD.encode(certificate_der()),
                    "attributes": { "enabled": true }
                }));
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let signer = signer(mock_server.url().as_str());

    let certificate = signer
        .sign(&csr(), CERT_NAME, ISSUER)
        .await
        .expect("certificate issued");

    assert_eq!(certificate, certificate_der());
}

#[tokio::test]
async fn test_in_progress_operation_is_resumed_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Azure-Keyvault-Issuer", "Azure-Key-Vault");

    pact_builder.interaction("look up an in-progress certificate operation", "", |mut i| {
        i.given("a certificate operation for web-1 is in progress");
        i.request
            .method("GET")
            .path(format!("/certificates/{CERT_NAME}/pending"))
            .header("authorization", "Bearer test-token")
            .query_param("api-version", "7.4");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "id": "https://my-vault1.vault.azure.net/certificates/web-1/pending",
                "issuer": { "name": ISSUER },
                "status": "inProgress",
                "status_details": "Pending approval at the CA"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let signer = signer(mock_server.url().as_str());

    let err = signer.sign(&csr(), CERT_NAME, ISSUER).await.unwrap_err();

    assert!(err.is_pending());
}

#[tokio::test]
async fn test_completed_operation_is_collected_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Azure-Keyvault-Issuer", "Azure-Key-Vault");

    pact_builder
        .interaction("look up a completed certificate operation", "", |mut i| {
            i.given("the certificate operation for web-1 completed");
            i.request
                .method("GET")
                .path(format!("/certificates/{CERT_NAME}/pending"))
                .header("authorization", "Bearer test-token")
                .query_param("api-version", "7.4");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id": "https://my-vault1.vault.azure.net/certificates/web-1/pending",
                    "status": "completed"
                }));
            i
        })
        .interaction("get the certificate issued earlier", "", |mut i| {
            i.given("certificate web-1 has been issued");
            i.request
                .method("GET")
                .path(format!("/certificates/{CERT_NAME}"))
                .header("authorization", "Bearer test-token")
                .query_param("api-version", "7.4");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "cer": STANDARD.encode(certificate_der()) }));
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let signer = signer(mock_server.url().as_str());

    let certificate = signer.sign(&csr(), CERT_NAME, ISSUER).await.unwrap();
    assert_eq!(certificate, certificate_der());
}

#[tokio::test]
async fn test_rejected_create_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Azure-Keyvault-Issuer", "Azure-Key-Vault");

    pact_builder
        .interaction("look up a pending certificate operation", "", |mut i| {
            i.given("no certificate operation exists for web-1");
            pending_not_found(&mut i);
            i
        })
        .interaction("create a certificate with an unknown issuer", "", |mut i| {
            i.given("the digicert issuer does not exist");
            i.request
                .method("POST")
                .path(format!("/certificates/{CERT_NAME}/create"))
                .header("authorization", "Bearer test-token")
                .query_param("api-version", "7.4");
            i.response
                .status(400)
                .header("content-type", "application/json")
                .json_body(json!({
                    "error": {
                        "code": "BadParameter",
                        "message": "Issuer digicert not found"
                    }
                }));
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let signer = signer(mock_server.url().as_str());

    let err = signer.sign(&csr(), CERT_NAME, ISSUER).await.unwrap_err();

    match err {
        SignerError::Backend { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Issuer digicert not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_get_issuer_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Azure-Keyvault-Issuer", "Azure-Key-Vault");

    pact_builder.interaction("get a certificate issuer", "", |mut i| {
        i.given("the digicert issuer exists");
        i.request
            .method("GET")
            .path(format!("/certificates/issuers/{ISSUER}"))
            .header("authorization", "Bearer test-token")
            .query_param("api-version", "7.4");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "id": "https://my-vault1.vault.azure.net/certificates/issuers/digicert",
                "provider": "DigiCert",
                "attributes": { "enabled": true }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let signer = signer(mock_server.url().as_str());

    signer.check_issuer(ISSUER).await.expect("issuer exists");
}

#[tokio::test]
async fn test_get_missing_issuer_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Azure-Keyvault-Issuer", "Azure-Key-Vault");

    pact_builder.interaction("get a certificate issuer that does not exist", "", |mut i| {
        i.given("the digicert issuer does not exist");
        i.request
            .method("GET")
            .path(format!("/certificates/issuers/{ISSUER}"))
            .header("authorization", "Bearer test-token")
            .query_param("api-version", "7.4");
        i.response
            .status(404)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "code": "CertificateIssuerNotFound",
                    "message": "Issuer not found: digicert"
                }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let signer = signer(mock_server.url().as_str());

    let err = signer.check_issuer(ISSUER).await.unwrap_err();
    assert!(matches!(err, SignerError::Backend { status: 404, .. }));
}

#[tokio::test]
async fn test_service_principal_token_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Azure-Keyvault-Issuer", "Azure-Active-Directory");

    pact_builder.interaction("request a token with client credentials", "", |mut i| {
        i.given("the service principal exists in tenant");
        i.request
            .method("POST")
            .path("/tenant/oauth2/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(
                "grant_type=client_credentials&client_id=client&client_secret=s3cret\
                 &resource=https%3A%2F%2Fvault.azure.net",
            );
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "token_type": "Bearer",
                "expires_in": "3599",
                "resource": VAULT_RESOURCE,
                "access_token": "aad-access-token"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let credential =
        ServicePrincipalCredential::new(mock_server.url().as_str(), "tenant", "client", "s3cret")
            .expect("credential");
    let tokens = TokenSource::from_credential(
        CredentialStrategy::ServicePrincipal,
        Arc::new(credential),
        VAULT_RESOURCE,
    );

    let token = tokens.bearer_token().await.expect("token");
    assert_eq!(token.as_str(), "aad-access-token");
}
