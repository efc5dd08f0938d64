use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::error::WebhookError;
use crate::github::CredentialProvider;
use crate::remediate;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Verify a GitHub webhook signature (X-Hub-Signature-256 header).
///
/// The digest is computed over the raw request bytes, never over a
/// re-serialized payload. Comparison is constant-time.
pub fn verify_signature(secret: &str, signature_header: &str, payload: &[u8]) -> bool {
    // Signature format: sha256=<hex>
    let signature = match signature_header.strip_prefix("sha256=") {
        Some(sig) => sig,
        None => return false,
    };

    let expected = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&expected).is_ok()
}

/// The routing view of a payload: event gating looks at `action` alone.
///
/// Untargeted deliveries are often sparse and must never be parsed for
/// remediation fields; an absent action routes like a non-matching one.
#[derive(Debug, Deserialize)]
struct ActionOnly {
    #[serde(default)]
    action: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub installation: Installation,
    pub repository: Repository,
    pub pull_request: PullRequest,
}

#[derive(Debug, Deserialize)]
pub struct Installation {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
}

#[derive(Debug, Deserialize)]
pub struct Owner {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub head: Head,
}

#[derive(Debug, Deserialize)]
pub struct Head {
    #[serde(rename = "ref")]
    pub branch: String,
    pub repo: HeadRepo,
}

#[derive(Debug, Deserialize)]
pub struct HeadRepo {
    pub clone_url: String,
}

pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookError> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook missing x-hub-signature-256 header");
            WebhookError::InvalidSignature
        })?;

    if !verify_signature(&state.config.github.webhook_secret, signature, &body) {
        tracing::warn!("Webhook signature verification failed");
        return Err(WebhookError::InvalidSignature);
    }

    // Capture mode: persist the raw payload and echo it back. Nothing else
    // runs in this mode.
    if state.config.webhooks.capture_payloads {
        let delivery = headers
            .get("x-github-delivery")
            .and_then(|v| v.to_str().ok());
        let path = capture_payload(&state.config.server.work_dir, delivery, &body).await?;
        tracing::info!(path = %path.display(), "Captured webhook payload");
        return Ok(body.into_response());
    }

    let event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if event != "pull_request" {
        tracing::debug!(event = %event, "Ignoring non-pull_request event");
        return Ok("ignored".into_response());
    }

    let ActionOnly { action } = serde_json::from_slice(&body)?;

    if !state.config.webhooks.actions.iter().any(|a| a == &action) {
        tracing::debug!(action = %action, "Ignoring pull_request action");
        return Ok("ignored".into_response());
    }

    // Only a matched delivery is held to the full payload shape.
    let payload: PullRequestEvent = serde_json::from_slice(&body)?;

    tracing::info!(
        repo = %format!("{}/{}", payload.repository.owner.login, payload.repository.name),
        pr = payload.pull_request.number,
        branch = %payload.pull_request.head.branch,
        "Remediating pull request"
    );

    let provider = CredentialProvider::new(
        state.config.github.app_id,
        state.private_key.clone(),
        state.config.github.api_base.clone(),
    );
    let token = provider
        .installation_token(payload.installation.id)
        .await?;

    remediate::run(&state.config.server.work_dir, &payload, &token.token).await?;

    tracing::info!(pr = payload.pull_request.number, "Remediation pushed");
    Ok("success".into_response())
}

async fn capture_payload(
    work_dir: &Path,
    delivery_id: Option<&str>,
    body: &[u8],
) -> Result<PathBuf, WebhookError> {
    use anyhow::Context;
    use std::sync::atomic::{AtomicU64, Ordering};

    // Concurrent captures can land in the same millisecond, so the name
    // carries the delivery GUID (unique per delivery) or a counter.
    static CAPTURE_SEQ: AtomicU64 = AtomicU64::new(0);

    tokio::fs::create_dir_all(work_dir)
        .await
        .with_context(|| format!("Failed to create work dir: {}", work_dir.display()))?;

    let suffix = match delivery_id {
        Some(id) if !id.is_empty() => id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect::<String>(),
        _ => format!("{:06}", CAPTURE_SEQ.fetch_add(1, Ordering::Relaxed)),
    };
    let name = format!(
        "payload-{}-{}.json",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"),
        suffix
    );
    let path = work_dir.join(name);
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write payload: {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"action":"opened"}"#;
        let sig = sign("s3cret", body);
        assert!(verify_signature("s3cret", &sig, body));
    }

    #[test]
    fn rejects_mutated_body() {
        let body = br#"{"action":"opened"}"#;
        let sig = sign("s3cret", body);
        let mut mutated = body.to_vec();
        mutated[0] ^= 1;
        assert!(!verify_signature("s3cret", &sig, &mutated));
    }

    #[test]
    fn rejects_mutated_signature() {
        let body = br#"{"action":"opened"}"#;
        let mut sig = sign("s3cret", body).into_bytes();
        let last = sig.len() - 1;
        sig[last] = if sig[last] == b'0' { b'1' } else { b'0' };
        assert!(!verify_signature(
            "s3cret",
            std::str::from_utf8(&sig).unwrap(),
            body
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = b"payload";
        let sig = sign("s3cret", body);
        assert!(!verify_signature("other", &sig, body));
    }

    #[test]
    fn rejects_missing_prefix_and_bad_hex() {
        let body = b"payload";
        let sig = sign("s3cret", body);
        assert!(!verify_signature("s3cret", sig.trim_start_matches("sha256="), body));
        assert!(!verify_signature("s3cret", "sha256=not-hex", body));
    }

    #[test]
    fn whitespace_variant_of_payload_fails_verification() {
        // The digest covers the exact wire bytes; a semantically equal but
        // differently formatted body must not verify.
        let body = br#"{"action":"opened"}"#;
        let sig = sign("s3cret", body);
        assert!(!verify_signature("s3cret", &sig, br#"{ "action": "opened" }"#));
    }

    #[test]
    fn parses_pull_request_payload() {
        let payload: PullRequestEvent = serde_json::from_str(
            r#"{
                "action": "opened",
                "installation": {"id": 99},
                "repository": {"name": "demo", "owner": {"login": "octocat"}},
                "pull_request": {
                    "number": 42,
                    "head": {
                        "ref": "feature",
                        "repo": {"clone_url": "https://github.com/octocat/demo.git"}
                    }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(payload.action, "opened");
        assert_eq!(payload.installation.id, 99);
        assert_eq!(payload.pull_request.number, 42);
        assert_eq!(payload.pull_request.head.branch, "feature");
    }
}
