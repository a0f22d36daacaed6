//! Deliver the response to the framework's pre-signed `ResponseURL`

use anyhow::{bail, Context};
use reconciler_core::LifecycleResponse;
use tracing::info;

/// Upper bound on the reason text; the framework rejects oversized bodies.
const MAX_REASON_CHARS: usize = 2048;

/// Response JSON as sent on the wire.
pub fn response_body(response: &LifecycleResponse) -> anyhow::Result<String> {
    let mut response = response.clone();
    if let Some(reason) = response.reason.as_mut() {
        if reason.chars().count() > MAX_REASON_CHARS {
            *reason = reason.chars().take(MAX_REASON_CHARS).collect();
        }
    }
    serde_json::to_string(&response).context("serializing response")
}

/// PUT the response. The URL is pre-signed, so no auth and an empty content type.
pub async fn deliver(
    client: &reqwest::Client,
    url: &str,
    response: &LifecycleResponse,
) -> anyhow::Result<()> {
    let body = response_body(response)?;
    let reply = client
        .put(url)
        .header(reqwest::header::CONTENT_TYPE, "")
        .body(body)
        .send()
        .await
        .context("sending response")?;
    let status = reply.status();
    if !status.is_success() {
        let text = reply.text().await.unwrap_or_default();
        bail!("response delivery failed ({status}): {text}");
    }
    info!("response delivered ({})", status);
    Ok(())
}
