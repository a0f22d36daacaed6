//! Read a lifecycle event from a file or stdin

use anyhow::Context;
use reconciler_core::LifecycleEvent;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// `-` reads stdin; anything else is a file path.
pub async fn read_event(source: &str) -> anyhow::Result<LifecycleEvent> {
    let raw = if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("reading event from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(Path::new(source))
            .await
            .with_context(|| format!("reading event from {source}"))?
    };
    parse_event(&raw)
}

pub fn parse_event(raw: &str) -> anyhow::Result<LifecycleEvent> {
    serde_json::from_str(raw).context("event is not a valid lifecycle event")
}
