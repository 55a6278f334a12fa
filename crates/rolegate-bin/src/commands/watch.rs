// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `watch` command.
//!
//! Signs in, leaves eligibility resolution to the watcher task and prints
//! every session event until Ctrl-C.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use rolegate_core::bus::SessionEnvelope;
use rolegate_core::error::BusError;

use crate::cli::{Cli, OutputFormat, WatchArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::RuntimeBuilder;

/// Follows session events until interrupted.
pub async fn watch(cli: &Cli, args: WatchArgs) -> BinResult<()> {
    let runtime = RuntimeBuilder::new().config_path(&cli.config).build()?;
    let session = runtime.session().clone();

    let mut events = session.subscribe();
    let watcher = session.spawn_watcher();
    session.sign_in().await?;

    let mut ticker = (args.interval > 0).then(|| {
        let period = Duration::from_secs(args.interval);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval_secs = args.interval, "Watching session events");

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
            event = events.recv_envelope() => match event {
                Ok(envelope) => println!("{}", render_event(&envelope, args.format)?),
                Err(BusError::Closed) => break,
            },
            _ = tick(&mut ticker) => session.request_recompute(),
        }
    }

    watcher.stop();
    info!(runs = watcher.runs(), "Stopped watching");
    Ok(())
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Renders one session event.
pub fn render_event(envelope: &SessionEnvelope, format: OutputFormat) -> BinResult<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(envelope)
            .map_err(|e| BinError::runtime(format!("Failed to serialize event: {}", e))),
        OutputFormat::Text => {
            let details = serde_json::to_value(&envelope.event)
                .ok()
                .and_then(|value| match value {
                    serde_json::Value::Object(mut map) => {
                        map.remove("type");
                        (!map.is_empty()).then(|| serde_json::Value::Object(map).to_string())
                    }
                    _ => None,
                })
                .unwrap_or_default();

            Ok(format!(
                "{} {:<22} {}",
                envelope.timestamp.format("%H:%M:%S%.3f"),
                envelope.event.kind(),
                details
            )
            .trim_end()
            .to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_core::bus::SessionEvent;
    use rolegate_core::types::SelectedRole;

    fn envelope(event: SessionEvent) -> SessionEnvelope {
        SessionEnvelope {
            event,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_render_text() {
        let text = render_event(
            &envelope(SessionEvent::RoleSelected {
                role: SelectedRole::SuperAdmin,
                restored: true,
            }),
            OutputFormat::Text,
        )
        .unwrap();
        assert!(text.contains("role_selected"));
        assert!(text.contains("\"restored\":true"));

        let text = render_event(&envelope(SessionEvent::SignedOut), OutputFormat::Text).unwrap();
        assert!(text.ends_with("signed_out"));
    }

    #[test]
    fn test_render_json() {
        let json = render_event(&envelope(SessionEvent::RoleCleared), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "role_cleared");
        assert!(value.get("timestamp").is_some());
    }
}
