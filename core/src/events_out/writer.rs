use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::EventsOutConfig;
use crate::notify::UiNotifier;

use super::record::EventRecord;

fn audit_preview(s: &str) -> String {
    const MAX: usize = 120;
    if s.len() <= MAX {
        return s.to_string();
    }
    let end = s
        .char_indices()
        .take_while(|(i, _)| *i < MAX)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let mut out = s[..end].to_string();
    out.push('…');
    out
}

#[derive(Clone)]
pub struct EventsOutTx {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
    drop_when_full: bool,
}

impl EventsOutTx {
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub async fn send_line(&self, line: String) {
        if self.drop_when_full {
            if self.tx.try_send(line).is_err() {
                self.count_drop();
            }
        } else if self.tx.send(line).await.is_err() {
            tracing::debug!(
                target: "scriptbridge.events_out",
                "events_out writer closed, send failed"
            );
        }
    }

    pub async fn send_record(&self, record: &EventRecord) {
        self.send_line(record.to_line()).await;
    }

    fn count_drop(&self) {
        let count = self.dropped.fetch_add(1, Ordering::Relaxed);
        // Log every 100 dropped events to avoid log spam
        if count % 100 == 0 {
            tracing::warn!(
                target: "scriptbridge.events_out",
                dropped_total = count + 1,
                "events_out channel full, records are being dropped"
            );
        }
    }
}

/// UI notifications become `ui.notify` records. The call never blocks, so a
/// full channel drops the record (and counts it) whatever `drop_when_full`
/// says; records that do get through keep their call order.
impl UiNotifier for EventsOutTx {
    fn notify(&self, channel: &str, args: &[Value]) {
        let line = EventRecord::new("ui.notify")
            .with_data(json!({ "channel": channel, "args": args }))
            .to_line();
        match self.tx.try_send(line) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(target: "scriptbridge.events_out", channel, "events_out writer closed");
            }
            Err(mpsc::error::TrySendError::Full(_)) => self.count_drop(),
        }
    }
}

/// A running writer. Close it to flush everything before exiting.
pub struct EventsOut {
    tx: EventsOutTx,
    writer: JoinHandle<()>,
}

impl EventsOut {
    pub fn tx(&self) -> EventsOutTx {
        self.tx.clone()
    }

    /// Drop this handle's sender and wait for the writer to drain. Clones of
    /// the sender that are still alive keep the writer open.
    pub async fn close(self) {
        let EventsOut { tx, writer } = self;
        drop(tx);
        if let Err(e) = writer.await {
            tracing::warn!(target: "scriptbridge.events_out", error = %e, "events_out writer task failed");
        }
    }
}

pub async fn start_events_out(cfg: &EventsOutConfig) -> std::io::Result<Option<EventsOut>> {
    if !cfg.enabled {
        tracing::debug!(
            target: "scriptbridge.events_out",
            "events_out is disabled in config"
        );
        return Ok(None);
    }
    if cfg.path.trim().is_empty() {
        tracing::warn!(
            target: "scriptbridge.events_out",
            "events_out path is empty in config, no records will be written"
        );
        return Ok(None);
    }

    let path = cfg.path.clone();
    let to_stdout = path == "stdout:";
    let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = if to_stdout {
        Box::new(tokio::io::stdout())
    } else {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Box::new(file)
    };

    tracing::info!(
        target: "scriptbridge.events_out",
        path = %cfg.path,
        channel_capacity = cfg.channel_capacity,
        drop_when_full = cfg.drop_when_full,
        "events_out writer started"
    );

    let (tx, mut rx) = mpsc::channel::<String>(cfg.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    let handle = tokio::spawn(async move {
        let mut write_count = 0usize;
        while let Some(mut line) = rx.recv().await {
            if !line.ends_with('\n') {
                line.push('\n');
            }
            tracing::trace!(
                target: "scriptbridge.events_out",
                bytes = line.len(),
                preview = %audit_preview(line.trim_end()),
                "writing record"
            );
            if writer.write_all(line.as_bytes()).await.is_err() {
                tracing::error!(
                    target: "scriptbridge.events_out",
                    "failed to write to events_out, writer task exiting"
                );
                return;
            }
            write_count += 1;
            // Flush every 10 writes; stdout is flushed immediately.
            if (write_count % 10 == 0 || to_stdout) && writer.flush().await.is_err() {
                tracing::error!(
                    target: "scriptbridge.events_out",
                    "failed to flush events_out"
                );
                return;
            }
        }
        let _ = writer.flush().await;
    });

    Ok(Some(EventsOut {
        tx: EventsOutTx {
            tx,
            dropped,
            drop_when_full: cfg.drop_when_full,
        },
        writer: handle,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        let s = "进".repeat(100);
        let p = audit_preview(&s);
        assert!(p.ends_with('…'));
        assert!(p.len() < s.len());
    }

    #[tokio::test]
    async fn records_are_appended_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let cfg = EventsOutConfig {
            enabled: true,
            path: path.display().to_string(),
            channel_capacity: 8,
            drop_when_full: false,
        };
        let out = start_events_out(&cfg).await.unwrap().unwrap();
        let tx = out.tx();
        tx.send_record(&EventRecord::new("run.start").with_run_id("r1")).await;
        tx.notify("progress", &[json!(50)]);
        drop(tx);
        out.close().await;

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "run.start");
        assert_eq!(lines[1]["type"], "ui.notify");
        assert_eq!(lines[1]["data"]["channel"], "progress");
        assert_eq!(lines[1]["data"]["args"][0], 50);
    }

    #[tokio::test]
    async fn full_channel_drops_notifications_in_order() {
        let (tx, mut rx) = mpsc::channel::<String>(1);
        let out = EventsOutTx {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            drop_when_full: false,
        };
        out.notify("step", &[json!(1)]);
        out.notify("step", &[json!(2)]);
        out.notify("step", &[json!(3)]);
        assert_eq!(out.dropped_count(), 2);

        let first: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["data"]["args"][0], 1);
        assert!(rx.try_recv().is_err());

        out.notify("step", &[json!(4)]);
        let next: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(next["data"]["args"][0], 4);
        assert_eq!(out.dropped_count(), 2);
    }

    #[tokio::test]
    async fn disabled_config_starts_nothing() {
        let cfg = EventsOutConfig {
            enabled: false,
            ..EventsOutConfig::default()
        };
        assert!(start_events_out(&cfg).await.unwrap().is_none());
    }
}
