use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use anyhow::Context;

use tgpoll_core::{config::Config, domain::Update, ports::UpdateSink, trigger};
use tgpoll_telegram::TelegramClient;

/// Writes each emitted batch as one JSON array per line.
struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write> JsonLinesSink<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_batch(&self, updates: &[Update]) -> io::Result<()> {
        let line = serde_json::to_string(updates)?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink writer poisoned"))?;
        writeln!(out, "{line}")?;
        out.flush()
    }
}

impl<W: Write + Send> UpdateSink for JsonLinesSink<W> {
    fn emit(&self, updates: Vec<Update>) {
        if let Err(e) = self.write_batch(&updates) {
            tracing::error!(error = %e, count = updates.len(), "failed to write update batch");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tgpoll_core::logging::init("tgpoll")?;

    let cfg = Config::load()?;
    let client = TelegramClient::from_config(&cfg)?;

    let handle = trigger::activate(
        Arc::new(client),
        Arc::new(JsonLinesSink::new(io::stdout())),
        cfg.polling_options(),
    );

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            tracing::info!("ctrl-c received, stopping");
        }
        _ = handle.stopped() => {}
    }

    handle
        .deactivate()
        .await
        .context("telegram polling stopped with an error")?;

    Ok(())
}
