use super::{quote, ui};
use crate::core::InstrumentCode;
use crate::poller::{ValuationPoller, ValuationSnapshot};
use crate::valuation::ValuationSource;
use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const TITLE: &str = "Live valuations (Enter to refresh, Ctrl-C to quit)";

fn render<W: Write>(
    out: &mut W,
    codes: &[InstrumentCode],
    snapshot: &ValuationSnapshot,
    clear: bool,
) -> std::io::Result<()> {
    if clear {
        if let Err(e) = console::Term::stdout().clear_screen() {
            debug!(error = %e, "Failed to clear screen");
        }
    }
    writeln!(out, "{}", ui::style_text(TITLE, ui::StyleType::Title))?;
    quote::write_valuations(out, codes, &snapshot.funds)?;
    if let Some(error) = &snapshot.error {
        writeln!(
            out,
            "{}",
            ui::style_text(
                &format!("Refresh failed, showing previous data: {error}"),
                ui::StyleType::Error
            )
        )?;
    }
    if snapshot.loading {
        writeln!(
            out,
            "{}",
            ui::style_text("Refreshing...", ui::StyleType::Subtle)
        )?;
    }
    Ok(())
}

/// Forwards each line typed on stdin. Reads happen on a plain thread so an
/// idle stdin never holds up runtime shutdown.
fn spawn_stdin_reader(enabled: bool) -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    if enabled {
        std::thread::spawn(move || {
            for line in std::io::stdin().lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break;
                }
            }
        });
    }
    rx
}

/// Keeps a live table of valuations until interrupted, or until `updates`
/// results have been shown.
///
/// A table is drawn for every applied refresh, including while newer fetches
/// are still in flight.
pub async fn run<V, W>(
    source: Arc<V>,
    codes: Vec<InstrumentCode>,
    interval: Duration,
    updates: Option<usize>,
    out: &mut W,
) -> Result<()>
where
    V: ValuationSource + 'static,
    W: Write,
{
    if codes.is_empty() {
        writeln!(out, "Nothing to watch. Pass codes or add favorites first.")?;
        return Ok(());
    }

    let mut poller = ValuationPoller::new(source);
    poller.watch(codes, interval);
    let mut rx = poller.subscribe();

    let interactive = console::Term::stdout().is_term();
    let mut enter_presses = spawn_stdin_reader(interactive);
    let mut stdin_open = interactive;
    let mut rendered_revision = 0;
    let mut shown = 0usize;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if snapshot.revision == rendered_revision {
                    continue;
                }
                rendered_revision = snapshot.revision;
                render(out, poller.codes(), &snapshot, interactive)?;
                shown += 1;
                if updates.is_some_and(|limit| shown >= limit) {
                    break;
                }
            }
            pressed = enter_presses.recv(), if stdin_open => {
                match pressed {
                    Some(()) => {
                        debug!("Manual refresh requested");
                        poller.spawn_refresh();
                    }
                    // stdin closed, keep polling
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    poller.detach();
    Ok(())
}
