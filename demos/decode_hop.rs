//! A pretend UI thread hands image decoding to a worker and shows the result
//! back on the UI thread.
//!
//! Run with `RUST_LOG=affine_sched=trace` to watch the hops.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use affine_sched::prelude::*;
use affine_sched::util::thread_id;

const QUIT: u32 = 0x0012;

struct Pump {
    tx: Sender<u32>,
    owner: OnceLock<usize>,
}

impl EventLoop for Pump {
    fn is_owner_thread(&self) -> bool {
        self.owner.get() == Some(&thread_id::current())
    }

    fn post_message(&self, message: UiMessage) -> bool {
        self.tx.send(message.raw()).is_ok()
    }
}

fn decode(bytes: &[u8]) -> usize {
    thread::sleep(Duration::from_millis(20));
    bytes.iter().map(|&b| b as usize).sum()
}

fn run_ui(ui: Arc<UiContext<Pump>>, rx: Receiver<u32>) {
    let _ = ui.event_loop().owner.set(thread_id::current());
    tracing::info!("ui thread pumping");
    for raw in rx {
        if raw == QUIT {
            break;
        }
        if !ui.handle_message(raw) {
            tracing::debug!(raw, "ignored foreign message");
        }
    }
    tracing::info!("ui thread done");
}

fn main() -> affine_sched::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let decoder = Worker::spawn(WorkerConfig::named("decoder").pin(PinConfig::core(0)))?;
    let (tx, rx) = mpsc::channel();
    let ui = Arc::new(UiContext::new(Pump {
        tx: tx.clone(),
        owner: OnceLock::new(),
    }));

    let (task_ui, ctx) = (ui.clone(), decoder.context().clone());
    ui.on_create_task(async move {
        for frame in 0..3u8 {
            let bytes = vec![frame; 1024];
            tracing::info!(frame, "requesting decode");

            ctx.schedule().await;
            let pixels = decode(&bytes);
            tracing::info!(frame, pixels, "decoded on worker");

            task_ui.schedule().await;
            tracing::info!(frame, pixels, "presented on ui thread");
        }
        let _ = tx.send(QUIT);
    });

    let pump_ui = ui.clone();
    let pump = thread::Builder::new()
        .name("ui".into())
        .spawn(move || run_ui(pump_ui, rx))
        .map_err(affine_sched::Error::Spawn)?;
    if pump.join().is_err() {
        tracing::error!("ui thread panicked");
    }
    Ok(())
}
