use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::trader::{LiveTrader, StatusSnapshot};

/// Cloneable handle passed to other crates (API, binary).
#[derive(Clone)]
pub struct EngineHandle {
    trader: Arc<LiveTrader>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl EngineHandle {
    pub async fn status(&self) -> StatusSnapshot {
        self.trader.status().await
    }

    /// Ask both pollers to stop after their current pass.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Drives the candle poller and the exit poller as independent periodic tasks.
pub struct Engine {
    trader: Arc<LiveTrader>,
    shutdown_rx: watch::Receiver<bool>,
    candle_every: Duration,
    exit_every: Duration,
}

impl Engine {
    pub fn new(trader: Arc<LiveTrader>) -> (Self, EngineHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cfg = trader.config();
        let engine = Engine {
            candle_every: Duration::from_secs(cfg.candle_poll_secs.max(1)),
            exit_every: Duration::from_secs(cfg.exit_poll_secs.max(1)),
            trader: trader.clone(),
            shutdown_rx,
        };
        let handle = EngineHandle { trader, shutdown_tx: Arc::new(shutdown_tx) };
        (engine, handle)
    }

    /// Run until shutdown is requested, then cancel outstanding brackets if configured.
    /// Call from `tokio::spawn`.
    pub async fn run(self) {
        info!(
            candle_secs = self.candle_every.as_secs(),
            exit_secs = self.exit_every.as_secs(),
            "pollers starting"
        );

        let candles = {
            let trader = self.trader.clone();
            let shutdown = self.shutdown_rx.clone();
            tokio::spawn(run_periodic(self.candle_every, shutdown, move || {
                let trader = trader.clone();
                async move { trader.poll_candles().await }
            }))
        };
        let exits = {
            let trader = self.trader.clone();
            let shutdown = self.shutdown_rx.clone();
            tokio::spawn(run_periodic(self.exit_every, shutdown, move || {
                let trader = trader.clone();
                async move { trader.check_exits().await }
            }))
        };

        let failed = join_pollers([("candle", candles), ("exit", exits)]).await;
        info!(failed, "pollers stopped");
        self.trader.shutdown().await;
    }
}

/// Wait for every poller and log the ones that panicked. Returns how many failed.
async fn join_pollers<const N: usize>(pollers: [(&'static str, JoinHandle<()>); N]) -> usize {
    let mut failed = 0;
    for (name, task) in pollers {
        if let Err(e) = task.await {
            error!(poller = name, error = %e, "poller task failed");
            failed += 1;
        }
    }
    failed
}

async fn run_periodic<F, Fut>(every: Duration, mut shutdown: watch::Receiver<bool>, mut pass: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => pass().await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
