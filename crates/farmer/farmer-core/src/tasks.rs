//! The long-lived task shapes spec.md §5 names, parameterized over the
//! actual work so `src/bin/farmer-core/main.rs` can wire them to concrete
//! pool/harvester state without this module depending on either.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use event_listener::Event;
use tokio::time::interval;

/// A cooperative shutdown flag every long-lived task observes, per spec.md
/// §5's "shutdown sets a flag observed by every long-lived task". `Event`
/// wakes tasks already waiting; the flag lets a task that arrives after the
/// trigger notice immediately instead of blocking forever.
#[derive(Clone)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    event: Arc<Event>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            event: Arc::new(Event::new()),
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.event.notify(usize::MAX);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves immediately if already triggered; otherwise waits for
    /// [`Self::trigger`]. Cancel-safe: callers `select!` on it.
    pub async fn wait(&self) {
        loop {
            if self.is_triggered() {
                return;
            }
            let listener = self.event.listen();
            if self.is_triggered() {
                return;
            }
            listener.await;
        }
    }
}

/// Pool-state updater: wakes every second; runs `run` immediately whenever
/// `config_changed` reports a configuration mtime change, otherwise at least
/// once a minute. Returns once `shutdown` is triggered, after the
/// in-progress iteration (if any) completes.
pub async fn pool_state_updater<C, F, Fut>(shutdown: Shutdown, mut config_changed: C, mut run: F)
where
    C: FnMut() -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    const MIN_RUN_INTERVAL: Duration = Duration::from_secs(60);

    run().await;
    let mut last_run = Instant::now();
    let mut ticker = interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            () = shutdown.wait() => break,
            _ = ticker.tick() => {
                if config_changed() || last_run.elapsed() >= MIN_RUN_INTERVAL {
                    run().await;
                    last_run = Instant::now();
                }
            }
        }
    }
}

/// Cache sweeper: wakes every second; sweeps expired cache entries every
/// `sub_slot_time_target` seconds and emits a connection-refresh event every
/// 30 seconds.
pub async fn cache_sweeper<S, SFut, R, RFut>(
    shutdown: Shutdown,
    sub_slot_time_target: Duration,
    mut sweep: S,
    mut refresh: R,
) where
    S: FnMut() -> SFut,
    SFut: Future<Output = ()>,
    R: FnMut() -> RFut,
    RFut: Future<Output = ()>,
{
    const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

    let mut ticker = interval(Duration::from_secs(1));
    let mut last_sweep = Instant::now();
    let mut last_refresh = Instant::now();

    loop {
        tokio::select! {
            () = shutdown.wait() => break,
            _ = ticker.tick() => {
                if last_sweep.elapsed() >= sub_slot_time_target {
                    sweep().await;
                    last_sweep = Instant::now();
                }
                if last_refresh.elapsed() >= REFRESH_INTERVAL {
                    refresh().await;
                    last_refresh = Instant::now();
                }
            }
        }
    }
}

/// Per-connecting-harvester handshake task: polls `try_send_handshake` (which
/// itself checks whether keys are ready and, if so, sends the handshake and
/// returns `true`) until it succeeds, the peer disconnects, or shutdown is
/// triggered.
pub async fn handshake_task<P, R, RFut>(
    shutdown: Shutdown,
    poll_interval: Duration,
    mut peer_disconnected: P,
    mut try_send_handshake: R,
) where
    P: FnMut() -> bool,
    R: FnMut() -> RFut,
    RFut: Future<Output = bool>,
{
    let mut ticker = interval(poll_interval);

    loop {
        if peer_disconnected() {
            return;
        }
        tokio::select! {
            () = shutdown.wait() => return,
            _ = ticker.tick() => {
                if try_send_handshake().await {
                    return;
                }
            }
        }
    }
}
