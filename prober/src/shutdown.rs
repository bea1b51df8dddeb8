use tokio::sync::watch;
use tokio::task::JoinHandle;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Creates a connected trigger and token pair with no interrupts recorded.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(0_u32);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Records interrupts. The first asks for a graceful stop, the second forces it.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<u32>,
}

impl ShutdownTrigger {
    /// Returns how many interrupts have been recorded, this one included.
    pub fn interrupt(&self) -> u32 {
        let mut seen = 0;
        self.tx.send_modify(|count| {
            *count = count.saturating_add(1);
            seen = *count;
        });
        seen
    }
}

/// Read side handed to the request loop. Once requested, shutdown stays requested.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<u32>,
}

impl Shutdown {
    /// A token that is never triggered, for bounded runs.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(0_u32);
        Self { rx }
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow() >= 1
    }

    /// Resolves once a second interrupt has been recorded.
    pub async fn forced(&mut self) {
        if self.rx.wait_for(|count| *count >= 2).await.is_err() {
            // Trigger dropped, nothing can force us anymore.
            std::future::pending::<()>().await;
        }
    }
}

/// Feeds Ctrl+C (and SIGTERM on unix) into `trigger` until the second interrupt.
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler");
                None
            }
        };

        loop {
            #[cfg(unix)]
            let received = tokio::select! {
                res = tokio::signal::ctrl_c() => res,
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        if signal.recv().await.is_some() {
                            return;
                        }
                    }
                    std::future::pending::<()>().await;
                } => Ok(()),
            };
            #[cfg(not(unix))]
            let received = tokio::signal::ctrl_c().await;

            if let Err(err) = received {
                tracing::warn!(%err, "failed to listen for interrupts");
                return;
            }

            let seen = trigger.interrupt();
            tracing::info!(interrupts = seen, "interrupt received");
            if seen == 1 {
                println!("\nGraceful shutdown initiated... Completing current requests...");
            } else {
                return;
            }
        }
    })
}
