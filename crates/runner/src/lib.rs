//! Runs long-lived processes side by side and shuts them down together.
//!
//! Every process receives the same [`CancellationToken`]. The token is
//! cancelled on SIGINT/SIGTERM or as soon as one process fails. Once every
//! process has returned, the closers run under a shared timeout.

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub type AppProcess =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

pub type Closer = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

pub struct Runner {
    processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds a process; its name shows up in the shutdown logs
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let process: AppProcess = Box::new(
            move |token| -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(process(token)) },
        );
        self.processes.push((name.into(), process));
        self
    }

    /// Adds a cleanup step that runs after every process has stopped
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(
            move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(closer()) },
        ));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs until every process has returned, then runs the closers.
    ///
    /// Returns the first process failure, if any. Closer failures are logged
    /// only.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        let signal_token = token.clone();
        let signal_task = tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_shutdown_signal() => {
                    info!("Received shutdown signal");
                    signal_token.cancel();
                }
                _ = signal_token.cancelled() => {}
            }
        });

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "process stopped");
                }
                Ok((name, Err(err))) => {
                    error!(process = %name, "process failed: {:#}", err);
                    if first_error.is_none() {
                        first_error = Some(err.context(format!("process {} failed", name)));
                    }
                    token.cancel();
                }
                Err(join_err) => {
                    error!("process panicked: {}", join_err);
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("process panicked: {}", join_err));
                    }
                    token.cancel();
                }
            }
        }

        token.cancel();
        signal_task.abort();

        run_closers(self.closers, self.closer_timeout).await;

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("All processes stopped");
                Ok(())
            }
        }
    }
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    info!("Running closers with timeout of {:?}", timeout);

    let all = async {
        for closer in closers {
            if let Err(err) = closer().await {
                error!("closer failed: {:#}", err);
            }
        }
    };

    if tokio::time::timeout(timeout, all).await.is_err() {
        error!("Closers timed out after {:?}", timeout);
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            error!("Error setting up SIGTERM handler: {}", err);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
