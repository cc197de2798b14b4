use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::{
    net::TcpListener,
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::ServerConfig,
    error::StartupError,
    network,
    router::{build_router, AppState},
};

/// Externally visible state of a [`ShareServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Running {
        addr: SocketAddr,
        root_dir: PathBuf,
    },
    /// The last `start` failed; holds the reason.
    Failed(String),
}

/// One run of the server: a bound listener serving one shared directory.
pub struct ShareSession {
    root_dir: PathBuf,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ShareSession {
    async fn open(root: &Path, config: &ServerConfig) -> Result<Self, StartupError> {
        let root_dir = tokio::fs::canonicalize(root)
            .await
            .map_err(|source| StartupError::InvalidRoot {
                path: root.to_path_buf(),
                source,
            })?;
        let metadata = tokio::fs::metadata(&root_dir)
            .await
            .map_err(|source| StartupError::InvalidRoot {
                path: root.to_path_buf(),
                source,
            })?;
        if !metadata.is_dir() {
            return Err(StartupError::NotADirectory(root_dir));
        }

        let addr = SocketAddr::new(config.bind_ip, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| StartupError::Bind { addr, source })?;

        let shutdown = CancellationToken::new();
        let app = build_router(
            AppState::new(root_dir.clone(), shutdown.clone(), config.shutdown_grace),
            &config.static_dir,
        );
        let signal = shutdown.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
            {
                error!("Server error: {}", e);
            }
        });

        info!("Serving files from: {}", root_dir.display());
        info!("Listening on: {}", local_addr);
        Ok(Self {
            root_dir,
            local_addr,
            shutdown,
            task: Some(task),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn close(mut self, grace: Duration) {
        self.shutdown.cancel();
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Server task ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "Connections still open after {:?}; abandoning server task",
                    grace
                );
                task.abort();
                let _ = task.await;
            }
        }
        info!("Stopped serving {}", self.root_dir.display());
    }
}

impl Drop for ShareSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Owns the single share session. `start`, `stop` and `restart` take the same
/// lock, so transitions never overlap. Status queries read a published
/// snapshot instead and never wait on a transition.
pub struct ShareServer {
    config: ServerConfig,
    session: Mutex<Option<ShareSession>>,
    status: watch::Sender<ServerStatus>,
}

impl ShareServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            status: watch::channel(ServerStatus::Stopped).0,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured port and starts sharing `root`. Starting while a
    /// session is running is an error; the running session is left alone.
    pub async fn start(&self, root: impl AsRef<Path>) -> Result<SocketAddr, StartupError> {
        let mut state = self.session.lock().await;
        self.start_locked(&mut state, root.as_ref()).await
    }

    /// Shuts the running session down, waiting up to the configured grace
    /// period for in-flight requests. Does nothing when nothing is running.
    pub async fn stop(&self) {
        let mut state = self.session.lock().await;
        self.stop_locked(&mut state).await;
    }

    /// Stops any running session and starts a new one on `root`.
    pub async fn restart(&self, root: impl AsRef<Path>) -> Result<SocketAddr, StartupError> {
        let mut state = self.session.lock().await;
        self.stop_locked(&mut state).await;
        self.start_locked(&mut state, root.as_ref()).await
    }

    pub async fn status(&self) -> ServerStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.status.borrow(), ServerStatus::Running { .. })
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.status.borrow() {
            ServerStatus::Running { addr, .. } => Some(*addr),
            _ => None,
        }
    }

    /// URL peers should use, e.g. `http://192.168.1.20:8000`. When bound to
    /// all interfaces this advertises the host's LAN address.
    pub async fn base_url(&self) -> Option<String> {
        let addr = self.local_addr().await?;
        let ip = if addr.ip().is_unspecified() {
            network::local_ipv4()
        } else {
            addr.ip()
        };
        Some(network::base_url(ip, addr.port()))
    }

    async fn start_locked(
        &self,
        state: &mut Option<ShareSession>,
        root: &Path,
    ) -> Result<SocketAddr, StartupError> {
        if let Some(session) = state {
            return Err(StartupError::AlreadyRunning(session.local_addr()));
        }
        match ShareSession::open(root, &self.config).await {
            Ok(session) => {
                let addr = session.local_addr();
                self.status.send_replace(ServerStatus::Running {
                    addr,
                    root_dir: session.root_dir().to_path_buf(),
                });
                *state = Some(session);
                Ok(addr)
            }
            Err(e) => {
                error!("Failed to start sharing {}: {}", root.display(), e);
                self.status.send_replace(ServerStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn stop_locked(&self, state: &mut Option<ShareSession>) {
        self.status.send_replace(ServerStatus::Stopped);
        if let Some(session) = state.take() {
            session.close(self.config.shutdown_grace).await;
        }
    }
}
