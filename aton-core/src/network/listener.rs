//! TCP listener that feeds renderer connections to [`Session`]s, one at a
//! time, on a background Tokio task.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AtonError, BindError};
use crate::frame::{FrameObserver, SharedFrame};
use crate::network::session::{Session, SessionEnd};
use crate::state::SessionPhase;

/// Pause after a failed `accept` so a persistent error cannot spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The accept task and the handles needed to stop it.
struct ActiveListener {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the listening socket and the task serving it.
///
/// `start`/`stop` take `&mut self`, so they can never race each other.
pub struct Listener {
    bind_ip: IpAddr,
    frame: Arc<SharedFrame>,
    observer: Arc<dyn FrameObserver>,
    phase: watch::Sender<SessionPhase>,
    active: Option<ActiveListener>,
}

impl Listener {
    /// A stopped listener that will bind on all interfaces.
    pub fn new(frame: Arc<SharedFrame>, observer: Arc<dyn FrameObserver>) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            frame,
            observer,
            phase,
            active: None,
        }
    }

    /// Bind on `ip` instead of all interfaces.
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Bind `port` (0 picks an ephemeral port) and begin accepting.
    pub async fn start(&mut self, port: u16) -> Result<(), BindError> {
        if let Some(active) = &self.active {
            if !active.task.is_finished() {
                return Err(BindError::AlreadyListening(active.local_addr.port()));
            }
        }
        // A `Shutdown` message may have ended the task; reap it before rebinding.
        self.stop().await;

        let addr = SocketAddr::new(self.bind_ip, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BindError::Unavailable { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BindError::Unavailable { port, source })?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.frame),
            Arc::clone(&self.observer),
            self.phase.clone(),
            cancel.clone(),
        ));

        info!("listening on {local_addr}");
        self.active = Some(ActiveListener {
            local_addr,
            cancel,
            task,
        });
        Ok(())
    }

    /// Cancel the session and pending accept, wait for the task, release
    /// the socket. Does nothing when not listening.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancel.cancel();
        if let Err(e) = active.task.await {
            warn!("listener task on {} ended abnormally: {e}", active.local_addr);
        }
        self.phase.send_modify(SessionPhase::reset);
        info!("stopped listening on {}", active.local_addr);
    }

    pub async fn restart(&mut self, port: u16) -> Result<(), BindError> {
        self.stop().await;
        self.start(port).await
    }

    /// Address of the bound socket while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.active.as_ref().map(|active| active.local_addr)
    }

    /// `true` while the accept task is alive.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Follow the session phase as it changes.
    pub fn phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    frame: Arc<SharedFrame>,
    observer: Arc<dyn FrameObserver>,
    phase: watch::Sender<SessionPhase>,
    cancel: CancellationToken,
) {
    loop {
        advance(&phase, SessionPhase::begin_accept);

        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept error: {e}");
                if backoff(&cancel).await {
                    continue;
                }
                break;
            }
        };

        info!("renderer connected from {peer}");
        advance(&phase, SessionPhase::connect);

        let end = Session::new(&frame, &observer, &phase)
            .run(stream, &cancel)
            .await;
        phase.send_modify(SessionPhase::terminate);

        match end {
            SessionEnd::Disconnected => info!("renderer {peer} disconnected"),
            SessionEnd::Failed(e) if e.is_transport() => {
                warn!("connection to {peer} lost: {e}");
            }
            SessionEnd::Failed(e) => warn!("dropping {peer} after protocol error: {e}"),
            SessionEnd::Shutdown => {
                info!("shutdown requested by {peer}");
                break;
            }
            SessionEnd::Cancelled => break,
        }
    }

    phase.send_modify(SessionPhase::reset);
}

/// Wait out a failed `accept`. Returns `false` if cancelled meanwhile.
async fn backoff(cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => true,
    }
}

/// Apply a checked transition, logging it when the phase does not allow it.
fn advance(
    phase: &watch::Sender<SessionPhase>,
    step: fn(&mut SessionPhase) -> Result<(), AtonError>,
) {
    phase.send_modify(|current| {
        if let Err(e) = step(current) {
            warn!(%current, "{e}");
        }
    });
}
