use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};
use tracing::{error, info};

use crate::scanner::{ScanReport, Scanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCommand {
    /// Run a scan now, or once more after the current one if busy.
    Scan,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Scanning,
    Stopped,
}

/// Latest cycle outcome as published to subscribers.
#[derive(Debug, Clone)]
pub enum ScanResult {
    Completed(Arc<ScanReport>),
    /// The cycle could not run at all. Distinct from "no opportunities".
    Unavailable { cycle_id: u64, reason: String },
}

/// Cloneable handle for whatever drives or consumes scans (timer, transport).
#[derive(Clone)]
pub struct ScanHandle {
    command_tx: mpsc::Sender<ScanCommand>,
    state: Arc<RwLock<ServiceState>>,
    result_rx: watch::Receiver<Option<ScanResult>>,
}

impl ScanHandle {
    pub async fn request_scan(&self) {
        let _ = self.command_tx.send(ScanCommand::Scan).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(ScanCommand::Shutdown).await;
    }

    pub async fn state(&self) -> ServiceState {
        *self.state.read().await
    }

    /// Most recent published result, if any cycle has finished.
    pub fn latest(&self) -> Option<ScanResult> {
        self.result_rx.borrow().clone()
    }

    /// Receiver that wakes on every published result.
    pub fn subscribe(&self) -> watch::Receiver<Option<ScanResult>> {
        self.result_rx.clone()
    }
}

/// Owns the scanner and guarantees at most one cycle in flight. Requests that
/// arrive mid-cycle collapse into a single follow-up cycle; each finished
/// cycle replaces the published result wholesale.
pub struct ScanService {
    scanner: Scanner,
    state: Arc<RwLock<ServiceState>>,
    command_rx: mpsc::Receiver<ScanCommand>,
    result_tx: watch::Sender<Option<ScanResult>>,
    next_cycle: u64,
}

impl ScanService {
    pub fn new(scanner: Scanner) -> (Self, ScanHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (result_tx, result_rx) = watch::channel(None);
        let state = Arc::new(RwLock::new(ServiceState::Idle));

        let handle = ScanHandle {
            command_tx,
            state: state.clone(),
            result_rx,
        };
        let service = ScanService {
            scanner,
            state,
            command_rx,
            result_tx,
            next_cycle: 1,
        };
        (service, handle)
    }

    /// Command loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(symbols = self.scanner.settings().symbols.len(), "Scan service ready");

        while let Some(ScanCommand::Scan) = self.command_rx.recv().await {
            let mut follow_up = true;
            while follow_up {
                follow_up = false;
                if let Err(Shutdown) = self.scan_once(&mut follow_up).await {
                    *self.state.write().await = ServiceState::Stopped;
                    info!("Scan service stopped mid-cycle");
                    return;
                }
            }
        }

        *self.state.write().await = ServiceState::Stopped;
        info!("Scan service stopped");
    }

    /// Run one cycle while still draining commands. Extra scan requests set
    /// `follow_up`; a shutdown drops the in-flight cycle.
    async fn scan_once(&mut self, follow_up: &mut bool) -> Result<(), Shutdown> {
        let cycle_id = self.next_cycle;
        self.next_cycle += 1;
        *self.state.write().await = ServiceState::Scanning;

        let scan = self.scanner.run_cycle(cycle_id);
        tokio::pin!(scan);

        let result = loop {
            tokio::select! {
                result = &mut scan => break result,
                cmd = self.command_rx.recv() => match cmd {
                    Some(ScanCommand::Scan) => {
                        if !*follow_up {
                            info!(cycle_id, "Scan requested mid-cycle, queued one follow-up");
                        }
                        *follow_up = true;
                    }
                    Some(ScanCommand::Shutdown) | None => return Err(Shutdown),
                },
            }
        };

        let published = match result {
            Ok(report) => ScanResult::Completed(Arc::new(report)),
            Err(e) => {
                error!(cycle_id, error = %e, "Scan cycle could not run");
                ScanResult::Unavailable {
                    cycle_id,
                    reason: e.to_string(),
                }
            }
        };
        self.result_tx.send_replace(Some(published));
        *self.state.write().await = ServiceState::Idle;
        Ok(())
    }
}

struct Shutdown;
