use std::time::SystemTime;
use tokio::sync::watch;

pub type RunId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running {
        run_id: RunId,
        started_at: SystemTime,
    },
    Completed {
        run_id: RunId,
        finished_at: SystemTime,
        stores: usize,
    },
    Failed {
        run_id: RunId,
        finished_at: SystemTime,
        reason: String,
    },
}

impl RunStatus {
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            RunStatus::Idle => None,
            RunStatus::Running { run_id, .. }
            | RunStatus::Completed { run_id, .. }
            | RunStatus::Failed { run_id, .. } => Some(*run_id),
        }
    }
}

/// Report run bookkeeping shared between the trigger and poll endpoints.
///
/// Each trigger starts a new run with a fresh id; only the latest run may record its outcome,
/// so a run overtaken by a newer trigger finishes without being published.
#[derive(Debug)]
pub struct AppState {
    status: RunStatus,
    status_tx: watch::Sender<RunStatus>,
    last_run_id: RunId,
}

impl AppState {
    pub fn new() -> Self {
        let (status_tx, _status_rx) = watch::channel(RunStatus::Idle);
        Self {
            status: RunStatus::Idle,
            status_tx,
            last_run_id: 0,
        }
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RunStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_current(&self, run_id: RunId) -> bool {
        self.last_run_id == run_id
    }

    pub fn begin_run(&mut self, started_at: SystemTime) -> RunId {
        self.last_run_id += 1;
        let run_id = self.last_run_id;
        self.set_status(RunStatus::Running { run_id, started_at });
        run_id
    }

    /// Records success of `run_id`. Returns `false` if a newer run has started.
    pub fn complete_run(&mut self, run_id: RunId, finished_at: SystemTime, stores: usize) -> bool {
        if !self.is_current(run_id) {
            return false;
        }
        self.set_status(RunStatus::Completed {
            run_id,
            finished_at,
            stores,
        });
        true
    }

    /// Records failure of `run_id`. Returns `false` if a newer run has started.
    pub fn fail_run(&mut self, run_id: RunId, finished_at: SystemTime, reason: String) -> bool {
        if !self.is_current(run_id) {
            return false;
        }
        self.set_status(RunStatus::Failed {
            run_id,
            finished_at,
            reason,
        });
        true
    }

    fn set_status(&mut self, status: RunStatus) {
        self.status = status.clone();
        // send_replace keeps the value even while nobody is subscribed
        self.status_tx.send_replace(status);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
