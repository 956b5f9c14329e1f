use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const SLOW_TASK: Duration = Duration::from_millis(250);

/// Where the worker opens its connection.
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

impl Location {
    fn open(&self) -> Result<Connection> {
        let conn = match self {
            Location::File(path) => Connection::open(path)
                .with_context(|| format!("failed to open SQLite database {}", path.display()))?,
            Location::Memory => {
                Connection::open_in_memory().context("failed to open in-memory database")?
            }
        };

        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed to set busy timeout")?;
        if let Location::File(_) = self {
            if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                warn!("Could not enable WAL mode, using default journal: {err}");
            }
            conn.pragma_update(None, "synchronous", "NORMAL")
                .context("failed to set synchronous mode")?;
        }
        Ok(conn)
    }

    fn describe(&self) -> String {
        match self {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }
}

struct Worker {
    /// Dropping the sender is the shutdown signal.
    sender: Option<mpsc::Sender<DbTask>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        drop(self.sender.take());

        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Capture database thread panicked");
            }
        }
    }
}

/// Handle to the capture store. One thread owns the SQLite connection and
/// runs queued tasks in submission order; clones share that thread.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    location: Arc<Location>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        Self::spawn(Location::File(db_path))
    }

    /// A private database that disappears with the last handle.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(Location::Memory)
    }

    fn spawn(location: Location) -> Result<Self> {
        let (task_tx, task_rx) = mpsc::channel::<DbTask>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_location = location.clone();

        let handle = thread::Builder::new()
            .name("capture-db".into())
            .spawn(move || {
                let mut conn = match thread_location
                    .open()
                    .and_then(|mut conn| run_migrations(&mut conn).map(|_| conn))
                {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                for task in task_rx {
                    task(&mut conn);
                }
                debug!("Capture database worker for {} stopped", thread_location.describe());
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited during startup")??;
        info!("Capture database ready at {}", location.describe());

        Ok(Self {
            worker: Arc::new(Worker {
                sender: Some(task_tx),
                handle: Mutex::new(Some(handle)),
            }),
            location: Arc::new(location),
        })
    }

    /// File backing this database, `None` for an in-memory one.
    pub fn path(&self) -> Option<&Path> {
        match self.location.as_ref() {
            Location::File(path) => Some(path.as_path()),
            Location::Memory => None,
        }
    }

    /// Runs `task` on the database thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .worker
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("capture database is shut down"))?;
        let (reply_tx, reply_rx) = oneshot::channel();

        let queued_at = Instant::now();
        sender
            .send(Box::new(move |conn: &mut Connection| {
                let result = task(conn);
                let elapsed = queued_at.elapsed();
                if elapsed >= SLOW_TASK {
                    warn!("Capture database task took {}ms", elapsed.as_millis());
                }
                let _ = reply_tx.send(result);
            }))
            .map_err(|_| anyhow!("capture database worker is gone"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("capture database worker dropped the reply"))?
    }
}
