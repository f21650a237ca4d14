use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use forge_core::TaskPriority;

/// One backlog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocketTask {
    pub id: u64,
    pub title: String,
    pub priority: TaskPriority,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

/// Persistent JSON task backlog.
///
/// Small enough to rewrite whole on every mutation; the scheduler reads
/// open tasks each tick to decide what to work on.
pub struct Docket {
    path: PathBuf,
    tasks: Mutex<Vec<DocketTask>>,
}

impl Docket {
    /// Load the docket, starting empty when the file does not exist.
    pub fn load(path: &Path) -> forge_core::Result<Self> {
        let tasks = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(path)?)?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            tasks: Mutex::new(tasks),
        })
    }

    /// Append a task and persist. Returns its id.
    pub fn add(&self, title: &str, priority: TaskPriority) -> forge_core::Result<u64> {
        let mut tasks = self.tasks.lock();
        let id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        tasks.push(DocketTask {
            id,
            title: title.to_string(),
            priority,
            done: false,
            created_at: Utc::now(),
        });
        debug!(id, title, "task added to docket");
        self.persist(&tasks)?;
        Ok(id)
    }

    pub fn list_tasks(&self) -> Vec<DocketTask> {
        self.tasks.lock().clone()
    }

    /// Open tasks, high priority first, then oldest first.
    pub fn open_tasks(&self) -> Vec<DocketTask> {
        let mut open: Vec<_> = self
            .tasks
            .lock()
            .iter()
            .filter(|t| !t.done)
            .cloned()
            .collect();
        open.sort_by_key(|t| (t.priority != TaskPriority::High, t.id));
        open
    }

    /// Mark a task done. Returns false when no such task.
    pub fn complete(&self, id: u64) -> forge_core::Result<bool> {
        let mut tasks = self.tasks.lock();
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        task.done = true;
        self.persist(&tasks)?;
        Ok(true)
    }

    /// Drop completed tasks. Returns how many were removed.
    pub fn clear_done(&self) -> forge_core::Result<usize> {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| !t.done);
        let removed = before - tasks.len();
        if removed > 0 {
            self.persist(&tasks)?;
        }
        Ok(removed)
    }

    fn persist(&self, tasks: &[DocketTask]) -> forge_core::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(tasks)?)?;
        Ok(())
    }
}
