use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ids::IdGenerator;
use crate::kv::{KeyValueStore, KvError};
pub use crate::task::DeletePolicy;
use crate::task::{Task, TaskId, ValidationError, normalize_text};

pub const DEFAULT_KEY: &str = "tasks";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read slot {key:?}")]
    Read {
        key: String,
        #[source]
        source: KvError,
    },

    #[error("failed to parse snapshot in slot {key:?}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{operation} is not available with the {policy} delete policy")]
    Unsupported {
        operation: &'static str,
        policy: DeletePolicy,
    },

    #[error("no edit in progress")]
    NoActiveEdit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    Failed(String),
}

/// Result of one mutation: the list before and after, plus how the write went.
#[derive(Debug, Clone)]
pub struct Transition {
    pub before: Vec<Task>,
    pub after: Vec<Task>,
    pub persist: PersistOutcome,
    pub policy: DeletePolicy,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }

    pub fn persisted(&self) -> bool {
        self.persist == PersistOutcome::Written
    }

    /// The task appended by this transition, if any.
    pub fn added(&self) -> Option<&Task> {
        if self.after.len() > self.before.len() {
            self.after.last()
        } else {
            None
        }
    }

    pub fn active_before(&self) -> Vec<&Task> {
        self.before.iter().filter(|t| self.policy.is_active(t)).collect()
    }

    pub fn active_after(&self) -> Vec<&Task> {
        self.after.iter().filter(|t| self.policy.is_active(t)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub id: TaskId,
    pub draft: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

/// Owns the canonical task list and writes a full snapshot after every mutation.
#[derive(Debug)]
pub struct TaskStore<K> {
    kv: K,
    key: String,
    policy: DeletePolicy,
    tasks: Vec<Task>,
    ids: IdGenerator,
    edit: Option<EditSession>,
}

impl<K: KeyValueStore> TaskStore<K> {
    /// Reads the persisted snapshot. Unreadable or corrupt snapshots are logged
    /// and the store starts empty.
    #[tracing::instrument(skip_all, fields(%policy))]
    pub fn load(kv: K, key: impl Into<String>, policy: DeletePolicy) -> Self {
        let key = key.into();
        debug!(key = %key, "loading tasks");

        let tasks = match load_tasks(&kv, &key) {
            Ok(tasks) => dedupe_ids(tasks),
            Err(err) => {
                error!(error = ?err, "failed to load tasks; starting empty");
                Vec::new()
            }
        };
        for task in tasks.iter().filter(|t| t.text.trim().is_empty()) {
            warn!(id = %task.id, "loaded task has empty text");
        }
        info!(key = %key, count = tasks.len(), "loaded tasks");

        let mut ids = IdGenerator::new();
        ids.seed(&tasks);

        Self {
            kv,
            key,
            policy,
            tasks,
            ids,
            edit: None,
        }
    }

    pub fn with_id_generator(mut self, mut ids: IdGenerator) -> Self {
        ids.seed(&self.tasks);
        self.ids = ids;
        self
    }

    pub fn policy(&self) -> DeletePolicy {
        self.policy
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }

    pub fn backend_mut(&mut self) -> &mut K {
        &mut self.kv
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn active_view(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| self.policy.is_active(t)).collect()
    }

    pub fn deleted_view(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| !self.policy.is_active(t)).collect()
    }

    pub fn summary(&self) -> Summary {
        let active = self.active_view();
        let completed = active.iter().filter(|t| t.completed).count();
        Summary {
            total: active.len(),
            completed,
            pending: active.len() - completed,
        }
    }

    #[tracing::instrument(skip(self, text))]
    pub fn add(&mut self, text: &str) -> Result<Transition, StoreError> {
        let text = normalize_text(text).inspect_err(|_| debug!("rejected empty task text"))?;
        let id = self.ids.next_id(&self.tasks);
        info!(%id, "adding task");
        let task = Task::new(id, text, self.policy);
        Ok(self.apply(|tasks| tasks.push(task)))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn toggle_complete(&mut self, id: &TaskId) -> Transition {
        self.update_one(id, |task| task.completed = !task.completed)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn soft_delete(&mut self, id: &TaskId) -> Result<Transition, StoreError> {
        self.require(DeletePolicy::Soft, "soft_delete")?;
        Ok(self.update_one(id, |task| task.deleted = Some(true)))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn restore(&mut self, id: &TaskId) -> Result<Transition, StoreError> {
        self.require(DeletePolicy::Soft, "restore")?;
        Ok(self.update_one(id, |task| task.deleted = Some(false)))
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn hard_delete(&mut self, id: &TaskId) -> Result<Transition, StoreError> {
        self.require(DeletePolicy::Hard, "hard_delete")?;
        if self.edit.as_ref().is_some_and(|s| &s.id == id) {
            debug!("dropping edit session for removed task");
            self.edit = None;
        }
        Ok(self.apply(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| &t.id != id);
            if tasks.len() == before {
                debug!("no task with this id; nothing removed");
            }
        }))
    }

    pub fn begin_edit(&mut self, id: &TaskId, current_text: &str) {
        debug!(%id, "begin edit");
        self.edit = Some(EditSession {
            id: id.clone(),
            draft: current_text.to_string(),
        });
    }

    pub fn set_draft(&mut self, text: &str) -> Result<(), StoreError> {
        let session = self.edit.as_mut().ok_or(StoreError::NoActiveEdit)?;
        session.draft = text.to_string();
        Ok(())
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    pub fn editing(&self) -> Option<&TaskId> {
        self.edit.as_ref().map(|s| &s.id)
    }

    pub fn draft(&self) -> Option<&str> {
        self.edit.as_ref().map(|s| s.draft.as_str())
    }

    /// Writes the draft into the task. An empty draft is rejected and the
    /// session stays open.
    #[tracing::instrument(skip(self))]
    pub fn commit_edit(&mut self) -> Result<Transition, StoreError> {
        let session = self.edit.as_ref().ok_or(StoreError::NoActiveEdit)?;
        let text = normalize_text(&session.draft)?;
        let id = session.id.clone();
        self.edit = None;
        info!(%id, "committing edit");
        Ok(self.update_one(&id, |task| task.text = text))
    }

    pub fn commit_edit_with(&mut self, text: &str) -> Result<Transition, StoreError> {
        self.set_draft(text)?;
        self.commit_edit()
    }

    pub fn cancel_edit(&mut self) -> Option<EditSession> {
        let session = self.edit.take();
        if let Some(session) = &session {
            debug!(id = %session.id, "edit cancelled");
        }
        session
    }

    /// Serializes the whole list into the slot, replacing the previous value.
    #[tracing::instrument(skip(self), fields(key = %self.key, count = self.tasks.len()))]
    pub fn persist(&mut self) -> PersistOutcome {
        let written = serde_json::to_string(&self.tasks)
            .map_err(|err| err.to_string())
            .and_then(|json| self.kv.set(&self.key, &json).map_err(|err| err.to_string()));

        match written {
            Ok(()) => {
                debug!("persisted tasks");
                PersistOutcome::Written
            }
            Err(reason) => {
                error!(error = %reason, "failed to save tasks");
                PersistOutcome::Failed(reason)
            }
        }
    }

    fn require(&self, policy: DeletePolicy, operation: &'static str) -> Result<(), StoreError> {
        if self.policy == policy {
            Ok(())
        } else {
            warn!(operation, policy = %self.policy, "operation not available");
            Err(StoreError::Unsupported {
                operation,
                policy: self.policy,
            })
        }
    }

    fn update_one<F>(&mut self, id: &TaskId, f: F) -> Transition
    where
        F: FnOnce(&mut Task),
    {
        self.apply(|tasks| match tasks.iter_mut().find(|t| &t.id == id) {
            Some(task) => f(task),
            None => debug!(%id, "no task with this id; nothing changed"),
        })
    }

    fn apply<F>(&mut self, mutate: F) -> Transition
    where
        F: FnOnce(&mut Vec<Task>),
    {
        let before = self.tasks.clone();
        mutate(&mut self.tasks);
        let persist = self.persist();
        Transition {
            before,
            after: self.tasks.clone(),
            persist,
            policy: self.policy,
        }
    }
}

/// Reads and parses the slot without any fallback. An empty value counts as
/// no snapshot.
pub fn load_tasks<K: KeyValueStore + ?Sized>(kv: &K, key: &str) -> Result<Vec<Task>, LoadError> {
    let raw = kv.get(key).map_err(|source| LoadError::Read {
        key: key.to_string(),
        source,
    })?;

    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        debug!(key, "no stored snapshot");
        return Ok(Vec::new());
    };

    serde_json::from_str(&raw).map_err(|source| LoadError::Parse {
        key: key.to_string(),
        source,
    })
}

fn dedupe_ids(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks
        .into_iter()
        .filter(|task| {
            let fresh = seen.insert(task.id.clone());
            if !fresh {
                warn!(id = %task.id, "dropping task with duplicate id");
            }
            fresh
        })
        .collect()
}
