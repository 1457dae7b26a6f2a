use chrono::Utc;
use tracing::{trace, warn};

use crate::task::{Task, TaskId};

type Clock = Box<dyn FnMut() -> u64 + Send>;

/// Hands out millisecond-timestamp ids that never repeat within a session.
pub struct IdGenerator {
    last: u64,
    overflow: u64,
    clock: Clock,
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("last", &self.last)
            .field("overflow", &self.overflow)
            .finish_non_exhaustive()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_clock(now_millis)
    }

    pub fn with_clock<F>(clock: F) -> Self
    where
        F: FnMut() -> u64 + Send + 'static,
    {
        Self {
            last: 0,
            overflow: 0,
            clock: Box::new(clock),
        }
    }

    /// Moves the floor past every numeric id already in `tasks`.
    pub fn seed(&mut self, tasks: &[Task]) {
        if let Some(max) = tasks.iter().filter_map(|t| t.id.as_number()).max() {
            self.last = self.last.max(max);
        }
    }

    /// Once the numeric range is used up (a snapshot carrying `u64::MAX`),
    /// ids fall back to `<now>-<n>`, still unique within `existing`.
    pub fn next_id(&mut self, existing: &[Task]) -> TaskId {
        let now = (self.clock)();
        let mut candidate = self.last.checked_add(1).map(|floor| now.max(floor));
        while let Some(n) = candidate
            && existing.iter().any(|t| t.id.as_number() == Some(n))
        {
            candidate = n.checked_add(1);
        }

        match candidate {
            Some(n) => {
                self.last = n;
                trace!(id = n, "generated task id");
                TaskId::from(n)
            }
            None => self.suffixed_id(now, existing),
        }
    }

    fn suffixed_id(&mut self, now: u64, existing: &[Task]) -> TaskId {
        warn!(now, "numeric task ids exhausted; using suffixed id");
        loop {
            self.overflow = self.overflow.wrapping_add(1);
            let id = TaskId::from(format!("{now}-{}", self.overflow));
            if !existing.iter().any(|t| t.id == id) {
                trace!(%id, "generated task id");
                return id;
            }
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
