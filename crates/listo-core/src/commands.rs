use std::io::Write;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::cli::Command;
use crate::config::Config;
use crate::kv::KeyValueStore;
use crate::render::{ACTIVE_EMPTY, ACTIVE_TITLE, DELETED_EMPTY, DELETED_TITLE, Renderer};
use crate::store::{DeletePolicy, PersistOutcome, TaskStore, Transition, load_tasks};
use crate::task::{Task, TaskId, share_message};

#[instrument(skip(store, cfg, renderer, out))]
pub fn dispatch<K, W>(
    store: &mut TaskStore<K>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()>
where
    K: KeyValueStore,
    W: Write,
{
    debug!(policy = %store.policy(), "dispatching command");

    match command {
        Command::Add { text } => cmd_add(store, &text.join(" "), out),
        Command::List => renderer.write_task_list(out, ACTIVE_TITLE, &store.active_view(), ACTIVE_EMPTY),
        Command::Deleted => cmd_deleted(store, renderer, out),
        Command::All => {
            let all: Vec<_> = store.tasks().iter().collect();
            renderer.write_task_list(out, "All tasks", &all, ACTIVE_EMPTY)
        }
        Command::Toggle { id } => {
            require_active(store, &id)?;
            let t = store.toggle_complete(&id);
            report(&t);
            let done = store.get(&id).is_some_and(|task| task.completed);
            writeln!(out, "Task {id} marked {}.", if done { "done" } else { "not done" })?;
            Ok(())
        }
        Command::Delete { id } => cmd_delete(store, &id, out),
        Command::Restore { id } => {
            require_known(store, &id)?;
            let t = store.restore(&id)?;
            report(&t);
            writeln!(out, "Restored task {id}.")?;
            Ok(())
        }
        Command::Edit { id, text } => {
            let current = require_active(store, &id)?.text.clone();
            store.begin_edit(&id, &current);
            match store.commit_edit_with(&text.join(" ")) {
                Ok(t) => {
                    report(&t);
                    writeln!(out, "Edited task {id}.")?;
                    Ok(())
                }
                Err(err) => {
                    store.cancel_edit();
                    Err(err.into())
                }
            }
        }
        Command::Stats => renderer.write_summary(out, store.summary()),
        Command::Share { id } => {
            let task = require_active(store, &id)?;
            writeln!(out, "{}", share_message(&cfg.share_prefix(), task))?;
            Ok(())
        }
        Command::Doctor => cmd_doctor(store, out),
        Command::Show => {
            for (k, v) in cfg.iter() {
                writeln!(out, "{k}={v}")?;
            }
            for file in &cfg.loaded_files {
                writeln!(out, "# loaded {}", file.display())?;
            }
            Ok(())
        }
    }
}

fn cmd_add<K: KeyValueStore, W: Write>(store: &mut TaskStore<K>, text: &str, out: &mut W) -> anyhow::Result<()> {
    info!("command add");
    let t = store.add(text)?;
    report(&t);
    let task = t.added().context("add did not append a task")?;
    writeln!(out, "Created task {}.", task.id)?;
    Ok(())
}

fn cmd_deleted<K: KeyValueStore, W: Write>(
    store: &TaskStore<K>,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    if store.policy() == DeletePolicy::Hard {
        return Err(anyhow!("deleted tasks are not kept with the hard delete policy"));
    }
    renderer.write_task_list(out, DELETED_TITLE, &store.deleted_view(), DELETED_EMPTY)
}

fn cmd_delete<K: KeyValueStore, W: Write>(store: &mut TaskStore<K>, id: &TaskId, out: &mut W) -> anyhow::Result<()> {
    info!(%id, "command delete");
    require_known(store, id)?;
    let t = match store.policy() {
        DeletePolicy::Soft => store.soft_delete(id)?,
        DeletePolicy::Hard => store.hard_delete(id)?,
    };
    report(&t);
    writeln!(out, "Deleted task {id}.")?;
    Ok(())
}

fn cmd_doctor<K: KeyValueStore, W: Write>(store: &TaskStore<K>, out: &mut W) -> anyhow::Result<()> {
    match load_tasks(store.backend(), store.key()) {
        Ok(tasks) => {
            let deleted = tasks.iter().filter(|t| !store.policy().is_active(t)).count();
            writeln!(
                out,
                "slot {:?}: ok, {} tasks ({} deleted)",
                store.key(),
                tasks.len(),
                deleted
            )?;
        }
        Err(err) => {
            writeln!(out, "slot {:?}: {err:#}", store.key())?;
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                writeln!(out, "  caused by: {cause}")?;
                source = std::error::Error::source(cause);
            }
        }
    }
    Ok(())
}

// The store treats unknown ids as no-ops; the command line reports them.
fn require_known<K: KeyValueStore>(store: &TaskStore<K>, id: &TaskId) -> anyhow::Result<()> {
    if store.get(id).is_none() {
        return Err(anyhow!("no task with id {id}"));
    }
    Ok(())
}

// Toggle, edit and share act on the active list only.
fn require_active<'a, K: KeyValueStore>(store: &'a TaskStore<K>, id: &TaskId) -> anyhow::Result<&'a Task> {
    let task = store.get(id).ok_or_else(|| anyhow!("no task with id {id}"))?;
    if !store.policy().is_active(task) {
        return Err(anyhow!("task {id} is deleted; restore it first"));
    }
    Ok(task)
}

fn report(t: &Transition) {
    if let PersistOutcome::Failed(reason) = &t.persist {
        warn!(%reason, "change kept in memory only");
        eprintln!("warning: failed to save tasks: {reason}");
    }
}
