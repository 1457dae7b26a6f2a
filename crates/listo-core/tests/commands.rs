use listo_core::cli::Command;
use listo_core::commands::dispatch;
use listo_core::config::Config;
use listo_core::ids::IdGenerator;
use listo_core::kv::MemoryKv;
use listo_core::render::Renderer;
use listo_core::store::{DEFAULT_KEY, DeletePolicy, TaskStore};
use listo_core::task::TaskId;

struct Session {
    store: TaskStore<MemoryKv>,
    cfg: Config,
}

impl Session {
    fn new(policy: DeletePolicy) -> Self {
        let mut next = 100;
        let store = TaskStore::load(MemoryKv::new(), DEFAULT_KEY, policy).with_id_generator(
            IdGenerator::with_clock(move || {
                next += 1;
                next
            }),
        );
        Self {
            store,
            cfg: Config::default(),
        }
    }

    fn run(&mut self, command: Command) -> anyhow::Result<String> {
        let mut out = Vec::new();
        dispatch(&mut self.store, &self.cfg, &Renderer::plain(), command, &mut out)?;
        Ok(String::from_utf8(out).expect("utf8 output"))
    }

    fn add(&mut self, text: &str) -> String {
        self.run(Command::Add {
            text: text.split(' ').map(str::to_string).collect(),
        })
        .expect("add")
    }
}

#[test]
fn add_list_toggle_flow() {
    let mut s = Session::new(DeletePolicy::Soft);
    assert_eq!(s.add("Buy milk"), "Created task 101.\n");
    s.add("Walk dog");

    let out = s.run(Command::Toggle { id: TaskId::from(101) }).unwrap();
    assert_eq!(out, "Task 101 marked done.\n");

    let list = s.run(Command::List).unwrap();
    assert!(list.starts_with("Tasks\n"));
    assert!(list.contains("Buy milk"));
    assert!(list.contains("Walk dog"));

    let stats = s.run(Command::Stats).unwrap();
    assert_eq!(stats, "Total: 2 | Completed: 1 | Pending: 1\n");
}

#[test]
fn delete_moves_task_to_deleted_screen_and_back() {
    let mut s = Session::new(DeletePolicy::Soft);
    s.add("A");
    s.add("B");

    assert_eq!(s.run(Command::Deleted).unwrap(), "Deleted tasks\nNo deleted tasks.\n");

    s.run(Command::Delete { id: TaskId::from(101) }).unwrap();
    let deleted = s.run(Command::Deleted).unwrap();
    assert!(deleted.contains('A'));
    assert!(!deleted.contains("No deleted tasks."));
    assert!(!s.run(Command::List).unwrap().contains(" A "));

    s.run(Command::Restore { id: TaskId::from(101) }).unwrap();
    assert_eq!(s.store.active_view().len(), 2);
}

#[test]
fn deleted_task_must_be_restored_before_it_can_change() {
    let mut s = Session::new(DeletePolicy::Soft);
    s.add("Buy milk");
    s.run(Command::Delete { id: TaskId::from(101) }).unwrap();

    let err = s.run(Command::Toggle { id: TaskId::from(101) }).unwrap_err();
    assert_eq!(err.to_string(), "task 101 is deleted; restore it first");
    let err = s
        .run(Command::Edit {
            id: TaskId::from(101),
            text: vec!["Oat".to_string(), "milk".to_string()],
        })
        .unwrap_err();
    assert!(err.to_string().contains("restore it first"));
    assert!(s.run(Command::Share { id: TaskId::from(101) }).is_err());

    let task = &s.store.tasks()[0];
    assert_eq!(task.text, "Buy milk");
    assert!(!task.completed);
    assert_eq!(s.store.editing(), None);

    s.run(Command::Restore { id: TaskId::from(101) }).unwrap();
    assert_eq!(s.run(Command::Toggle { id: TaskId::from(101) }).unwrap(), "Task 101 marked done.\n");
}

#[test]
fn hard_policy_removes_and_has_no_deleted_screen() {
    let mut s = Session::new(DeletePolicy::Hard);
    s.add("A");

    s.run(Command::Delete { id: TaskId::from(101) }).unwrap();
    assert!(s.store.tasks().is_empty());
    assert!(s.run(Command::Deleted).is_err());
    assert!(s.run(Command::Restore { id: TaskId::from(101) }).is_err());
}

#[test]
fn unknown_id_is_reported() {
    let mut s = Session::new(DeletePolicy::Soft);
    let err = s.run(Command::Toggle { id: TaskId::from(7) }).unwrap_err();
    assert!(err.to_string().contains("no task with id 7"));
}

#[test]
fn blank_add_and_blank_edit_fail() {
    let mut s = Session::new(DeletePolicy::Hard);
    let err = s.run(Command::Add { text: vec!["  ".to_string()] }).unwrap_err();
    assert_eq!(err.to_string(), "task text cannot be empty");

    s.add("A");
    let err = s
        .run(Command::Edit {
            id: TaskId::from(101),
            text: vec![" ".to_string()],
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "task text cannot be empty");
    assert_eq!(s.store.tasks()[0].text, "A");
    assert_eq!(s.store.editing(), None);

    s.run(Command::Edit {
        id: TaskId::from(101),
        text: vec!["Apples".to_string(), "and".to_string(), "pears".to_string()],
    })
    .unwrap();
    assert_eq!(s.store.tasks()[0].text, "Apples and pears");
}

#[test]
fn share_uses_configured_prefix() {
    let mut s = Session::new(DeletePolicy::Soft);
    s.add("Buy milk");
    assert_eq!(s.run(Command::Share { id: TaskId::from(101) }).unwrap(), "Mi Tarea: Buy milk\n");

    s.cfg.apply_overrides([("rc.share.prefix".to_string(), "My task".to_string())]);
    assert_eq!(s.run(Command::Share { id: TaskId::from(101) }).unwrap(), "My task: Buy milk\n");
}

#[test]
fn doctor_reports_snapshot_health() {
    let mut s = Session::new(DeletePolicy::Soft);
    s.add("A");
    s.add("B");
    s.run(Command::Delete { id: TaskId::from(102) }).unwrap();
    assert_eq!(s.run(Command::Doctor).unwrap(), "slot \"tasks\": ok, 2 tasks (1 deleted)\n");

    let broken = MemoryKv::with_slot(DEFAULT_KEY, "{oops");
    let mut s = Session {
        store: TaskStore::load(broken, DEFAULT_KEY, DeletePolicy::Soft),
        cfg: Config::default(),
    };
    let report = s.run(Command::Doctor).unwrap();
    assert!(report.starts_with("slot \"tasks\": failed to parse snapshot"));
    assert!(report.contains("caused by:"));
}
