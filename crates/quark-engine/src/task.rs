//! Task-parallel engine.
//!
//! A [`TaskGroup`] owns a fixed pool of named worker threads fed by an
//! unbounded crossbeam channel. Tasks receive a [`TaskSpawner`] so they can
//! submit continuations. [`TaskGroup::run_and_wait`] runs a root task on
//! the calling thread and then helps drain the queue until every task
//! spawned directly or transitively has finished.
//!
//! Panics inside tasks are caught; the first one is reported by
//! `run_and_wait` as a [`TaskPanic`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use quark_core::error::panic_message;
use tracing::{debug, error};

type Task = Box<dyn FnOnce(&TaskSpawner) + Send + 'static>;

enum Message {
    Run(Task),
    Stop,
}

struct GroupState {
    pending: AtomicUsize,
    idle_tx: Sender<()>,
    panic: Mutex<Option<String>>,
}

impl GroupState {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Full means a wake-up is already queued.
            let _ = self.idle_tx.try_send(());
        }
    }
}

/// A task panicked while the group was running.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("task panicked: {0}")]
pub struct TaskPanic(pub String);

// ── TaskSpawner ────────────────────────────────────────────────────

/// Handle for submitting tasks to a [`TaskGroup`].
#[derive(Clone)]
pub struct TaskSpawner {
    tx: Sender<Message>,
    state: Arc<GroupState>,
}

impl TaskSpawner {
    /// Submit `task` for execution on any thread of the group.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce(&TaskSpawner) + Send + 'static,
    {
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(Message::Run(Box::new(task))).is_err() {
            self.state.finish_one();
        }
    }

    /// Tasks submitted and not yet finished.
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    fn execute<F: FnOnce(&TaskSpawner)>(&self, task: F) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task(self))) {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "task panicked");
            let mut slot = self.state.panic.lock();
            if slot.is_none() {
                *slot = Some(message);
            }
        }
        self.state.finish_one();
    }
}

// ── TaskGroup ──────────────────────────────────────────────────────

/// Fixed-size pool of worker threads plus the calling thread.
pub struct TaskGroup {
    spawner: TaskSpawner,
    rx: Receiver<Message>,
    idle_rx: Receiver<()>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskGroup {
    /// Create a group using `num_threads` threads in total: the caller of
    /// [`run_and_wait`](Self::run_and_wait) plus `num_threads - 1` workers.
    pub fn new(num_threads: usize) -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let (idle_tx, idle_rx) = bounded(1);
        let spawner = TaskSpawner {
            tx,
            state: Arc::new(GroupState {
                pending: AtomicUsize::new(0),
                idle_tx,
                panic: Mutex::new(None),
            }),
        };
        let mut group = Self {
            spawner,
            rx,
            idle_rx,
            workers: Vec::with_capacity(num_threads.saturating_sub(1)),
        };
        for i in 1..num_threads.max(1) {
            let rx = group.rx.clone();
            let spawner = group.spawner.clone();
            let handle = thread::Builder::new()
                .name(format!("quark-worker-{i}"))
                .spawn(move || worker_loop(rx, spawner))?;
            group.workers.push(handle);
        }
        debug!(threads = num_threads.max(1), "task group started");
        Ok(group)
    }

    /// Total thread count, including the waiting caller.
    pub fn num_threads(&self) -> usize {
        self.workers.len() + 1
    }

    /// Handle for submitting tasks.
    pub fn spawner(&self) -> &TaskSpawner {
        &self.spawner
    }

    /// Run `root` on the calling thread, then execute queued tasks until
    /// every task spawned during this call has finished.
    pub fn run_and_wait<F: FnOnce(&TaskSpawner)>(&self, root: F) -> Result<(), TaskPanic> {
        while self.idle_rx.try_recv().is_ok() {}
        self.spawner.state.pending.fetch_add(1, Ordering::AcqRel);
        self.spawner.execute(root);
        while self.spawner.pending() != 0 {
            select! {
                recv(self.rx) -> message => match message {
                    Ok(Message::Run(task)) => self.spawner.execute(task),
                    Ok(Message::Stop) | Err(_) => break,
                },
                recv(self.idle_rx) -> _ => {}
            }
        }
        match self.spawner.state.panic.lock().take() {
            Some(message) => Err(TaskPanic(message)),
            None => Ok(()),
        }
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.spawner.tx.send(Message::Stop);
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: Receiver<Message>, spawner: TaskSpawner) {
    while let Ok(message) = rx.recv() {
        match message {
            Message::Run(task) => spawner.execute(task),
            Message::Stop => break,
        }
    }
}

const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<TaskSpawner>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn fan_out(spawner: &TaskSpawner, depth: u32, counter: Arc<AtomicU64>) {
        counter.fetch_add(1, Ordering::Relaxed);
        if depth == 0 {
            return;
        }
        for _ in 0..2 {
            let counter = Arc::clone(&counter);
            spawner.spawn(move |s| fan_out(s, depth - 1, counter));
        }
    }

    #[test]
    fn waits_for_transitively_spawned_tasks() {
        let group = TaskGroup::new(4).unwrap();
        let counter = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&counter);
        group.run_and_wait(move |s| fan_out(s, 6, c)).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 127);
        assert_eq!(group.spawner().pending(), 0);
    }

    #[test]
    fn single_thread_group_runs_everything_inline() {
        let group = TaskGroup::new(1).unwrap();
        assert_eq!(group.num_threads(), 1);
        let counter = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&counter);
        group.run_and_wait(move |s| fan_out(s, 3, c)).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 15);
    }

    #[test]
    fn group_is_reusable_across_bursts() {
        let group = TaskGroup::new(3).unwrap();
        for _ in 0..5 {
            let counter = Arc::new(AtomicU64::new(0));
            let c = Arc::clone(&counter);
            group.run_and_wait(move |s| fan_out(s, 4, c)).unwrap();
            assert_eq!(counter.load(Ordering::Relaxed), 31);
        }
    }

    #[test]
    fn panicking_task_is_reported_and_siblings_finish() {
        let group = TaskGroup::new(2).unwrap();
        let counter = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&counter);
        let result = group.run_and_wait(move |s| {
            s.spawn(|_| panic!("lane exploded"));
            for _ in 0..10 {
                let c = Arc::clone(&c);
                s.spawn(move |_| {
                    c.fetch_add(1, Ordering::Relaxed);
                });
            }
        });
        match result {
            Err(TaskPanic(message)) => assert_eq!(message, "lane exploded"),
            other => panic!("expected TaskPanic, got {other:?}"),
        }
        assert_eq!(counter.load(Ordering::Relaxed), 10);
        assert!(group.run_and_wait(|_| {}).is_ok());
    }
}
