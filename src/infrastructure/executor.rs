//! Execution contexts.
//!
//! `SerialWorker` is the background context: one OS thread driving a
//! current-thread tokio runtime, so every task it runs is serialized with
//! every other. `UiThread` and `UiQueue` are UI-affine contexts: the first
//! owns a dedicated thread, the second runs jobs when the host pumps it from
//! its own UI loop.

use crate::domain::ports::{BackgroundContext, Job, Task, UiContext};
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError, mpsc as std_mpsc};
use std::thread;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub const BACKGROUND_THREAD_NAME: &str = "billing-background";
pub const UI_THREAD_NAME: &str = "billing-ui";

pub struct SerialWorker {
    sender: mpsc::UnboundedSender<Task>,
}

impl SerialWorker {
    pub fn start() -> Result<Self> {
        Self::named(BACKGROUND_THREAD_NAME)
    }

    /// Spawns the worker thread. Once every handle is dropped the worker
    /// stops accepting tasks, runs the ones it holds to completion and exits.
    pub fn named(name: &str) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread_name = name.to_string();
        thread::Builder::new().name(thread_name.clone()).spawn(move || {
            runtime.block_on(async move {
                let mut tasks = JoinSet::new();
                loop {
                    tokio::select! {
                        received = receiver.recv() => match received {
                            Some(task) => {
                                tasks.spawn(task);
                            }
                            None => break,
                        },
                        Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                    }
                }
                // Parked tasks still owe their callbacks.
                while tasks.join_next().await.is_some() {}
            });
            debug!(thread = %thread_name, "serial worker stopped");
        })?;

        Ok(Self { sender })
    }
}

impl BackgroundContext for SerialWorker {
    fn spawn(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("serial worker is gone, task dropped");
        }
    }
}

pub struct UiThread {
    sender: std_mpsc::Sender<Job>,
}

impl UiThread {
    pub fn start() -> Result<Self> {
        Self::named(UI_THREAD_NAME)
    }

    pub fn named(name: &str) -> Result<Self> {
        let (sender, receiver) = std_mpsc::channel::<Job>();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            for job in receiver {
                job();
            }
        })?;

        Ok(Self { sender })
    }
}

impl UiContext for UiThread {
    fn post(&self, job: Job) {
        if self.sender.send(job).is_err() {
            warn!("ui thread is gone, job dropped");
        }
    }
}

/// UI context for hosts that own their main loop: jobs wait until the host
/// calls [`UiQueue::pump`] from its UI thread.
#[derive(Default)]
pub struct UiQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl UiQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every job queued so far, in posting order. Returns how many ran.
    pub fn pump(&self) -> usize {
        let jobs: Vec<Job> = {
            let mut queue = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            queue.drain(..).collect()
        };
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl UiContext for UiQueue {
    fn post(&self, job: Job) {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(job);
    }
}
