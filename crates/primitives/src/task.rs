use std::{
    collections::HashMap,
    pin::Pin,
    task::{Context, Poll},
};

use futures::FutureExt;
use tokio::task::{JoinError, JoinHandle};

/// A wrapper over a [`HashMap`] of long-running tasks, each represented by a
/// [`tokio::task::JoinHandle`] resolving to a `Result<(), E>`.
///
/// It is possible to await these tasks. Since they are long-running, awaiting yields a
/// value only when one of them has completed, either because it was cancelled, returned
/// an error, or panicked. The finished task is removed from the set, so that the set can
/// be awaited again until it is empty.
#[derive(Debug)]
pub struct CriticalTasks<E> {
    tasks: HashMap<String, JoinHandle<Result<(), E>>>,
}

impl<E> Default for CriticalTasks<E> {
    fn default() -> Self {
        Self { tasks: HashMap::new() }
    }
}

impl<E: Send + 'static> CriticalTasks<E> {
    /// Creates a new instance of `Self`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the task and adds it to the list of long-running tasks
    pub fn add_task<F>(&mut self, task: F, name: &str)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.tasks.insert(name.to_owned(), handle);
    }

    /// Adds a task handle to the list of long-running tasks.
    pub fn add_handle(&mut self, handle: JoinHandle<Result<(), E>>, name: &str) {
        self.tasks.insert(name.to_owned(), handle);
    }

    /// Returns the number of tasks still running.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no task is left.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// The result of awaiting a task in the [`CriticalTasks`] struct.
#[derive(Debug)]
pub struct TaskResult<E> {
    /// The name of the task.
    name: String,
    /// The task output, or the join error if it panicked or was aborted.
    outcome: Result<Result<(), E>, JoinError>,
}

impl<E> TaskResult<E> {
    /// Creates a new instance of `TaskResult`.
    pub const fn new(name: String, outcome: Result<Result<(), E>, JoinError>) -> Self {
        Self { name, outcome }
    }

    /// Returns the name of the task.
    #[allow(clippy::missing_const_for_fn)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the task returned successfully.
    pub const fn is_ok(&self) -> bool {
        matches!(self.outcome, Ok(Ok(())))
    }

    /// Returns the error returned by the task, or the panic message if it panicked.
    pub fn into_outcome(self) -> Result<(), TaskFailure<E>> {
        match self.outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TaskFailure::Error(err)),
            Err(err) => Err(TaskFailure::Panicked(panic_message(err))),
        }
    }
}

/// The reason why a critical task stopped.
#[derive(Debug)]
pub enum TaskFailure<E> {
    /// The task returned an error.
    Error(E),
    /// The task panicked or was aborted, with the given message.
    Panicked(String),
}

/// Returns the panic message carried by a [`JoinError`], or an empty string if there was
/// no panic.
pub fn panic_message(err: JoinError) -> String {
    if err.is_panic() {
        let panic_value = err.into_panic();

        if let Some(s) = panic_value.downcast_ref::<&str>() {
            return (*s).to_owned()
        } else if let Some(s) = panic_value.downcast_ref::<String>() {
            return s.clone()
        }
        return "Task panicked with unknown type".to_owned()
    }

    String::new()
}

impl<E> Future for CriticalTasks<E> {
    type Output = Option<TaskResult<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.tasks.is_empty() {
            return Poll::Ready(None);
        }

        let mut finished = None;
        for (name, task) in &mut this.tasks {
            if let Poll::Ready(res) = task.poll_unpin(cx) {
                finished = Some((name.clone(), res));
                break;
            }
        }

        match finished {
            Some((name, res)) => {
                this.tasks.remove(&name);
                Poll::Ready(Some(TaskResult::new(name, res)))
            }
            None => Poll::Pending,
        }
    }
}
