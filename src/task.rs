//! Run-to-completion threads and groups of them.
//!
//! A [`Task`] is an owned thread that runs a closure to completion and hands its result back to
//! the owner. A [`TaskGroup`] owns several tasks together with the [`CancelSource`] they observe,
//! so the whole group can be told to stop at once. Neither ever leaves a stray thread behind: both
//! join their threads when dropped.

use std::{
    io,
    panic::resume_unwind,
    thread::{self, JoinHandle},
};

use crate::cancel::{CancelSource, CancelToken};

/// Spawns a named run-to-completion [`Task`].
///
/// `name` becomes the thread's name, so it must not contain NUL bytes. If it does, an error of
/// kind [`io::ErrorKind::InvalidInput`] is returned.
pub fn spawn<R, F>(name: impl Into<String>, f: F) -> io::Result<Task<R>>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let name = name.into();
    if name.contains('\0') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("task name {name:?} contains a NUL byte"),
        ));
    }
    let thread_name = name.clone();
    let handle = thread::Builder::new().name(name.clone()).spawn(move || {
        log::trace!("task '{thread_name}' starting");
        let _guard = ExitTrace(thread_name);
        f()
    })?;
    Ok(Task {
        name,
        handle: Some(handle),
    })
}

/// Logs the exit of a task thread, including when it unwinds.
struct ExitTrace(String);

impl Drop for ExitTrace {
    fn drop(&mut self) {
        log::trace!("task '{}' exiting", self.0);
    }
}

/// An owned thread running a closure to completion.
///
/// Created with the freestanding [`spawn`] function, or by a [`TaskGroup`].
///
/// Calling [`Task::join`] or dropping a [`Task`] joins the thread. If the thread panicked, the
/// panic will be propagated to the owner.
pub struct Task<R> {
    name: String,
    handle: Option<JoinHandle<R>>,
}

impl<R> Drop for Task<R> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                if !thread::panicking() {
                    resume_unwind(payload);
                }
            }
        }
    }
}

impl<R> Task<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the task's closure has returned (or panicked).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Blocks until the task has finished and returns its result.
    ///
    /// If the thread panics, the panic will be propagated to the owner.
    pub fn join(mut self) -> R {
        let handle = self.handle.take().expect("task was already joined");
        match handle.join() {
            Ok(r) => r,
            Err(payload) => resume_unwind(payload),
        }
    }
}

/// A group of [`Task`]s sharing one cancellation signal.
///
/// Every child is handed a [`CancelToken`] when it is spawned. [`TaskGroup::cancel`] (or
/// cancelling the source passed to [`TaskGroup::with_cancel`]) signals all of them; it is up to
/// each child to observe the token and wind down.
///
/// Dropping a [`TaskGroup`] that still has children cancels it and joins them.
/// [`TaskGroup::join_all`] joins every child without cancelling. In both cases, if a child panicked, its panic is propagated to the
/// owner, but only after *all* children have been joined.
pub struct TaskGroup<R> {
    cancel: CancelSource,
    tasks: Vec<Task<R>>,
}

impl<R> Drop for TaskGroup<R> {
    fn drop(&mut self) {
        // A group emptied by `join_all` leaves its source untouched.
        if !self.tasks.is_empty() {
            self.cancel.cancel();
            self.join_handles();
        }
    }
}

impl<R: Send + 'static> TaskGroup<R> {
    /// Creates an empty group with its own cancellation signal.
    pub fn new() -> Self {
        Self::with_cancel(CancelSource::new())
    }

    /// Creates an empty group whose children observe `cancel`.
    ///
    /// This allows someone other than the group's owner to cancel the group, by holding a clone
    /// of `cancel`.
    pub fn with_cancel(cancel: CancelSource) -> Self {
        Self {
            cancel,
            tasks: Vec::new(),
        }
    }

    /// Spawns a child task, passing it a [`CancelToken`] for this group.
    pub fn spawn<F>(&mut self, name: impl Into<String>, f: F) -> io::Result<()>
    where
        F: FnOnce(CancelToken) -> R + Send + 'static,
    {
        let token = self.cancel.token();
        let task = spawn(name, move || f(token))?;
        self.tasks.push(task);
        Ok(())
    }

    /// Signals cancellation to every child.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a handle to the group's cancellation signal.
    pub fn cancel_source(&self) -> CancelSource {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every child to finish and returns their results, in spawn order.
    pub fn join_all(mut self) -> Vec<(String, R)> {
        self.join_handles()
    }
}

impl<R> TaskGroup<R> {
    fn join_handles(&mut self) -> Vec<(String, R)> {
        let mut results = Vec::with_capacity(self.tasks.len());
        let mut payload = None;
        for mut task in self.tasks.drain(..) {
            let name = std::mem::take(&mut task.name);
            if let Some(handle) = task.handle.take() {
                match handle.join() {
                    Ok(r) => results.push((name, r)),
                    Err(pl) => payload = payload.or(Some(pl)),
                }
            }
        }
        if let Some(payload) = payload {
            if !thread::panicking() {
                resume_unwind(payload);
            }
        }
        results
    }
}

impl<R: Send + 'static> Default for TaskGroup<R> {
    fn default() -> Self {
        Self::new()
    }
}
