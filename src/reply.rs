//! One-shot reply slots for request/response messages sent to an [`Actor`].
//!
//! [`Actor`]: crate::actor::Actor

use std::{mem, sync::Arc};

use crate::sync::{Condvar, Mutex};

/// Creates a connected pair of [`Reply`] and [`Pending`].
///
/// The [`Reply`] travels inside the request message; the sender of the request keeps the
/// [`Pending`] half and blocks on it.
pub(crate) fn reply<T>() -> (Reply<T>, Pending<T>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Waiting),
        condvar: Condvar::new(),
    });
    (
        Reply {
            slot: slot.clone(),
            answered: false,
        },
        Pending { slot },
    )
}

enum SlotState<T> {
    Waiting,
    Answered(T),
    Abandoned,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    condvar: Condvar,
}

/// The answering half of a reply slot.
///
/// Dropping it without calling [`Reply::send`] (for example because the actor panicked while
/// handling the request) wakes the waiting [`Pending`] with [`Unanswered`].
pub(crate) struct Reply<T> {
    slot: Arc<Slot<T>>,
    answered: bool,
}

impl<T> Drop for Reply<T> {
    fn drop(&mut self) {
        if self.answered {
            return;
        }

        *self.slot.state.lock() = SlotState::Abandoned;
        self.slot.condvar.notify_all();
    }
}

impl<T> Reply<T> {
    /// Answers the request. Never blocks; if nobody is waiting anymore, `value` is dropped.
    pub(crate) fn send(mut self, value: T) {
        *self.slot.state.lock() = SlotState::Answered(value);
        self.slot.condvar.notify_all();
        self.answered = true;
    }
}

/// The waiting half of a reply slot.
pub(crate) struct Pending<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Pending<T> {
    /// Blocks until the connected [`Reply`] is answered or dropped.
    pub(crate) fn wait(self) -> Result<T, Unanswered> {
        let state = self.slot.state.lock();
        let mut state = self
            .slot
            .condvar
            .wait_while(state, |state| matches!(state, SlotState::Waiting));
        match mem::replace(&mut *state, SlotState::Abandoned) {
            SlotState::Answered(value) => Ok(value),
            SlotState::Abandoned => Err(Unanswered),
            SlotState::Waiting => unreachable!("woke up without an answer"),
        }
    }
}

/// The [`Reply`] was dropped without an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unanswered;

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn answered_reply() {
        let (reply, pending) = reply();
        reply.send(7);
        assert_eq!(pending.wait(), Ok(7));
    }

    #[test]
    fn abandoned_reply() {
        let (reply, pending) = reply::<()>();
        drop(reply);
        assert_eq!(pending.wait(), Err(Unanswered));
    }

    #[test]
    fn answer_from_another_thread() {
        let (reply, pending) = reply();
        let handle = thread::spawn(move || reply.send(String::from("pong")));
        assert_eq!(pending.wait().unwrap(), "pong");
        handle.join().unwrap();
    }

    #[test]
    fn slots_are_send() {
        assert_send::<Reply<()>>();
        assert_send::<Pending<()>>();
    }
}
