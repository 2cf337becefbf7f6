//! Cooperative cancellation.
//!
//! A [`CancelSource`] is held by whoever may decide to stop a group of tasks. Every task gets a
//! [`CancelToken`] from it. Cancellation is a one-way transition: once [`CancelSource::cancel`] has
//! been called, every token observes it, forever.
//!
//! The signal is a channel that never carries a message. Cancelling drops its only [`Sender`],
//! which disconnects the channel and wakes everything blocked on it, so a token can be waited on
//! together with other channels using [`select!`].
//!
//! [`select!`]: crossbeam_channel::select

use std::{sync::Arc, time::Duration};

use crossbeam_channel::{select, Receiver, Sender, TryRecvError};

use crate::{error::Cancelled, sync::Mutex};

/// The cancelling side of a cancellation signal.
///
/// Cloning a [`CancelSource`] yields another handle to the *same* signal.
#[derive(Clone)]
pub struct CancelSource {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    /// Creates a [`CancelToken`] observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            signal: self.receiver.clone(),
        }
    }

    /// Cancels all tokens created from this source.
    ///
    /// Returns `true` if this call performed the cancellation, and `false` if the source was
    /// already cancelled.
    pub fn cancel(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// The observing side of a cancellation signal, handed to each cancellable task.
#[derive(Clone)]
pub struct CancelToken {
    signal: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Blocks the calling thread for `duration`, or until the token is cancelled.
    ///
    /// If the token is already cancelled when this is called, returns [`Cancelled`] immediately.
    /// If cancellation happens at the same moment the duration expires, either result may be
    /// returned.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }

        let timer = crossbeam_channel::after(duration);
        select! {
            recv(self.signal) -> _ => Err(Cancelled),
            recv(timer) -> _ => Ok(()),
        }
    }
}
