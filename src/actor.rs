//! Owned single-threaded message processors.
//!
//! An [`Actor`] is a thread that exclusively owns some state and mutates it in response to
//! messages, one message at a time. Other threads talk to it through cloneable [`Mailbox`]es.
//! Because only the actor thread ever touches the state, every operation on it is serialized in
//! the order the messages are received, without any locking in the handler.

use std::{
    io,
    panic::resume_unwind,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{select, Sender};

/// A builder object that can be used to configure and spawn an [`Actor`].
#[derive(Clone)]
pub struct ActorBuilder {
    name: Option<String>,
}

impl ActorBuilder {
    /// Sets the name of the [`Actor`] thread.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Spawns an [`Actor`] thread that uses `handler` to process incoming messages.
    pub fn spawn<M, F>(self, mut handler: F) -> io::Result<Actor<M>>
    where
        M: Send + 'static,
        F: FnMut(M) + Send + 'static,
    {
        let (sender, inbox) = crossbeam_channel::bounded(0);
        let (stop, stopped) = crossbeam_channel::bounded::<()>(0);
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name.clone() {
            builder = builder.name(name);
        }
        let name = self.name.unwrap_or_else(|| String::from("<unnamed>"));
        let handle = builder.spawn(move || {
            log::trace!("actor '{name}' starting");
            loop {
                select! {
                    recv(inbox) -> message => match message {
                        Ok(message) => handler(message),
                        Err(_) => break,
                    },
                    recv(stopped) -> _ => break,
                }
            }
            log::trace!("actor '{name}' exiting");
        })?;

        Ok(Actor {
            mailbox: Mailbox { sender },
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

/// An owned actor thread that processes messages of type `M`.
///
/// This type enforces structured concurrency: When it's dropped, the thread will be signaled to
/// exit (even if [`Mailbox`]es are still around) and the thread will be joined. If the thread has
/// panicked, the panic will be forwarded to the thread dropping the [`Actor`].
pub struct Actor<M: Send + 'static> {
    mailbox: Mailbox<M>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> Drop for Actor<M> {
    fn drop(&mut self) {
        // Disconnect the stop channel to make the thread exit.
        drop(self.stop.take());

        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                if !thread::panicking() {
                    resume_unwind(payload);
                }
            }
        }
    }
}

impl Actor<()> {
    /// Returns a builder that can be used to configure and spawn an [`Actor`].
    #[inline]
    pub fn builder() -> ActorBuilder {
        ActorBuilder { name: None }
    }
}

impl<M: Send + 'static> Actor<M> {
    /// Returns a [`Mailbox`] that can be used to send messages to this actor.
    pub fn mailbox(&self) -> Mailbox<M> {
        self.mailbox.clone()
    }
}

/// A cloneable handle for sending messages to an [`Actor`].
pub struct Mailbox<M> {
    sender: Sender<M>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M> Mailbox<M> {
    /// Sends a message to the actor.
    ///
    /// The mailbox has no buffer: this blocks until the actor thread has taken the message.
    ///
    /// If the actor thread has exited (because it panicked, or because its [`Actor`] was dropped),
    /// the message is handed back as an error.
    pub fn send(&self, msg: M) -> Result<(), M> {
        self.sender.send(msg).map_err(|err| err.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use crate::reply::{reply, Reply};

    use super::*;

    fn assert_send<T: Send>() {}

    fn silent_panic(payload: String) {
        resume_unwind(Box::new(payload));
    }

    #[test]
    fn actor_serializes_messages() {
        let mut total = 0;
        let actor = Actor::builder()
            .name("summer")
            .spawn(move |(n, reply): (u32, Reply<u32>)| {
                total += n;
                reply.send(total);
            })
            .unwrap();

        let senders: Vec<_> = (0..8)
            .map(|_| {
                let mailbox = actor.mailbox();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let (reply, pending) = reply();
                        mailbox.send((1, reply)).ok().unwrap();
                        pending.wait().unwrap();
                    }
                })
            })
            .collect();
        for sender in senders {
            sender.join().unwrap();
        }

        let (reply, pending) = reply();
        actor.mailbox().send((0, reply)).ok().unwrap();
        assert_eq!(pending.wait().unwrap(), 800);
    }

    #[test]
    fn actor_propagates_panic_on_drop() {
        let actor = Actor::builder()
            .spawn(|_: ()| silent_panic("actor panic".into()))
            .unwrap();
        actor.mailbox().send(()).unwrap();
        catch_unwind(AssertUnwindSafe(|| drop(actor))).unwrap_err();
    }

    #[test]
    fn send_after_panic_returns_message() {
        let actor = Actor::builder()
            .spawn(|_: u8| silent_panic("actor panic".into()))
            .unwrap();
        let mailbox = actor.mailbox();
        mailbox.send(1).unwrap();
        // The thread is gone after the first message, but the second send may still be racing
        // with its exit, so only check that it eventually fails.
        while mailbox.send(2).is_ok() {
            thread::yield_now();
        }
        catch_unwind(AssertUnwindSafe(|| drop(actor))).unwrap_err();
    }

    #[test]
    fn drop_stops_actor_with_live_mailboxes() {
        let actor = Actor::builder().spawn(|_: ()| {}).unwrap();
        let mailbox = actor.mailbox();
        drop(actor);
        assert_eq!(mailbox.send(()), Err(()));
    }

    #[test]
    fn actor_is_send() {
        assert_send::<Actor<()>>();
        assert_send::<Mailbox<()>>();
    }
}
