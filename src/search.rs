//! Header search delivery.
//!
//! The header search box does not know about the collection view; the view
//! registers a one-argument handler here instead. Registration and
//! deregistration are queued and applied by a driver task on a later
//! scheduler tick, never synchronously inside the caller's own update.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

pub type SearchHandler = Arc<dyn Fn(&str) + Send + Sync>;

enum Command {
    Register(u64, SearchHandler),
    Deregister(u64),
}

struct Slot {
    handler: RwLock<Option<(u64, SearchHandler)>>,
    next_generation: AtomicU64,
    commands: mpsc::UnboundedSender<Command>,
}

#[derive(Clone)]
pub struct SearchRegistry {
    slot: Arc<Slot>,
}

impl SearchRegistry {
    /// Must be called from within a Tokio runtime; spawns the driver task.
    pub fn new() -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let slot = Arc::new(Slot {
            handler: RwLock::new(None),
            next_generation: AtomicU64::new(1),
            commands,
        });
        tokio::spawn(drive(Arc::downgrade(&slot), rx));
        Self { slot }
    }

    /// Queues `handler` to become the active search handler. Dropping the
    /// returned guard queues its removal.
    pub fn register(&self, handler: impl Fn(&str) + Send + Sync + 'static) -> SearchRegistration {
        let generation = self.slot.next_generation.fetch_add(1, Ordering::Relaxed);
        let _ = self.slot.commands.send(Command::Register(generation, Arc::new(handler)));
        SearchRegistration { generation, commands: self.slot.commands.clone() }
    }

    pub fn is_registered(&self) -> bool {
        self.slot.handler.read().is_some()
    }

    /// Forwards `term` to the active handler. Returns `false` when none is
    /// registered, in which case the term is dropped.
    pub fn dispatch(&self, term: &str) -> bool {
        let handler = self.slot.handler.read().as_ref().map(|(_, h)| h.clone());
        match handler {
            Some(handler) => {
                handler(term);
                true
            },
            None => {
                debug!("search dispatched with no handler registered");
                false
            },
        }
    }
}

async fn drive(slot: Weak<Slot>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        let Some(slot) = slot.upgrade() else { break };
        let mut current = slot.handler.write();
        match command {
            Command::Register(generation, handler) => {
                debug!(generation, "search handler registered");
                *current = Some((generation, handler));
            },
            // A stale guard must not remove a newer handler.
            Command::Deregister(generation) => {
                if current.as_ref().is_some_and(|(g, _)| *g == generation) {
                    debug!(generation, "search handler deregistered");
                    *current = None;
                }
            },
        }
    }
}

/// Keeps a search handler registered for as long as it lives.
pub struct SearchRegistration {
    generation: u64,
    commands: mpsc::UnboundedSender<Command>,
}

impl Drop for SearchRegistration {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Deregister(self.generation));
    }
}
