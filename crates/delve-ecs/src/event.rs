//! Synchronous event dispatch to subscribed systems.
//!
//! A [`System`] is a handler with a single capability,
//! [`process`](System::process). Systems are registered with an [`EventBus`]
//! and subscribed to one or more event kinds. Emitting an event calls every
//! system subscribed to its kind, in subscription order, on the caller's
//! stack. A system may emit further events from inside `process`; the nested
//! dispatch runs to completion before the outer loop moves on to its next
//! subscriber, giving depth-first cascades.
//!
//! The bus lives inside the context object that systems receive (the runtime
//! that also owns the world and grid). That context implements [`Dispatch`],
//! which is how a system running with `&mut C` can reach the bus to emit.
//!
//! Rules worth knowing:
//!
//! - The subscriber list is snapshotted when an emit begins. Systems
//!   unsubscribed (or removed) during that emit are skipped if not yet
//!   reached; systems subscribed during it are not called for that event.
//! - A cascade may route an event back to a system whose `process` is still
//!   on the stack; it is called again, re-entrantly. `process` takes `&self`
//!   for that reason, so systems with state keep it in a `Cell` or `RefCell`.
//! - The first error returned by a system stops the dispatch and propagates
//!   out of the outermost `emit`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::EcsError;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable record of something that happened.
///
/// Events are usually a closed `enum`; [`kind`](Event::kind) returns the
/// fieldless discriminant the bus routes on.
pub trait Event: fmt::Debug {
    /// Routing key.
    type Kind: Copy + Eq + Hash + fmt::Debug;

    /// The kind of this event.
    fn kind(&self) -> Self::Kind;
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Handle to a system registered with an [`EventBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub u32);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

/// An event handler.
///
/// `process` borrows the system immutably: the same system can be running
/// more than once on a deep cascade. Mutable state goes behind `Cell` or
/// `RefCell`, and a `RefCell` borrow must not be held across an emit.
pub trait System<C: Dispatch<E>, E: Event> {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one event. The context may be mutated freely, including
    /// emitting further events through [`Dispatch::emit`].
    fn process(&self, ctx: &mut C, event: &E) -> Result<(), C::Error>;
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Implemented by the context that owns an [`EventBus`].
pub trait Dispatch<E: Event>: Sized {
    /// Error type systems may return.
    type Error;

    /// The bus owned by this context.
    fn event_bus(&mut self) -> &mut EventBus<Self, E>;

    /// Dispatch `event` to its subscribers. See the module docs for ordering.
    fn emit(&mut self, event: &E) -> Result<(), Self::Error> {
        EventBus::dispatch(self, event)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A registered system. `None` once removed; ids are never reused.
type Slot<C, E> = Option<Rc<dyn System<C, E>>>;

/// Subscription table plus the registered systems.
pub struct EventBus<C: Dispatch<E>, E: Event> {
    slots: Vec<Slot<C, E>>,
    subscriptions: HashMap<E::Kind, Vec<SystemId>>,
    depth: usize,
}

impl<C: Dispatch<E>, E: Event> Default for EventBus<C, E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            subscriptions: HashMap::new(),
            depth: 0,
        }
    }
}

impl<C: Dispatch<E>, E: Event> fmt::Debug for EventBus<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("systems", &self.system_count())
            .field("subscriptions", &self.subscriptions)
            .field("depth", &self.depth)
            .finish()
    }
}

impl<C: Dispatch<E>, E: Event> EventBus<C, E> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system. It receives nothing until subscribed.
    pub fn add_system<S>(&mut self, system: S) -> SystemId
    where
        S: System<C, E> + 'static,
    {
        let id = SystemId(self.slots.len() as u32);
        debug!(system = %id, name = system.name(), "system registered");
        let system: Rc<dyn System<C, E>> = Rc::new(system);
        self.slots.push(Some(system));
        id
    }

    /// Unregister a system and drop all of its subscriptions. A system may
    /// remove itself from inside `process`; it is dropped once it returns.
    pub fn remove_system(&mut self, id: SystemId) -> Result<(), EcsError> {
        let slot = self.live_slot_mut(id)?;
        *slot = None;
        for subscribers in self.subscriptions.values_mut() {
            subscribers.retain(|&s| s != id);
        }
        self.subscriptions.retain(|_, subscribers| !subscribers.is_empty());
        debug!(system = %id, "system removed");
        Ok(())
    }

    /// Subscribe a system to event kinds. Subscribing twice to the same kind
    /// keeps the original position.
    pub fn subscribe(
        &mut self,
        id: SystemId,
        kinds: impl IntoIterator<Item = E::Kind>,
    ) -> Result<(), EcsError> {
        self.live_slot_mut(id)?;
        for kind in kinds {
            let subscribers = self.subscriptions.entry(kind).or_default();
            if !subscribers.contains(&id) {
                subscribers.push(id);
                trace!(system = %id, ?kind, "subscribed");
            }
        }
        Ok(())
    }

    /// Remove a system's subscriptions to the given kinds. Kinds it was not
    /// subscribed to are ignored.
    pub fn unsubscribe(
        &mut self,
        id: SystemId,
        kinds: impl IntoIterator<Item = E::Kind>,
    ) -> Result<(), EcsError> {
        self.live_slot_mut(id)?;
        for kind in kinds {
            if let Some(subscribers) = self.subscriptions.get_mut(&kind) {
                subscribers.retain(|&s| s != id);
                if subscribers.is_empty() {
                    self.subscriptions.remove(&kind);
                }
                trace!(system = %id, ?kind, "unsubscribed");
            }
        }
        Ok(())
    }

    /// Systems subscribed to `kind`, in call order.
    pub fn subscribers(&self, kind: E::Kind) -> &[SystemId] {
        self.subscriptions
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `id` is currently subscribed to `kind`.
    pub fn is_subscribed(&self, id: SystemId, kind: E::Kind) -> bool {
        self.subscribers(kind).contains(&id)
    }

    /// Number of registered (not removed) systems.
    pub fn system_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Log name of a registered system.
    pub fn system_name(&self, id: SystemId) -> Option<&str> {
        self.system(id).map(|system| system.name())
    }

    /// Nesting depth of the emit currently running; 0 when idle.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn system(&self, id: SystemId) -> Option<&Rc<dyn System<C, E>>> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    fn live_slot_mut(&mut self, id: SystemId) -> Result<&mut Slot<C, E>, EcsError> {
        match self.slots.get_mut(id.0 as usize) {
            Some(slot) if slot.is_some() => Ok(slot),
            _ => Err(EcsError::UnknownSystem(id)),
        }
    }

    /// Deliver `event` to every subscriber of its kind, depth-first.
    ///
    /// Usually reached through [`Dispatch::emit`].
    pub fn dispatch(ctx: &mut C, event: &E) -> Result<(), C::Error> {
        let kind = event.kind();
        let bus = ctx.event_bus();
        let targets = bus.subscribers(kind).to_vec();
        if targets.is_empty() {
            trace!(?kind, "no subscribers");
            return Ok(());
        }
        bus.depth += 1;
        debug!(?kind, depth = bus.depth, systems = targets.len(), "dispatch");

        let mut outcome = Ok(());
        for id in targets {
            let bus = ctx.event_bus();
            if !bus.is_subscribed(id, kind) {
                continue;
            }
            // The clone keeps the system alive if it is removed mid-call, and
            // leaves the slot in place so nested emits can reach it again.
            let Some(system) = bus.system(id).cloned() else {
                continue;
            };
            if let Err(err) = system.process(ctx, event) {
                debug!(system = %id, ?kind, "system failed; dispatch stopped");
                outcome = Err(err);
                break;
            }
        }

        ctx.event_bus().depth -= 1;
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
