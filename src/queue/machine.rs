//! Admission, dispatch and drain rules as explicit state transitions.
//!
//! The two lists never call back into the queue. Their observers only record
//! a [`Transition`] on a channel; [`QueueState::step`] applies a mutation and
//! then feeds the recorded transitions through [`advance`] until none are
//! left. Rules may mutate the lists again, which records more transitions,
//! so a whole admission → dispatch → drain cascade is processed by one loop
//! under one lock. Work that has to happen outside the lock comes back as
//! [`Effect`]s.

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

use super::entity::{Entity, EntityId};
use super::list::ObservedList;
use crate::config::QueueConfig;

/// A mutation recorded by a list observer.
#[derive(Debug)]
pub(crate) enum Transition<T> {
    /// An entity was appended to the queued list.
    Enqueued,
    /// An entity was appended to the in-flight list.
    Admitted(Entity<T>),
    /// An entity was removed from the in-flight list.
    Released(EntityId),
}

/// Follow-up work produced by the rules, executed after the lock is dropped.
#[derive(Debug)]
pub(crate) enum Effect<T> {
    /// Run the worker for this entity.
    Dispatch(Entity<T>),
    /// Run the close protocol for the given run.
    Close { epoch: u64 },
    /// Fire `on_end`.
    End,
}

/// Everything a queue guards with its mutex.
#[derive(Debug)]
pub(crate) struct QueueState<T> {
    pub(crate) queued: ObservedList<Entity<T>>,
    pub(crate) in_flight: ObservedList<Entity<T>>,
    pub(crate) running: bool,
    /// Bumped on every successful start; stale background tasks compare it.
    pub(crate) epoch: u64,
    transitions: UnboundedReceiver<Transition<T>>,
}

impl<T: Clone + Send + 'static> QueueState<T> {
    pub(crate) fn new() -> Self {
        let (tx, transitions) = mpsc::unbounded_channel();

        let mut queued = ObservedList::new();
        let enqueued = tx.clone();
        queued.set_on_append(Box::new(move |_: &Entity<T>| {
            let _ = enqueued.send(Transition::Enqueued);
        }));

        let admitted = tx.clone();
        let released = tx;
        let in_flight = ObservedList::with_observers(
            Box::new(move |entity: &Entity<T>| {
                let _ = admitted.send(Transition::Admitted(entity.clone()));
            }),
            Box::new(move |entity: &Entity<T>| {
                let _ = released.send(Transition::Released(entity.id().clone()));
            }),
        );

        Self {
            queued,
            in_flight,
            running: false,
            epoch: 0,
            transitions,
        }
    }
}

impl<T> QueueState<T> {
    /// Apply `mutation`, then run every rule it triggers to quiescence.
    pub(crate) fn step<R>(
        &mut self,
        config: &QueueConfig,
        mutation: impl FnOnce(&mut Self) -> R,
    ) -> (R, Vec<Effect<T>>) {
        let out = mutation(self);
        let mut effects = Vec::new();
        while let Ok(transition) = self.transitions.try_recv() {
            advance(self, config, transition, &mut effects);
        }
        (out, effects)
    }

    /// Remove the in-flight entity with `id`, if it is still there.
    pub(crate) fn release(&mut self, id: &EntityId) -> Option<Entity<T>> {
        let index = self.in_flight.position(|entity| entity.id() == id)?;
        self.in_flight.remove_at(index).ok()
    }

    /// Move the oldest queued entity into the in-flight list.
    fn admit_next(&mut self) {
        if self.queued.is_empty() {
            return;
        }
        let Self {
            queued, in_flight, ..
        } = self;
        if let Err(e) = queued.move_to(0, in_flight) {
            warn!(error = %e, "admission failed");
        }
    }
}

/// Apply the rule matching `transition`.
pub(crate) fn advance<T>(
    state: &mut QueueState<T>,
    config: &QueueConfig,
    transition: Transition<T>,
    effects: &mut Vec<Effect<T>>,
) {
    let limit = config.concurrency_limit.get();
    match transition {
        Transition::Enqueued => {
            if state.in_flight.len() < limit {
                state.admit_next();
            }
        }
        Transition::Admitted(entity) => {
            if state.running {
                debug!(id = %entity.id(), "dispatching");
                effects.push(Effect::Dispatch(entity));
            } else {
                debug!(id = %entity.id(), "admitted while idle, waiting for start");
            }
        }
        Transition::Released(id) => {
            debug!(%id, in_flight = state.in_flight.len(), "released");
            if state.in_flight.len() < limit && !state.queued.is_empty() {
                state.admit_next();
            }
            if state.in_flight.is_empty() {
                if !config.keep_alive && state.running {
                    effects.push(Effect::Close { epoch: state.epoch });
                }
                effects.push(Effect::End);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn config(limit: usize, keep_alive: bool) -> QueueConfig {
        QueueConfig {
            concurrency_limit: NonZeroUsize::new(limit).unwrap(),
            keep_alive,
            ..QueueConfig::default()
        }
    }

    fn submit(
        state: &mut QueueState<&'static str>,
        config: &QueueConfig,
        items: &[&'static str],
    ) -> Vec<Effect<&'static str>> {
        let ((), effects) = state.step(config, |state| {
            for item in items {
                state.queued.append(Entity::new(*item));
            }
        });
        effects
    }

    fn in_flight_data(state: &QueueState<&'static str>) -> Vec<&'static str> {
        state.in_flight.snapshot().into_iter().map(Entity::into_data).collect()
    }

    fn dispatched(effects: &[Effect<&'static str>]) -> Vec<&'static str> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Dispatch(entity) => Some(*entity.data()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn admission_fills_capacity_while_idle_without_dispatching() {
        let config = config(2, false);
        let mut state = QueueState::new();

        let effects = submit(&mut state, &config, &["a", "b", "c"]);

        assert!(effects.is_empty());
        assert_eq!(in_flight_data(&state), vec!["a", "b"]);
        assert_eq!(state.queued.len(), 1);
    }

    #[test]
    fn admission_dispatches_while_running() {
        let config = config(2, false);
        let mut state = QueueState::new();
        state.running = true;

        let effects = submit(&mut state, &config, &["a", "b", "c"]);

        assert_eq!(dispatched(&effects), vec!["a", "b"]);
        assert_eq!(state.queued.snapshot()[0].data(), &"c");
    }

    #[test]
    fn release_admits_oldest_queued_entity() {
        let config = config(2, false);
        let mut state = QueueState::new();
        state.running = true;
        submit(&mut state, &config, &["a", "b", "c", "d"]);

        let b = state.in_flight.snapshot()[1].id().clone();
        let (released, effects) = state.step(&config, |state| state.release(&b));

        assert_eq!(released.map(Entity::into_data), Some("b"));
        assert_eq!(dispatched(&effects), vec!["c"]);
        assert_eq!(in_flight_data(&state), vec!["a", "c"]);
    }

    #[test]
    fn drain_to_empty_closes_and_ends() {
        let config = config(1, false);
        let mut state = QueueState::new();
        state.running = true;
        state.epoch = 7;
        submit(&mut state, &config, &["a"]);

        let a = state.in_flight.snapshot()[0].id().clone();
        let (_, effects) = state.step(&config, |state| state.release(&a));

        assert!(matches!(effects.as_slice(), [Effect::Close { epoch: 7 }, Effect::End]));
    }

    #[test]
    fn drain_to_empty_with_keep_alive_only_ends() {
        let config = config(1, true);
        let mut state = QueueState::new();
        state.running = true;
        submit(&mut state, &config, &["a"]);

        let a = state.in_flight.snapshot()[0].id().clone();
        let (_, effects) = state.step(&config, |state| state.release(&a));

        assert!(matches!(effects.as_slice(), [Effect::End]));
    }

    #[test]
    fn releasing_unknown_id_is_a_no_op() {
        let config = config(1, false);
        let mut state: QueueState<&'static str> = QueueState::new();

        let (released, effects) = state.step(&config, |state| state.release(&EntityId::new()));

        assert!(released.is_none());
        assert!(effects.is_empty());
    }
}
