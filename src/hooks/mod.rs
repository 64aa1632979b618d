//! Hooks - Per-component state slots and post-commit effects.
//!
//! Every component render receives a [`Hooks`] context whose cursors start
//! at zero. Calls to [`Hooks::use_state`] and [`Hooks::use_effect`] claim
//! slots in call order, so a component must call its hooks in the same
//! order on every render.
//!
//! ```ignore
//! let counter = Component::new("Counter", |props, hooks| {
//!     let (count, set_count) = hooks.use_state(|| 0i64);
//!     hooks.use_effect(move || {
//!         println!("committed count {}", count);
//!         Ok(())
//!     });
//!     vec![h("button", Props::new().child(text(count)))]
//! });
//! ```
//!
//! Setting state never re-renders synchronously. The owning fiber is queued
//! on the scheduler and re-rendered on the next drive cycle.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::fiber::FiberId;
use crate::scheduler::Updater;

/// Effect callback run after the commit of the render that registered it.
pub type EffectFn = Rc<dyn Fn() -> anyhow::Result<()>>;

type Slot = Rc<RefCell<Box<dyn Any>>>;

// =============================================================================
// Hook State
// =============================================================================

/// Persisted state of one component instance.
///
/// Lives in the `base` of a HOOK fiber for as long as the fiber exists.
#[derive(Clone, Default)]
pub struct HookState {
    slots: Vec<Slot>,
    effects: IndexMap<usize, EffectFn>,
}

impl HookState {
    /// Effects registered by the latest render, in registration order.
    pub fn effects(&self) -> impl Iterator<Item = &EffectFn> {
        self.effects.values()
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Number of state slots claimed so far.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl fmt::Debug for HookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookState")
            .field("slots", &self.slots.len())
            .field("effects", &self.effects.len())
            .finish()
    }
}

// =============================================================================
// Hooks Context
// =============================================================================

/// Hook cursor for one component render.
pub struct Hooks<'a> {
    state: &'a mut HookState,
    fiber: FiberId,
    updater: &'a Updater,
    state_cursor: usize,
    effect_cursor: usize,
}

impl<'a> Hooks<'a> {
    /// Start a render: rewind both cursors and drop the previous render's effects.
    pub(crate) fn new(state: &'a mut HookState, fiber: FiberId, updater: &'a Updater) -> Self {
        state.effects.clear();
        Self {
            state,
            fiber,
            updater,
            state_cursor: 0,
            effect_cursor: 0,
        }
    }

    /// Fiber currently being rendered.
    pub fn fiber(&self) -> FiberId {
        self.fiber
    }

    /// Claim the next state slot.
    ///
    /// `init` runs only on the first render that reaches this slot.
    pub fn use_state<T: Clone + 'static>(&mut self, init: impl FnOnce() -> T) -> (T, StateSetter<T>) {
        let index = self.state_cursor;
        self.state_cursor += 1;

        if index == self.state.slots.len() {
            let value = init();
            let boxed: Box<dyn Any> = Box::new(value.clone());
            let slot: Slot = Rc::new(RefCell::new(boxed));
            self.state.slots.push(slot.clone());
            return (value, StateSetter::new(slot, self.fiber, self.updater));
        }

        let slot = self.state.slots[index].clone();
        let existing = slot.borrow().downcast_ref::<T>().cloned();
        let value = match existing {
            Some(value) => value,
            None => {
                // Hook order changed between renders.
                tracing::warn!(
                    fiber = ?self.fiber,
                    slot = index,
                    "state slot holds a different type, reinitializing"
                );
                let value = init();
                *slot.borrow_mut() = Box::new(value.clone());
                value
            }
        };
        (value, StateSetter::new(slot, self.fiber, self.updater))
    }

    /// Register an effect to run after this render is committed.
    pub fn use_effect(&mut self, effect: impl Fn() -> anyhow::Result<()> + 'static) {
        let index = self.effect_cursor;
        self.effect_cursor += 1;
        self.state.effects.insert(index, Rc::new(effect));
    }
}

// =============================================================================
// State Setter
// =============================================================================

/// Handle that writes a state slot and schedules its component.
pub struct StateSetter<T> {
    slot: Slot,
    fiber: FiberId,
    updater: Updater,
    _marker: PhantomData<T>,
}

impl<T: 'static> StateSetter<T> {
    fn new(slot: Slot, fiber: FiberId, updater: &Updater) -> Self {
        Self {
            slot,
            fiber,
            updater: updater.clone(),
            _marker: PhantomData,
        }
    }

    /// Store a new value and schedule a re-render.
    pub fn set(&self, value: T) {
        *self.slot.borrow_mut() = Box::new(value);
        self.updater.schedule_work(self.fiber);
    }

    /// Derive the next value from the current one and schedule a re-render.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let slot = self.slot.borrow();
            slot.downcast_ref::<T>().map(f)
        };
        match next {
            Some(next) => self.set(next),
            None => tracing::warn!(fiber = ?self.fiber, "state slot type changed, update ignored"),
        }
    }

    /// Current value of the slot.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.slot.borrow().downcast_ref::<T>().cloned()
    }

    /// Fiber this setter schedules.
    pub fn fiber(&self) -> FiberId {
        self.fiber
    }
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            fiber: self.fiber,
            updater: self.updater.clone(),
            _marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::WorkQueue;
    use slotmap::SlotMap;

    fn fiber_id() -> FiberId {
        let mut ids: SlotMap<FiberId, ()> = SlotMap::with_key();
        ids.insert(())
    }

    #[test]
    fn test_use_state_initializes_once() {
        let queue = WorkQueue::new(None);
        let updater = queue.updater();
        let mut state = HookState::default();
        let fiber = fiber_id();

        let mut calls = 0;
        {
            let mut hooks = Hooks::new(&mut state, fiber, &updater);
            let (value, _) = hooks.use_state(|| {
                calls += 1;
                10i32
            });
            assert_eq!(value, 10);
        }
        {
            let mut hooks = Hooks::new(&mut state, fiber, &updater);
            let (value, _) = hooks.use_state(|| {
                calls += 1;
                99i32
            });
            assert_eq!(value, 10, "second render must see the stored value");
        }
        assert_eq!(calls, 1, "init runs only on the first render");
        assert_eq!(state.slot_count(), 1);
    }

    #[test]
    fn test_setter_stores_and_schedules() {
        let queue = WorkQueue::new(None);
        let updater = queue.updater();
        let mut state = HookState::default();
        let fiber = fiber_id();

        let setter = {
            let mut hooks = Hooks::new(&mut state, fiber, &updater);
            let (_, setter) = hooks.use_state(|| 1u32);
            setter
        };

        setter.update(|v| v + 41);
        assert_eq!(setter.get(), Some(42));
        assert!(queue.is_drive_requested(), "setting state must request a drive");
        assert_eq!(queue.len(), 1);

        // Same fiber again before the drive coalesces
        setter.set(7);
        assert_eq!(queue.len(), 1);

        let mut hooks = Hooks::new(&mut state, fiber, &updater);
        let (value, _) = hooks.use_state(|| 0u32);
        assert_eq!(value, 7);
    }

    #[test]
    fn test_effects_reset_each_render() {
        let queue = WorkQueue::new(None);
        let updater = queue.updater();
        let mut state = HookState::default();
        let fiber = fiber_id();

        {
            let mut hooks = Hooks::new(&mut state, fiber, &updater);
            hooks.use_effect(|| Ok(()));
            hooks.use_effect(|| Ok(()));
        }
        assert_eq!(state.effect_count(), 2);

        {
            let mut hooks = Hooks::new(&mut state, fiber, &updater);
            hooks.use_effect(|| Ok(()));
        }
        assert_eq!(state.effect_count(), 1, "effects belong to the latest render only");
    }

    #[test]
    fn test_state_type_change_reinitializes() {
        let queue = WorkQueue::new(None);
        let updater = queue.updater();
        let mut state = HookState::default();
        let fiber = fiber_id();

        {
            let mut hooks = Hooks::new(&mut state, fiber, &updater);
            hooks.use_state(|| 5i32);
        }
        let mut hooks = Hooks::new(&mut state, fiber, &updater);
        let (value, _) = hooks.use_state(|| String::from("fresh"));
        assert_eq!(value, "fresh");
    }
}
