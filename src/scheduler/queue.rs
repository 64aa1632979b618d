//! Work queue - Pending fiber updates and the deferred drive request.
//!
//! The queue is shared between the [`Scheduler`](super::Scheduler) and
//! every [`Updater`] handed out to components. Updates for the same fiber
//! coalesce until the next drive, and the `on_schedule` callback fires only
//! when the queue goes from idle to "drive requested".
//!
//! Every queued item draws a ticket from one counter. The scheduler keeps
//! root requests in its own list and uses the tickets to interleave them
//! with fiber updates in arrival order.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::fiber::FiberId;

/// Callback telling the embedder that a drive cycle should run soon.
pub type ScheduleFn = Rc<dyn Fn()>;

/// Arrival order of a queued item.
pub type Ticket = u64;

struct QueueState {
    /// Pending fibers with the ticket of their first scheduling.
    updates: IndexMap<FiberId, Ticket>,
    next_ticket: Ticket,
    drive_requested: bool,
    on_schedule: Option<ScheduleFn>,
}

// =============================================================================
// Work Queue
// =============================================================================

/// Scheduler side of the shared queue.
pub struct WorkQueue {
    state: Rc<RefCell<QueueState>>,
}

impl WorkQueue {
    pub fn new(on_schedule: Option<ScheduleFn>) -> Self {
        Self {
            state: Rc::new(RefCell::new(QueueState {
                updates: IndexMap::new(),
                next_ticket: 0,
                drive_requested: false,
                on_schedule,
            })),
        }
    }

    /// Handle for enqueueing work from outside the scheduler.
    pub fn updater(&self) -> Updater {
        Updater {
            state: self.state.clone(),
        }
    }

    /// Mark a drive as needed, notifying the embedder on the first request.
    pub fn request_drive(&self) {
        request_drive(&self.state);
    }

    /// Queue `fiber` for re-processing. Returns `false` if it was already queued.
    pub fn push_update(&self, fiber: FiberId) -> bool {
        push_update(&self.state, fiber)
    }

    /// Draw the next ticket, for work queued outside the update set.
    pub fn next_ticket(&self) -> Ticket {
        next_ticket(&mut self.state.borrow_mut())
    }

    /// Ticket of the oldest pending update.
    pub fn peek_update(&self) -> Option<Ticket> {
        self.state.borrow().updates.first().map(|(_, &ticket)| ticket)
    }

    /// Oldest pending update.
    pub fn pop_update(&self) -> Option<FiberId> {
        self.state
            .borrow_mut()
            .updates
            .shift_remove_index(0)
            .map(|(fiber, _)| fiber)
    }

    /// Number of distinct fibers waiting for re-processing.
    pub fn len(&self) -> usize {
        self.state.borrow().updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().updates.is_empty()
    }

    pub fn is_drive_requested(&self) -> bool {
        self.state.borrow().drive_requested
    }

    /// Consume the drive request. Requests made after this call notify again.
    pub fn take_drive_request(&self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().drive_requested)
    }
}

impl fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("WorkQueue")
            .field("updates", &state.updates)
            .field("drive_requested", &state.drive_requested)
            .finish()
    }
}

// =============================================================================
// Updater
// =============================================================================

/// Cloneable handle that schedules fibers for re-render.
#[derive(Clone)]
pub struct Updater {
    state: Rc<RefCell<QueueState>>,
}

impl Updater {
    /// Queue `fiber` for re-processing on the next drive.
    pub fn schedule_work(&self, fiber: FiberId) {
        if push_update(&self.state, fiber) {
            tracing::trace!(?fiber, "update scheduled");
        }
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater").finish_non_exhaustive()
    }
}

fn next_ticket(state: &mut QueueState) -> Ticket {
    let ticket = state.next_ticket;
    state.next_ticket += 1;
    ticket
}

fn push_update(state: &RefCell<QueueState>, fiber: FiberId) -> bool {
    let inserted = {
        let mut state = state.borrow_mut();
        if state.updates.contains_key(&fiber) {
            false
        } else {
            let ticket = next_ticket(&mut state);
            state.updates.insert(fiber, ticket);
            true
        }
    };
    request_drive(state);
    inserted
}

fn request_drive(state: &RefCell<QueueState>) {
    let notify = {
        let mut state = state.borrow_mut();
        if state.drive_requested {
            None
        } else {
            state.drive_requested = true;
            state.on_schedule.clone()
        }
    };
    // Borrow released: the callback may schedule more work.
    if let Some(notify) = notify {
        notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::cell::Cell;

    fn ids(n: usize) -> Vec<FiberId> {
        let mut map: SlotMap<FiberId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn test_updates_coalesce_in_order() {
        let queue = WorkQueue::new(None);
        let fibers = ids(2);
        let (a, b) = (fibers[0], fibers[1]);

        assert!(queue.push_update(a));
        assert!(queue.push_update(b));
        assert!(!queue.push_update(a), "second push of the same fiber coalesces");
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.peek_update(), Some(0));
        assert_eq!(queue.pop_update(), Some(a));
        assert_eq!(queue.pop_update(), Some(b));
        assert_eq!(queue.pop_update(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_on_schedule_fires_once_per_drive() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let queue = WorkQueue::new(Some(Rc::new(move || counter.set(counter.get() + 1))));
        let updater = queue.updater();
        let fibers = ids(3);

        for &fiber in &fibers {
            updater.schedule_work(fiber);
        }
        queue.request_drive();
        assert_eq!(calls.get(), 1, "requests before the drive coalesce");

        assert!(queue.take_drive_request());
        assert!(!queue.is_drive_requested());

        updater.schedule_work(fibers[0]);
        assert_eq!(calls.get(), 2, "a new request after the drive notifies again");
    }

    #[test]
    fn test_tickets_follow_arrival_order() {
        let queue = WorkQueue::new(None);
        let fibers = ids(2);

        let before = queue.next_ticket();
        queue.push_update(fibers[0]);
        let after = queue.next_ticket();
        queue.push_update(fibers[1]);
        queue.push_update(fibers[0]);

        let first = queue.peek_update().unwrap();
        assert!(before < first && first < after, "update keeps its first ticket");
        queue.pop_update();
        assert!(queue.peek_update().unwrap() > after);
    }

    #[test]
    fn test_callback_may_schedule_reentrantly() {
        let queue = WorkQueue::new(None);
        let updater = queue.updater();
        let inner = updater.clone();
        let fibers = ids(2);
        let extra = fibers[1];

        queue.state.borrow_mut().on_schedule = Some(Rc::new(move || inner.schedule_work(extra)));

        updater.schedule_work(fibers[0]);
        assert_eq!(queue.len(), 2, "callback ran without a borrow conflict");
    }
}
