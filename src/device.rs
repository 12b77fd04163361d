//! Live pad state and change notification
//!
//! The driver calls back on its own thread, so its callback only queues an
//! event. [`ChangeNotifier::pump`] drains the queue on the owning thread,
//! re-reads both pads, diffs against the previous poll and dispatches to
//! subscribers. Nothing here is `Send`; all subscriber state stays on the
//! thread that built the notifier.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::codec::PackedConfig;
use crate::constants::{pads, panels};
use crate::driver::{self, Driver, TestModeData, UpdateReason};

/// Identifies whoever triggered an explicit configuration notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

/// One pad as of the latest poll
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PadSnapshot {
    pub connected: bool,
    pub serial: String,
    pub firmware_version: u16,
    pub config: PackedConfig,
    pub test_data: TestModeData,
    pub inputs: [bool; panels::COUNT],
}

/// What changed, delivered with the full state of both pads
#[derive(Debug, Clone)]
pub struct ChangeArgs {
    pub configuration_changed: bool,
    pub input_changed: bool,
    pub test_data_changed: bool,
    pub pads: [PadSnapshot; pads::COUNT],
    /// Set when a caller announced its own edit. Every subscriber is
    /// notified regardless; compare against your own id to skip echoes.
    /// The one exception: a callback is never re-entered, so a subscriber
    /// that fires a change from inside its own callback misses that nested
    /// notification.
    pub source: Option<SourceId>,
}

#[derive(Debug, Clone, Copy)]
struct DriverEvent {
    pad: usize,
    reason: UpdateReason,
}

/// Memory of the last poll used for diffing
#[derive(Default)]
struct PollMemory {
    was_connected: [bool; pads::COUNT],
    last_inputs: [Option<[bool; panels::COUNT]>; pads::COUNT],
    last_test_data: [Option<TestModeData>; pads::COUNT],
}

type Callback = Box<dyn FnMut(&ChangeArgs)>;

struct Subscriber {
    id: u64,
    callback: RefCell<Callback>,
    refresh_on_input_change: bool,
    refresh_on_test_data_change: bool,
    active: Cell<bool>,
}

impl Subscriber {
    fn wants(&self, args: &ChangeArgs) -> bool {
        args.configuration_changed
            || (args.input_changed && self.refresh_on_input_change)
            || (args.test_data_changed && self.refresh_on_test_data_change)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Rc<Subscriber>>,
}

impl Registry {
    /// Remove unsubscribed entries. The caller drops the result after
    /// releasing the borrow, since dropping a callback can drop further
    /// subscriptions.
    fn prune(&mut self) -> Vec<Rc<Subscriber>> {
        let (active, removed) = std::mem::take(&mut self.subscribers)
            .into_iter()
            .partition(|s| s.active.get());
        self.subscribers = active;
        removed
    }
}

/// Handle returned by [`ChangeNotifier::subscribe`]. Dropping it stops
/// further callbacks, including from inside a callback.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscriber: Weak<Subscriber>,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    /// Pass to [`ChangeNotifier::fire_configuration_changed`] to tag edits
    pub fn source_id(&self) -> SourceId {
        SourceId(self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscriber) = self.subscriber.upgrade() {
            subscriber.active.set(false);
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // Inactive entries left behind here are pruned on the next dispatch
        // or subscribe.
        let removed = match registry.try_borrow_mut() {
            Ok(mut registry) => registry.prune(),
            Err(_) => {
                trace!(id = self.id, "Registry busy, unsubscribe deferred");
                return;
            }
        };
        drop(removed);
        trace!(id = self.id, "Unsubscribed");
    }
}

pub struct ChangeNotifier {
    driver: Arc<dyn Driver>,
    events: Receiver<DriverEvent>,
    memory: RefCell<PollMemory>,
    registry: Rc<RefCell<Registry>>,
}

impl ChangeNotifier {
    /// Register with the driver. Callbacks are queued until [`pump`](Self::pump).
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        let (sender, events) = mpsc::channel();
        driver.start_notifications(Box::new(move |pad, reason| {
            // Runs on the driver's thread: queue only.
            let _ = sender.send(DriverEvent { pad, reason });
        }));
        Self {
            driver,
            events,
            memory: RefCell::new(PollMemory::default()),
            registry: Rc::new(RefCell::new(Registry::default())),
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Fresh state of both pads, read from the driver
    pub fn get_state(&self) -> [PadSnapshot; pads::COUNT] {
        std::array::from_fn(|pad| self.read_pad(pad))
    }

    fn read_pad(&self, pad: usize) -> PadSnapshot {
        let driver = self.driver.as_ref();
        let info = driver.info(pad);
        let mask = driver.input_state(pad);
        PadSnapshot {
            connected: info.connected,
            serial: info.serial,
            firmware_version: info.firmware_version,
            config: driver::read_config(driver, pad).unwrap_or_default(),
            test_data: driver.test_data(pad).unwrap_or_default(),
            inputs: std::array::from_fn(|panel| mask & (1 << panel) != 0),
        }
    }

    /// Handle every queued driver event. Returns how many were handled.
    pub fn pump(&self) -> usize {
        let mut handled = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.handle(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return handled,
            }
        }
    }

    /// Wait up to `timeout` for an event, then drain the queue
    pub fn pump_blocking(&self, timeout: Duration) -> usize {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.handle(event);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn handle(&self, event: DriverEvent) {
        debug!(pad = event.pad, reason = ?event.reason, "Driver event");
        match event.reason {
            UpdateReason::Updated => self.check_for_changes(),
            // A reset can leave the config byte-identical to the cached copy.
            UpdateReason::FactoryResetComplete => self.fire_configuration_changed(None),
        }
    }

    fn check_for_changes(&self) {
        let pads = self.get_state();
        let mut args = ChangeArgs {
            configuration_changed: false,
            input_changed: false,
            test_data_changed: false,
            pads,
            source: None,
        };

        {
            let mut memory = self.memory.borrow_mut();
            for (pad, snapshot) in args.pads.iter().enumerate() {
                // Only connection changes count as configuration changes here;
                // edits announce themselves through fire_configuration_changed.
                if memory.was_connected[pad] != snapshot.connected {
                    args.configuration_changed = true;
                    memory.was_connected[pad] = snapshot.connected;
                }
                if memory.last_inputs[pad] != Some(snapshot.inputs) {
                    args.input_changed = true;
                    memory.last_inputs[pad] = Some(snapshot.inputs);
                }
                if memory.last_test_data[pad].as_ref() != Some(&snapshot.test_data) {
                    args.test_data_changed = true;
                    memory.last_test_data[pad] = Some(snapshot.test_data.clone());
                }
            }
        }

        if args.configuration_changed || args.input_changed || args.test_data_changed {
            self.dispatch(&args);
        }
    }

    /// Announce an edit. Always dispatches, with `configuration_changed` set.
    pub fn fire_configuration_changed(&self, source: Option<SourceId>) {
        let args = ChangeArgs {
            configuration_changed: true,
            input_changed: false,
            test_data_changed: false,
            pads: self.get_state(),
            source,
        };
        self.dispatch(&args);
    }

    fn dispatch(&self, args: &ChangeArgs) {
        // Snapshot the list so callbacks may subscribe or unsubscribe freely.
        let (subscribers, removed) = {
            let mut registry = self.registry.borrow_mut();
            let removed = registry.prune();
            (registry.subscribers.clone(), removed)
        };
        drop(removed);
        debug!(
            configuration = args.configuration_changed,
            input = args.input_changed,
            test_data = args.test_data_changed,
            source = ?args.source,
            subscribers = subscribers.len(),
            "Dispatching change"
        );
        for subscriber in subscribers {
            if !subscriber.active.get() || !subscriber.wants(args) {
                continue;
            }
            // A callback that triggers a nested dispatch is not re-entered:
            // it is skipped for that nested notification.
            if let Ok(mut callback) = subscriber.callback.try_borrow_mut() {
                (*callback)(args);
            }
        }
    }

    /// Register a callback. It runs once right away with the current state,
    /// then on every configuration change, plus input or test data changes
    /// when asked for.
    pub fn subscribe(
        &self,
        callback: impl FnMut(&ChangeArgs) + 'static,
        refresh_on_input_change: bool,
        refresh_on_test_data_change: bool,
    ) -> Subscription {
        let (subscriber, removed) = {
            let mut registry = self.registry.borrow_mut();
            let removed = registry.prune();
            registry.next_id += 1;
            let subscriber = Rc::new(Subscriber {
                id: registry.next_id,
                callback: RefCell::new(Box::new(callback)),
                refresh_on_input_change,
                refresh_on_test_data_change,
                active: Cell::new(true),
            });
            registry.subscribers.push(subscriber.clone());
            (subscriber, removed)
        };
        drop(removed);
        trace!(id = subscriber.id, "Subscribed");

        let subscription = Subscription {
            id: subscriber.id,
            subscriber: Rc::downgrade(&subscriber),
            registry: Rc::downgrade(&self.registry),
        };
        let initial = ChangeArgs {
            configuration_changed: false,
            input_changed: false,
            test_data_changed: false,
            pads: self.get_state(),
            source: None,
        };
        if let Ok(mut callback) = subscriber.callback.try_borrow_mut() {
            (*callback)(&initial);
        }
        subscription
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().subscribers.iter().filter(|s| s.active.get()).count()
    }
}
