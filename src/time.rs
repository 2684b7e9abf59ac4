use core::cell::RefCell;

use critical_section::Mutex;

use crate::hw::TickSource;
use crate::task::{TaskError, TaskHandle, TaskSlot, TimerTask, ONE_TIME, PERIODIC, STARTED};

/// Default size of a scheduler's task table.
pub const TIMER_TASK_MAX: usize = 8;

/// Tick rate giving one tick per millisecond.
pub const TIMER_PERIOD_MILLISECOND: u32 = 1000;

/// Tick rate giving one tick per second.
pub const PERIOD_IN_SECOND: u32 = 1;

struct State<const N: usize> {
    tasks: [TaskSlot; N],
    counter: u32,
    users: u32,
}

impl<const N: usize> State<N> {
    fn slot(&mut self, handle: TaskHandle) -> Result<&mut TaskSlot, TaskError> {
        match self.tasks.get_mut(handle.index()) {
            Some(slot) if !slot.is_free() => Ok(slot),
            _ => Err(TaskError::Unregistered),
        }
    }

    fn acquire(&mut self, hw: &impl TickSource) {
        self.users += 1;
        if self.users == 1 {
            trace!("tick source resumed");
            hw.resume();
        }
    }

    fn release(&mut self, hw: &impl TickSource) {
        if self.users == 0 {
            warn!("tick source released with no users");
            return;
        }
        self.users -= 1;
        if self.users == 0 {
            trace!("tick source paused");
            hw.pause();
        }
    }
}

/// Timer task scheduler multiplexing one tick source into a fixed table of
/// periodic and one-shot tasks.
///
/// A scheduler is normally declared as a `static` with [`scheduler!`](crate::scheduler)
/// and shared between the tick interrupt, which calls [`on_tick`](Self::on_tick),
/// and mainline code. All table, counter and reference-count updates happen in
/// a critical section.
///
/// The hardware is kept running only while it has users: each started task
/// holds one reference, and so does each [`wait`](Self::wait) in progress.
/// Unless the `balanced-refcount` feature is enabled, the classic accounting is
/// kept: starting a started task takes a second reference, and neither a
/// one-shot expiry nor removing a started task gives its reference back.
pub struct Scheduler<H, const N: usize = TIMER_TASK_MAX> {
    hw: H,
    state: Mutex<RefCell<State<N>>>,
}

impl<H, const N: usize> Scheduler<H, N> {
    pub const fn new(hw: H) -> Self {
        Self::starting_at(hw, 0)
    }

    /// Create a scheduler whose tick counter starts at `tick` rather than zero.
    pub const fn starting_at(hw: H, tick: u32) -> Self {
        Scheduler {
            hw,
            state: Mutex::new(RefCell::new(State {
                tasks: [TaskSlot::EMPTY; N],
                counter: tick,
                users: 0,
            })),
        }
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State<N>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow(cs).borrow_mut()))
    }

    /// Current tick count.
    pub fn get_value(&self) -> u32 {
        self.with_state(|state| state.counter)
    }

    /// Number of active users of the tick source.
    pub fn users(&self) -> u32 {
        self.with_state(|state| state.users)
    }

    fn create_task(&self, kind: u8, task: &'static dyn TimerTask, delta: u32) -> Option<TaskHandle> {
        self.with_state(|state| {
            let index = state.tasks.iter().position(TaskSlot::is_free)?;
            state.tasks[index].register(kind, task, delta);
            debug!("task {=usize} registered", index);
            Some(TaskHandle { index })
        })
    }

    /// Register a task firing every `period` ticks once started.
    ///
    /// Returns `None` when the table is full.
    pub fn create_periodic_task(&self, task: &'static dyn TimerTask, period: u32) -> Option<TaskHandle> {
        self.create_task(PERIODIC, task, period)
    }

    /// Register a task firing once, `delay` ticks after it is started.
    ///
    /// Returns `None` when the table is full.
    pub fn create_one_time_task(&self, task: &'static dyn TimerTask, delay: u32) -> Option<TaskHandle> {
        self.create_task(ONE_TIME, task, delay)
    }

    /// Whether the task is started.
    pub fn task_is_scheduled(&self, handle: TaskHandle) -> bool {
        self.with_state(|state| state.slot(handle).map_or(false, |slot| slot.is_started()))
    }
}

impl<H: TickSource, const N: usize> Scheduler<H, N> {
    /// Configure the tick source to interrupt `ticks_per_second` times per
    /// second. Call once, before any task is started.
    pub fn init(&self, ticks_per_second: u32) -> Result<(), H::Error> {
        self.hw.configure(ticks_per_second)
    }

    /// The configured tick rate, read back from the hardware.
    pub fn period(&self) -> u32 {
        self.hw.ticks_per_second()
    }

    /// Arm the task to fire `delta` ticks from now.
    pub fn start_task(&self, handle: TaskHandle) -> Result<(), TaskError> {
        self.with_state(|state| {
            let now = state.counter;
            let slot = state.slot(handle)?;
            let already_started = slot.is_started();
            slot.attributes |= STARTED;
            slot.next_tick = now.wrapping_add(slot.delta);
            trace!("task {=usize} due at {=u32}", handle.index, slot.next_tick);

            if !(cfg!(feature = "balanced-refcount") && already_started) {
                state.acquire(&self.hw);
            }
            Ok(())
        })
    }

    /// Disarm the task.
    pub fn stop_task(&self, handle: TaskHandle) -> Result<(), TaskError> {
        self.with_state(|state| {
            let slot = state.slot(handle)?;
            let was_started = slot.is_started();
            slot.attributes &= !STARTED;

            if !cfg!(feature = "balanced-refcount") || was_started {
                state.release(&self.hw);
            }
            Ok(())
        })
    }

    /// Free the task's slot for a later `create_*` call.
    ///
    /// The task is not stopped first: a started task keeps its reference on
    /// the tick source unless the `balanced-refcount` feature is enabled.
    pub fn remove_task(&self, handle: TaskHandle) {
        self.with_state(|state| {
            let Ok(slot) = state.slot(handle) else {
                return;
            };
            let was_started = slot.is_started();
            slot.task = None;
            debug!("task {=usize} removed", handle.index);

            if cfg!(feature = "balanced-refcount") && was_started {
                slot.attributes &= !STARTED;
                state.release(&self.hw);
            }
        })
    }

    /// Tick interrupt handler.
    pub fn on_tick(&self) {
        self.advance(1)
    }

    /// Account for `elapsed` ticks at once and scan the table a single time.
    ///
    /// A periodic task that fell behind fires once per scan and keeps its
    /// phase, so it catches up over the following ticks.
    pub fn advance(&self, elapsed: u32) {
        let tick = self.with_state(|state| {
            state.counter = state.counter.wrapping_add(elapsed);
            state.counter.wrapping_add(1)
        });
        let now = tick.wrapping_sub(1);

        for index in 0..N {
            let Some(task) = self.with_state(|state| state.tasks[index].due(tick)) else {
                continue;
            };

            task.fire(now);

            self.with_state(|state| {
                let slot = &mut state.tasks[index];
                if slot.is_free() {
                    return;
                }
                if slot.attributes & ONE_TIME != 0 {
                    // The callback may already have stopped its own task.
                    let was_started = slot.is_started();
                    slot.attributes &= !STARTED;
                    if cfg!(feature = "balanced-refcount") && was_started {
                        state.release(&self.hw);
                    }
                } else if slot.attributes & PERIODIC != 0 {
                    slot.next_tick = slot.next_tick.wrapping_add(slot.delta);
                }
            });
        }
    }

    /// Block for `delay` ticks, sleeping between tick interrupts.
    ///
    /// Must not be called from the tick interrupt.
    pub fn wait(&self, delay: u32) {
        self.wait_with(delay, || self.hw.wait_for_interrupt())
    }

    /// Block for `delay` ticks, calling `idle` until the counter gets there.
    ///
    /// The tick source is held for the whole wait. When `now + delay` would
    /// overflow, this first waits for the counter to wrap and then for the
    /// remainder.
    pub fn wait_with(&self, delay: u32, mut idle: impl FnMut()) {
        self.with_state(|state| state.acquire(&self.hw));
        let _timer = scopeguard::guard(&self.hw, |hw| self.with_state(|state| state.release(hw)));

        let start = self.get_value();
        if start > u32::MAX - delay {
            let wait_until = delay - (u32::MAX - start);

            while self.get_value() >= start {
                idle();
            }
            while self.get_value() < wait_until {
                idle();
            }
        } else {
            let wait_until = start + delay;

            while self.get_value() < wait_until {
                idle();
            }
        }
    }
}
