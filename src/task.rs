pub(crate) const STARTED: u8 = 1 << 0;
pub(crate) const PERIODIC: u8 = 1 << 1;
pub(crate) const ONE_TIME: u8 = 1 << 2;

/// Callback run by the scheduler when a task is due.
///
/// `fire` runs in the tick interrupt with the current tick count. It must be
/// short and must not block. It may call back into the scheduler, for example
/// to re-arm a one-shot task.
pub trait TimerTask: Sync {
    fn fire(&self, now: u32);
}

impl<F: Fn(u32) + Sync> TimerTask for F {
    fn fire(&self, now: u32) {
        self(now)
    }
}

/// Handle to a slot in a scheduler's task table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskHandle {
    pub(crate) index: usize,
}

impl TaskHandle {
    /// Position of the task in the table.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Error returned when a handle no longer names a registered task.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskError {
    /// The slot was removed, or the handle is out of range for this table.
    Unregistered,
}

#[derive(Copy, Clone)]
pub(crate) struct TaskSlot {
    pub(crate) attributes: u8,
    pub(crate) task: Option<&'static dyn TimerTask>,
    pub(crate) delta: u32,
    pub(crate) next_tick: u32,
}

impl TaskSlot {
    pub(crate) const EMPTY: TaskSlot = TaskSlot {
        attributes: 0,
        task: None,
        delta: 0,
        next_tick: 0,
    };

    pub(crate) fn is_free(&self) -> bool {
        self.task.is_none()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.attributes & STARTED != 0
    }

    // Not wraparound-safe: a `next_tick` that wrapped past zero is due at once.
    pub(crate) fn due(&self, tick: u32) -> Option<&'static dyn TimerTask> {
        match self.task {
            Some(task) if self.is_started() && tick > self.next_tick => Some(task),
            _ => None,
        }
    }

    pub(crate) fn register(&mut self, kind: u8, task: &'static dyn TimerTask, delta: u32) {
        self.attributes = kind;
        self.task = Some(task);
        self.delta = delta;
    }
}
