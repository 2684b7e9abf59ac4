#![no_std]

#[macro_use]
mod fmt;

mod hw;
pub use hw::TickSource;

mod task;
pub use task::{TaskError, TaskHandle, TimerTask};

mod time;
pub use time::{Scheduler, PERIOD_IN_SECOND, TIMER_PERIOD_MILLISECOND, TIMER_TASK_MAX};

pub mod mailbox;
pub use mailbox::{Mailbox, MailboxError, Slot};

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m;

/// Declare a `static` [`Scheduler`] driven by the given tick source.
///
/// The task table holds [`TIMER_TASK_MAX`] entries unless `tasks = N` is given.
///
/// ```ignore
/// polymcu::scheduler!(static TIMER: SysTick = unsafe { SysTick::new(48_000_000) };);
/// polymcu::scheduler!(static BIG: SysTick = unsafe { SysTick::new(48_000_000) }; tasks = 16);
/// ```
#[macro_export]
macro_rules! scheduler {
    ($(#[$attr:meta])* $vis:vis static $name:ident: $hw:ty = $init:expr;) => {
        $crate::scheduler!($(#[$attr])* $vis static $name: $hw = $init; tasks = $crate::TIMER_TASK_MAX);
    };
    ($(#[$attr:meta])* $vis:vis static $name:ident: $hw:ty = $init:expr; tasks = $count:expr) => {
        $(#[$attr])*
        $vis static $name: $crate::Scheduler<$hw, { $count }> = $crate::Scheduler::new($init);
    };
}
