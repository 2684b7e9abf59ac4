//! Cortex-M support: the SysTick tick source and an optional critical section.

pub mod systick;

#[cfg(feature = "critical-section-impl")]
mod interrupt_mask;

