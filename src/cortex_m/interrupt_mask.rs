use core::sync::atomic::{AtomicU32, Ordering};

/// Interrupt-masking critical section with a nesting count.
///
/// Interrupts are disabled on every entry and only enabled again when the
/// outermost section is left.
struct InterruptMask;
critical_section::set_impl!(InterruptMask);

static NESTING: AtomicU32 = AtomicU32::new(0);

unsafe impl critical_section::Impl for InterruptMask {
    unsafe fn acquire() {
        cortex_m::interrupt::disable();
        // Interrupts are off, so a plain load and store cannot be torn.
        NESTING.store(NESTING.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
    }

    unsafe fn release(_: ()) {
        let depth = NESTING.load(Ordering::Relaxed) - 1;
        NESTING.store(depth, Ordering::Relaxed);
        if depth == 0 {
            unsafe { cortex_m::interrupt::enable() }
        }
    }
}
