use cortex_m::peripheral::{syst, SYST};

use crate::TickSource;

const SYST_CSR_ENABLE: u32 = 1 << 0;
const SYST_CSR_TICKINT: u32 = 1 << 1;
const SYST_CSR_CLKSOURCE: u32 = 1 << 2;

const SYST_RVR_MAX: u32 = 0x00ff_ffff;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysTickError {
    /// A rate of zero ticks per second was requested.
    ZeroRate,
    /// The core clock is too fast for the requested rate to fit the 24-bit reload register.
    ReloadOutOfRange,
}

/// The Cortex-M SysTick timer, counting core clock cycles.
pub struct SysTick {
    core_clock_hz: u32,
}

impl SysTick {
    /// SAFETY: takes over the SYST peripheral. Nothing else may use it.
    pub const unsafe fn new(core_clock_hz: u32) -> SysTick {
        SysTick { core_clock_hz }
    }

    pub fn registers(&self) -> &syst::RegisterBlock {
        unsafe { &*SYST::PTR }
    }
}

impl TickSource for SysTick {
    type Error = SysTickError;

    fn configure(&self, ticks_per_second: u32) -> Result<(), SysTickError> {
        if ticks_per_second == 0 {
            return Err(SysTickError::ZeroRate);
        }
        let reload = (self.core_clock_hz / ticks_per_second).wrapping_sub(1);
        if reload > SYST_RVR_MAX {
            return Err(SysTickError::ReloadOutOfRange);
        }

        unsafe {
            self.registers().rvr.write(reload);
            self.registers().cvr.write(0);
            self.registers().csr.write(SYST_CSR_ENABLE | SYST_CSR_CLKSOURCE | SYST_CSR_TICKINT);
        }
        debug!("systick reload {=u32}", reload);
        Ok(())
    }

    fn ticks_per_second(&self) -> u32 {
        self.core_clock_hz / (self.registers().rvr.read() + 1)
    }

    fn resume(&self) {
        unsafe { self.registers().csr.modify(|csr| csr | SYST_CSR_ENABLE) }
    }

    fn pause(&self) {
        unsafe { self.registers().csr.modify(|csr| csr & !SYST_CSR_ENABLE) }
    }

    fn wait_for_interrupt(&self) {
        cortex_m::asm::wfi();
    }
}

/// Declare the `SysTick` exception handler, forwarding every tick to a
/// `static` [`Scheduler`](crate::Scheduler).
///
/// The application must depend on `cortex-m-rt`.
#[macro_export]
macro_rules! systick_handler {
    ($scheduler:path) => {
        #[::cortex_m_rt::exception]
        fn SysTick() {
            $scheduler.on_tick()
        }
    };
}
