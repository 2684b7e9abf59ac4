#![no_std]
#![no_main]

use core::cell::Cell;

use critical_section::Mutex;
use panic_probe as _;
use defmt_rtt as _;

use polymcu::cortex_m::systick::SysTick;
use polymcu::TIMER_PERIOD_MILLISECOND;

const CORE_CLOCK_HZ: u32 = 48_000_000;
const TIMER_PERIOD: u32 = TIMER_PERIOD_MILLISECOND;

const EVENT_PERIODIC: u8 = 1 << 0;
const EVENT_ONE_TIME: u8 = 1 << 1;

polymcu::scheduler!(static TIMER: SysTick = unsafe { SysTick::new(CORE_CLOCK_HZ) };);
polymcu::systick_handler!(TIMER);

polymcu::mailbox!(static EVENTS: [u32; 4] = 0;);

static STATE: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));

fn raise(event: u8) {
    critical_section::with(|cs| {
        let state = STATE.borrow(cs);
        state.set(state.get() | event);
    });
}

fn take(event: u8) -> bool {
    critical_section::with(|cs| {
        let state = STATE.borrow(cs);
        let raised = state.get() & event != 0;
        state.set(state.get() & !event);
        raised
    })
}

fn periodic(now: u32) {
    raise(EVENT_PERIODIC);

    // Drop the sample if the main loop has fallen behind.
    if let Some(mut slot) = EVENTS.allocate() {
        *slot = now;
        if let Err((err, slot)) = EVENTS.put(slot) {
            defmt::warn!("sample rejected: {}", err);
            EVENTS.free(slot);
        }
    }
}

fn one_time(_now: u32) {
    raise(EVENT_ONE_TIME);
}

static PERIODIC: fn(u32) = periodic;
static ONE_TIME: fn(u32) = one_time;

#[cortex_m_rt::entry]
fn main() -> ! {
    if let Err(err) = TIMER.init(TIMER_PERIOD) {
        defmt::panic!("failed to initialize the timer: {}", err);
    }
    defmt::info!("The period is {=u32}.", TIMER.period());

    let Some(task_periodic) = TIMER.create_periodic_task(&PERIODIC, 4 * TIMER_PERIOD) else {
        defmt::panic!("no room for the periodic task");
    };
    let Some(task_one_time) = TIMER.create_one_time_task(&ONE_TIME, 10 * TIMER_PERIOD) else {
        defmt::panic!("no room for the one-time task");
    };

    defmt::unwrap!(TIMER.start_task(task_periodic));
    defmt::unwrap!(TIMER.start_task(task_one_time));

    loop {
        if take(EVENT_PERIODIC) {
            defmt::info!("# Periodic event");
        }
        while let Some(slot) = EVENTS.get() {
            defmt::info!("sampled at tick {=u32}", *slot);
            EVENTS.free(slot);
        }
        if take(EVENT_ONE_TIME) {
            defmt::info!("# One Time event");

            // Resume the one-time task
            defmt::unwrap!(TIMER.start_task(task_one_time));
        }
        defmt::info!("Wait 2 seconds (current timer value: {=u32})", TIMER.get_value());
        TIMER.wait(2 * TIMER_PERIOD);
    }
}
