#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use polymcu::{Scheduler, TickSource, TimerTask};

#[derive(Debug, PartialEq, Eq)]
pub enum MockError {
    ZeroRate,
}

/// Tick source that only records what the scheduler asked of it.
#[derive(Default)]
pub struct MockTick {
    rate: AtomicU32,
    running: AtomicBool,
    resumes: AtomicU32,
    pauses: AtomicU32,
}

impl MockTick {
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> u32 {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> u32 {
        self.pauses.load(Ordering::SeqCst)
    }
}

impl TickSource for MockTick {
    type Error = MockError;

    fn configure(&self, ticks_per_second: u32) -> Result<(), MockError> {
        if ticks_per_second == 0 {
            return Err(MockError::ZeroRate);
        }
        self.rate.store(ticks_per_second, Ordering::SeqCst);
        Ok(())
    }

    fn ticks_per_second(&self) -> u32 {
        self.rate.load(Ordering::SeqCst)
    }

    fn resume(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn wait_for_interrupt(&self) {
        panic!("no interrupt will come; drive the wait with wait_with");
    }
}

pub type MockScheduler = Scheduler<MockTick>;

pub fn scheduler() -> &'static MockScheduler {
    Box::leak(Box::new(Scheduler::new(MockTick::default())))
}

/// Task callback remembering the tick of every call.
#[derive(Default)]
pub struct Recorder {
    fired: Mutex<Vec<u32>>,
}

impl Recorder {
    pub fn new() -> &'static Recorder {
        Box::leak(Box::default())
    }

    pub fn fired(&self) -> Vec<u32> {
        self.fired.lock().unwrap().clone()
    }
}

impl TimerTask for Recorder {
    fn fire(&self, now: u32) {
        self.fired.lock().unwrap().push(now);
    }
}

pub fn run_ticks<H: TickSource, const N: usize>(scheduler: &Scheduler<H, N>, ticks: u32) {
    for _ in 0..ticks {
        scheduler.on_tick();
    }
}
