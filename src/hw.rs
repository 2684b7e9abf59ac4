/// A periodic tick interrupt source driving a [`Scheduler`](crate::Scheduler).
///
/// The implementation owns the hardware timer; the scheduler only asks it to
/// be configured once, then resumes and pauses it as its users come and go.
/// Its interrupt handler must call [`Scheduler::on_tick`](crate::Scheduler::on_tick).
pub trait TickSource {
    /// Error returned by the hardware when it cannot be configured.
    type Error;

    /// Program the source to interrupt `ticks_per_second` times per second.
    fn configure(&self, ticks_per_second: u32) -> Result<(), Self::Error>;

    /// Read back the configured rate.
    fn ticks_per_second(&self) -> u32;

    /// Start counting and delivering tick interrupts.
    fn resume(&self);

    /// Stop the counter to save power.
    fn pause(&self);

    /// Sleep until the next interrupt.
    fn wait_for_interrupt(&self);
}
