//! Fixed-capacity message pool with a FIFO of pushed slots.
//!
//! A [`Mailbox`] owns `N` slots of `T`. Producers [`allocate`](Mailbox::allocate)
//! a slot, fill it in and [`put`](Mailbox::put) it on the queue; consumers
//! [`get`](Mailbox::get) it back and eventually [`free`](Mailbox::free) it.
//! Each slot moves through
//!
//! ```text
//! Free --allocate--> Allocated --put / insert_first--> Pushed --get--> Allocated --free--> Free
//! ```
//!
//! The queue is an array of `N` cells holding slot indices with a single head
//! index and no tail: pushing scans forward from the head for the first empty
//! cell, popping takes the head cell.
//!
//! Errors a caller can recover from are returned as [`MailboxError`]. A slot
//! found in the wrong state is a broken invariant, checked with `debug_assert!`
//! and so only fatal in debug builds.

use core::cell::{RefCell, UnsafeCell};
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::ptr;

use critical_section::Mutex;

/// Declare a `static` [`Mailbox`] holding `count` elements of a type.
///
/// ```
/// polymcu::mailbox!(static RX: [u32; 4] = 0;);
///
/// let mut slot = RX.allocate().unwrap();
/// *slot = 7;
/// RX.put(slot).ok().unwrap();
/// assert_eq!(RX.len(), 1);
/// ```
#[macro_export]
macro_rules! mailbox {
    ($(#[$attr:meta])* $vis:vis static $name:ident: [$ty:ty; $count:expr] = $fill:expr;) => {
        $(#[$attr])*
        $vis static $name: $crate::Mailbox<$ty, $count> = $crate::Mailbox::new($fill);
    };
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum SlotStatus {
    Free,
    Allocated,
    Pushed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MailboxError {
    /// The slot belongs to another mailbox.
    ForeignSlot,
    /// No empty queue cell was found. Only possible if the queue is corrupted.
    Full,
}

struct Ledger<const N: usize> {
    status: [SlotStatus; N],
    fifo: [Option<usize>; N],
    head: usize,
}

impl<const N: usize> Ledger<N> {
    const fn new() -> Self {
        Ledger {
            status: [SlotStatus::Free; N],
            fifo: [None; N],
            head: 0,
        }
    }

    /// Cell indices starting at the head and wrapping around.
    fn cells_from_head(&self) -> impl Iterator<Item = usize> {
        let head = self.head;
        (head..N).chain(0..head)
    }
}

pub struct Mailbox<T, const N: usize> {
    pool: UnsafeCell<[T; N]>,
    fill: T,
    ledger: Mutex<RefCell<Ledger<N>>>,
}

// Slots are only reachable through a `Slot` token, and the ledger hands out at
// most one token per index. A shared `&Slot` hands out `&T` to other contexts.
unsafe impl<T: Send + Sync, const N: usize> Sync for Mailbox<T, N> {}

impl<T: Copy, const N: usize> Mailbox<T, N> {
    /// Create a mailbox with every slot set to `fill`.
    pub const fn new(fill: T) -> Self {
        Mailbox {
            pool: UnsafeCell::new([fill; N]),
            fill,
            ledger: Mutex::new(RefCell::new(Ledger::new())),
        }
    }

    /// Return every slot to the pool and empty the queue.
    pub fn init(&mut self) {
        *self.pool.get_mut() = [self.fill; N];
        *self.ledger.get_mut().get_mut() = Ledger::new();
    }
}

impl<T, const N: usize> Mailbox<T, N> {
    pub const fn capacity(&self) -> usize {
        N
    }

    fn owns(&self, slot: &Slot<'_, T, N>) -> bool {
        ptr::eq(self, slot.mailbox)
    }

    /// Claim the first free slot, or `None` when all are in use.
    pub fn allocate(&self) -> Option<Slot<'_, T, N>> {
        critical_section::with(|cs| {
            let mut ledger = self.ledger.borrow(cs).borrow_mut();
            let index = ledger.status.iter().position(|s| *s == SlotStatus::Free)?;
            ledger.status[index] = SlotStatus::Allocated;
            Some(Slot { mailbox: self, index })
        })
    }

    /// Give an allocated slot back to the pool.
    pub fn free(&self, slot: Slot<'_, T, N>) {
        debug_assert!(self.owns(&slot), "slot freed to the wrong mailbox");
        if !self.owns(&slot) {
            return;
        }

        critical_section::with(|cs| {
            let mut ledger = self.ledger.borrow(cs).borrow_mut();
            debug_assert_eq!(ledger.status[slot.index], SlotStatus::Allocated);
            ledger.status[slot.index] = SlotStatus::Free;
        })
    }

    /// Queue the slot behind every slot already pushed.
    ///
    /// On error the slot is handed back, still allocated.
    pub fn put<'a>(&'a self, slot: Slot<'a, T, N>) -> Result<(), (MailboxError, Slot<'a, T, N>)> {
        if !self.owns(&slot) {
            return Err((MailboxError::ForeignSlot, slot));
        }

        critical_section::with(|cs| {
            let mut ledger = self.ledger.borrow(cs).borrow_mut();
            debug_assert_eq!(ledger.status[slot.index], SlotStatus::Allocated);
            debug_assert!(!ledger.fifo.contains(&Some(slot.index)));

            let Some(cell) = ledger.cells_from_head().find(|&i| ledger.fifo[i].is_none()) else {
                debug_assert!(false, "mailbox queue has no empty cell");
                return Err((MailboxError::Full, slot));
            };
            ledger.fifo[cell] = Some(slot.index);
            ledger.status[slot.index] = SlotStatus::Pushed;
            Ok(())
        })
    }

    /// Queue the slot so that it is the next one returned by [`get`](Self::get).
    ///
    /// On error the slot is handed back, still allocated.
    pub fn insert_first<'a>(&'a self, slot: Slot<'a, T, N>) -> Result<(), (MailboxError, Slot<'a, T, N>)> {
        if !self.owns(&slot) {
            return Err((MailboxError::ForeignSlot, slot));
        }

        critical_section::with(|cs| {
            let mut ledger = self.ledger.borrow(cs).borrow_mut();
            debug_assert_eq!(ledger.status[slot.index], SlotStatus::Allocated);
            debug_assert!(!ledger.fifo.contains(&Some(slot.index)));

            let head = ledger.head;
            if ledger.fifo[head].is_none() {
                ledger.fifo[head] = Some(slot.index);
            } else {
                let before = if head == 0 { N - 1 } else { head - 1 };
                if ledger.fifo[before].is_some() {
                    debug_assert!(false, "mailbox queue has no cell before its head");
                    return Err((MailboxError::Full, slot));
                }
                ledger.fifo[before] = Some(slot.index);
                ledger.head = before;
            }
            ledger.status[slot.index] = SlotStatus::Pushed;
            Ok(())
        })
    }

    /// Pop the oldest pushed slot. It is allocated to the caller again.
    pub fn get(&self) -> Option<Slot<'_, T, N>> {
        critical_section::with(|cs| {
            let mut ledger = self.ledger.borrow(cs).borrow_mut();
            let head = ledger.head;
            let index = ledger.fifo[head].take()?;

            ledger.head = if head + 1 == N { 0 } else { head + 1 };

            debug_assert_eq!(ledger.status[index], SlotStatus::Pushed);
            ledger.status[index] = SlotStatus::Allocated;
            Some(Slot { mailbox: self, index })
        })
    }

    /// Number of slots queued, counted from the head up to the first empty cell.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| {
            let ledger = self.ledger.borrow(cs).borrow();
            ledger
                .cells_from_head()
                .take_while(|&i| ledger.fifo[i].is_some())
                .count()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one allocated slot of a [`Mailbox`].
///
/// A slot that is dropped instead of being freed or pushed stays allocated.
#[must_use = "a slot stays allocated until it is freed or pushed"]
pub struct Slot<'a, T, const N: usize> {
    mailbox: &'a Mailbox<T, N>,
    index: usize,
}

impl<T, const N: usize> Slot<'_, T, N> {
    /// Position of the slot in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    fn as_ptr(&self) -> *mut T {
        // The index is in bounds: it was handed out by the mailbox ledger.
        unsafe { (self.mailbox.pool.get() as *mut T).add(self.index) }
    }
}

impl<T, const N: usize> Deref for Slot<'_, T, N> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.as_ptr() }
    }
}

impl<T, const N: usize> DerefMut for Slot<'_, T, N> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.as_ptr() }
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for Slot<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("index", &self.index)
            .field("value", &**self)
            .finish()
    }
}
