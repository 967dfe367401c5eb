//! Double-buffered profile storage shared by one sampler and one serializer.
//!
//! The recorder keeps two profiles ("slots"), each paired with its own mutex.
//! The **active** slot is the one whose mutex is unlocked: the sampler finds
//! it by try-locking slot one, then slot two, and records into whichever it
//! got. The **inactive** slot's mutex is held by the recorder itself as a
//! reservation until the serializer flips the slots:
//!
//! 1. stamp the inactive (empty) slot with the flip time and release its
//!    reservation (it is now active),
//! 2. lock the previously active slot (waiting for at most one in-flight
//!    `record_sample`),
//! 3. update `active_slot`.
//!
//! Between 1 and 2 the sampler may land on either slot. Both are fine: the
//! sample is reported either in this flush or in the next one.
//!
//! The sampler never blocks. If both try-locks fail for
//! `SLOT_LOCK_ATTEMPTS` rounds the sample is dropped and counted.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::SystemTime;

use parking_lot::lock_api::RawMutex as _;
use parking_lot::{Mutex, RawMutex};

use crate::error::RecordError;
use crate::profile::{Profile, ProfileStore};
use crate::sample::{Metric, Sample};
use crate::session::configuration::EnabledMetrics;

/// Rounds of (slot one, slot two) try-locks before a sample is dropped.
/// Both try-locks failing means the serializer was flipping right between them,
/// which resolves immediately.
pub const SLOT_LOCK_ATTEMPTS: usize = 3;

struct Slot<P> {
    mutex: RawMutex,
    profile: UnsafeCell<P>,
}

impl<P: ProfileStore> Slot<P> {
    fn unlocked(value_types: &[Metric], start_time: SystemTime) -> Self {
        Slot {
            mutex: RawMutex::INIT,
            profile: UnsafeCell::new(P::new(value_types, start_time)),
        }
    }

    fn reserved(value_types: &[Metric], start_time: SystemTime) -> Self {
        let slot = Self::unlocked(value_types, start_time);
        // Fresh mutex, cannot block.
        slot.mutex.lock();
        slot
    }
}

/// A finished profile taken out of the recorder by `serialize`.
#[derive(Debug)]
pub struct SerializedProfile<P = Profile> {
    /// When the returned profile started accepting samples.
    pub start: SystemTime,
    pub finish: SystemTime,
    /// Start of the period that began with this flip. The next `serialize`
    /// returns a profile starting here.
    pub next_start: SystemTime,
    pub profile: P,
}

pub struct StackRecorder<P: ProfileStore = Profile> {
    enabled_metrics: EnabledMetrics,
    value_types: Vec<Metric>,
    slot_one: Slot<P>,
    slot_two: Slot<P>,
    // 1 or 2. Only the serializer side reads this.
    active_slot: AtomicU8,
    serializer: Mutex<()>,
    dropped_samples: AtomicU64,
}

// The profiles are only ever accessed while holding the matching slot mutex.
unsafe impl<P: ProfileStore + Send> Sync for StackRecorder<P> {}

impl<P: ProfileStore> StackRecorder<P> {
    pub fn new(enabled_metrics: EnabledMetrics) -> Self {
        let value_types = enabled_metrics.value_types();
        let now = SystemTime::now();
        StackRecorder {
            enabled_metrics,
            slot_one: Slot::unlocked(&value_types, now),
            slot_two: Slot::reserved(&value_types, now),
            value_types,
            active_slot: AtomicU8::new(1),
            serializer: Mutex::new(()),
            dropped_samples: AtomicU64::new(0),
        }
    }

    /// Record `sample` into the active slot.
    ///
    /// Never blocks. Must not be called by more than one thread at a time.
    pub fn record_sample(&self, sample: &Sample<'_>) -> Result<(), RecordError> {
        let slot = match self.acquire_active_slot() {
            Some(slot) => slot,
            None => {
                self.dropped_samples.fetch_add(1, Ordering::Relaxed);
                log::debug!("No active profile slot found. Dropping sample.");
                return Err(RecordError::NoActiveSlot);
            }
        };

        // Safety: we hold `slot.mutex`.
        unsafe { (*slot.profile.get()).add(sample) };
        // Safety: locked by `acquire_active_slot` in this thread.
        unsafe { slot.mutex.unlock() };
        Ok(())
    }

    fn acquire_active_slot(&self) -> Option<&Slot<P>> {
        for _ in 0..SLOT_LOCK_ATTEMPTS {
            if self.slot_one.mutex.try_lock() {
                return Some(&self.slot_one);
            }
            if self.slot_two.mutex.try_lock() {
                return Some(&self.slot_two);
            }
            std::hint::spin_loop();
        }
        None
    }

    /// Flip the slots and take the profile that was active until now.
    ///
    /// May block for the duration of one in-flight `record_sample`.
    pub fn serialize(&self, finish: SystemTime) -> SerializedProfile<P> {
        let _serializer = self.serializer.lock();

        let (previously_inactive, previously_active, next_active_slot) =
            match self.active_slot.load(Ordering::Acquire) {
                1 => (&self.slot_two, &self.slot_one, 2),
                _ => (&self.slot_one, &self.slot_two, 1),
            };

        let next_start = SystemTime::now();
        // Safety: the reservation lock was taken by this recorder (at
        // construction or by the previous flip), and `serializer` makes us
        // the only thread that can release it. The store behind it is empty
        // and starts accepting samples now.
        unsafe {
            (*previously_inactive.profile.get()).set_start_time(next_start);
            previously_inactive.mutex.unlock();
        }
        previously_active.mutex.lock();
        self.active_slot.store(next_active_slot, Ordering::Release);

        // Safety: we hold `previously_active.mutex` as the new reservation.
        let profile = unsafe { (*previously_active.profile.get()).reset(next_start) };
        log::debug!("Flipped profile slots, slot {} is now active", next_active_slot);

        SerializedProfile {
            start: profile.start_time(),
            finish,
            next_start,
            profile,
        }
    }

    /// Rebuild all state from scratch. Used in the child after a fork, where
    /// the inherited lock state cannot be trusted.
    pub fn reset_after_fork(&mut self) {
        let now = SystemTime::now();
        self.slot_one = Slot::unlocked(&self.value_types, now);
        self.slot_two = Slot::reserved(&self.value_types, now);
        self.active_slot = AtomicU8::new(1);
        self.serializer = Mutex::new(());
        self.dropped_samples = AtomicU64::new(0);
        log::debug!("Stack recorder reset");
    }

    /// Diagnostic only: the slot the sampler should currently find unlocked.
    pub fn active_slot(&self) -> u8 {
        self.active_slot.load(Ordering::Acquire)
    }

    pub fn slot_one_locked(&self) -> bool {
        self.slot_one.mutex.is_locked()
    }

    pub fn slot_two_locked(&self) -> bool {
        self.slot_two.mutex.is_locked()
    }

    /// Samples dropped because no active slot was found.
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    pub fn enabled_metrics(&self) -> EnabledMetrics {
        self.enabled_metrics
    }

    pub fn value_types(&self) -> &[Metric] {
        &self.value_types
    }
}
