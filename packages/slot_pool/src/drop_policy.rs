/// Determines how a [`SlotPool`][crate::SlotPool] treats slots that are still acquired when the
/// pool itself is dropped.
///
/// The pool always releases the memory of every slot it reserved when it is dropped. The policy
/// only decides whether outstanding slots are acceptable at that point.
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use slot_pool::{DropPolicy, SlotPool};
///
/// // The drop policy is set at pool creation time.
/// let pool = SlotPool::builder()
///     .slot_size(nz!(16))
///     .capacity(nz!(4))
///     .drop_policy(DropPolicy::MustNotHaveOutstandingSlots)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The pool releases all of its memory when dropped, even if some slots were never returned.
    /// This is the default.
    #[default]
    MayReleaseOutstandingSlots,

    /// The pool will panic if any slot is still acquired when it is dropped.
    ///
    /// This may be valuable if raw slots are handed to unsafe code and the owner wants to be told
    /// about slots that were leaked instead of having their memory silently reclaimed.
    MustNotHaveOutstandingSlots,
}
