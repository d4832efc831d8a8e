//! The shared-reference table (§4.2): identity-keyed bookkeeping that lets
//! the encoder deduplicate (and the decoder reconstruct) graphs where the
//! same value occurs more than once, including cycles.

use crate::value::Ref;
use std::collections::HashSet;
use std::rc::Rc;

/// Encoder-side half: remembers which `Ref` identities have already been
/// assigned a tag-28 slot, and which identities are mid-encode (for cycle
/// detection when sharing is disabled).
#[derive(Default, Clone)]
pub struct EncodeSharedTable {
    /// identity (`Rc::as_ptr`) in definition order; the index in this
    /// vector *is* the tag-29 index a future reference will use.
    assigned: Vec<*const ()>,
    in_progress: HashSet<*const ()>,
}

pub enum ShareOutcome {
    /// this identity was already defined; emit tag 29 with this index
    AlreadyShared(u64),
    /// this identity is new; the caller should emit tag 28, encode the
    /// value, then call `finish`. The slot's index is reserved immediately
    /// so that a self-reference encountered *while* encoding this value's
    /// contents already resolves to it.
    FirstOccurrence,
    /// sharing is off and this identity isn't (yet) cyclic; encode
    /// normally, no tag
    Unshared,
}

impl EncodeSharedTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn identity(r: &Ref) -> *const () {
        Rc::as_ptr(r) as *const ()
    }

    /// Steps 1-4 of `encode_shared` (§4.2), up to (not including) dispatching
    /// the value's contents.
    pub fn begin(&mut self, r: &Ref, sharing_enabled: bool) -> Result<ShareOutcome, ()> {
        let id = Self::identity(r);
        if let Some(idx) = self.assigned.iter().position(|&x| x == id) {
            return Ok(ShareOutcome::AlreadyShared(idx as u64));
        }
        if !sharing_enabled {
            if self.in_progress.contains(&id) {
                return Err(()); // CyclicNoSharing
            }
            return Ok(ShareOutcome::Unshared);
        }
        self.assigned.push(id);
        self.in_progress.insert(id);
        Ok(ShareOutcome::FirstOccurrence)
    }

    /// Clear the in-progress flag once a first-occurrence value has finished
    /// encoding (step 4's "remove from the in-progress set on return").
    pub fn finish(&mut self, r: &Ref) {
        self.in_progress.remove(&Self::identity(r));
    }

    /// Track entry into a container without sharing, for cycle detection
    /// only (no slot assigned since nothing will ever reference it by
    /// index).
    pub fn enter_unshared(&mut self, r: &Ref) {
        self.in_progress.insert(Self::identity(r));
    }

    pub fn leave_unshared(&mut self, r: &Ref) {
        self.in_progress.remove(&Self::identity(r));
    }
}

/// Decoder-side half: slots are allocated in tag-28 order; `None` means
/// allocated but not yet finished (container forward-reference case).
#[derive(Default)]
pub struct DecodeSharedTable {
    slots: Vec<Option<Ref>>,
}

impl DecodeSharedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next slot, optionally pre-populating it so children can
    /// forward-reference it (containers only, per §4.5's tag-28 rule).
    pub fn reserve(&mut self, value: Option<Ref>) -> u64 {
        let idx = self.slots.len() as u64;
        self.slots.push(value);
        idx
    }

    pub fn finish(&mut self, idx: u64, value: Ref) {
        self.slots[idx as usize] = Some(value);
    }

    /// Resolve a tag-29 reference. `Ok(None)` distinguishes "slot exists but
    /// isn't finished yet" (`UninitialisedSharedRef`) from "no such slot"
    /// (`BadSharedRef`), which the caller maps to the two distinct decode
    /// errors.
    pub fn resolve(&self, idx: u64) -> Option<Option<Ref>> {
        self.slots.get(idx as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{new_ref, Value};

    #[test]
    fn same_identity_is_shared_on_second_sight() {
        let mut table = EncodeSharedTable::new();
        let r = new_ref(Value::Int(1));
        assert!(matches!(
            table.begin(&r, true).unwrap(),
            ShareOutcome::FirstOccurrence
        ));
        table.finish(&r);
        assert!(matches!(
            table.begin(&r, true).unwrap(),
            ShareOutcome::AlreadyShared(0)
        ));
    }

    #[test]
    fn self_reference_resolves_before_finish() {
        // mirrors `a = [a]`: the cyclic lookup happens *during* the first
        // occurrence's own contents, before `finish` is ever called.
        let mut table = EncodeSharedTable::new();
        let r = new_ref(Value::Null);
        assert!(matches!(
            table.begin(&r, true).unwrap(),
            ShareOutcome::FirstOccurrence
        ));
        assert!(matches!(
            table.begin(&r, true).unwrap(),
            ShareOutcome::AlreadyShared(0)
        ));
    }

    #[test]
    fn distinct_identities_with_equal_values_are_not_shared() {
        let mut table = EncodeSharedTable::new();
        let a = new_ref(Value::Int(1));
        let b = new_ref(Value::Int(1));
        table.begin(&a, true).unwrap();
        table.finish(&a);
        assert!(matches!(
            table.begin(&b, true).unwrap(),
            ShareOutcome::FirstOccurrence
        ));
    }

    #[test]
    fn cycle_without_sharing_is_rejected() {
        let mut table = EncodeSharedTable::new();
        let r = new_ref(Value::Int(1));
        table.enter_unshared(&r);
        assert!(table.begin(&r, false).is_err());
    }

    #[test]
    fn decode_slot_distinguishes_missing_from_uninitialised() {
        let mut table = DecodeSharedTable::new();
        let idx = table.reserve(None);
        assert_eq!(table.resolve(idx), Some(None));
        assert_eq!(table.resolve(idx + 1), None);
        table.finish(idx, new_ref(Value::Null));
        assert!(table.resolve(idx).unwrap().is_some());
    }
}
