//! Launch slot - Single-flight guard for the launch operation

use thiserror::Error;

use super::instance::InstanceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("launch slot is occupied by instance {active}")]
    Occupied { active: InstanceId },
}

/// Proof of one acquisition of the slot.
///
/// Each acquisition gets a fresh ticket, so a relaunch of the same instance
/// cannot be released by the call that belonged to the earlier launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchTicket(u64);

/// Records which instance (if any) currently owns the launch operation
#[derive(Debug, Clone, Default)]
pub struct LaunchSlot {
    active: Option<(InstanceId, LaunchTicket)>,
    generation: u64,
}

impl LaunchSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupy the slot. A second acquisition is refused, never queued.
    pub fn try_acquire(&mut self, id: &InstanceId) -> Result<LaunchTicket, SlotError> {
        if let Some((active, _)) = &self.active {
            return Err(SlotError::Occupied {
                active: active.clone(),
            });
        }
        self.generation += 1;
        let ticket = LaunchTicket(self.generation);
        self.active = Some((id.clone(), ticket));
        Ok(ticket)
    }

    /// Empty the slot, returning the previous holder
    pub fn release(&mut self) -> Option<InstanceId> {
        self.active.take().map(|(id, _)| id)
    }

    /// Empty the slot only if it is still held under `ticket`
    pub fn release_if(&mut self, ticket: LaunchTicket) -> bool {
        if self.holds(ticket) {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Whether the slot is still held under `ticket`
    pub fn holds(&self, ticket: LaunchTicket) -> bool {
        matches!(&self.active, Some((_, held)) if *held == ticket)
    }

    pub fn active(&self) -> Option<&InstanceId> {
        self.active.as_ref().map(|(id, _)| id)
    }

    pub fn is_occupied(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let mut slot = LaunchSlot::new();
        slot.try_acquire(&"abc".into()).unwrap();
        assert_eq!(slot.active(), Some(&InstanceId::from("abc")));

        assert_eq!(slot.release(), Some(InstanceId::from("abc")));
        assert!(!slot.is_occupied());
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let mut slot = LaunchSlot::new();
        slot.try_acquire(&"abc".into()).unwrap();

        let err = slot.try_acquire(&"def".into()).unwrap_err();
        assert_eq!(
            err,
            SlotError::Occupied {
                active: "abc".into()
            }
        );
        assert_eq!(slot.active(), Some(&InstanceId::from("abc")));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut slot = LaunchSlot::new();
        slot.try_acquire(&"abc".into()).unwrap();
        assert!(slot.release().is_some());
        assert!(slot.release().is_none());
    }

    #[test]
    fn test_release_if_ignores_other_holder() {
        let mut slot = LaunchSlot::new();
        let old = slot.try_acquire(&"old".into()).unwrap();
        slot.release();
        let new = slot.try_acquire(&"new".into()).unwrap();

        assert!(!slot.release_if(old));
        assert!(slot.is_occupied());
        assert!(slot.release_if(new));
        assert!(!slot.is_occupied());
    }

    #[test]
    fn test_relaunch_of_same_instance_gets_new_ticket() {
        let mut slot = LaunchSlot::new();
        let first = slot.try_acquire(&"abc".into()).unwrap();
        slot.release();
        let second = slot.try_acquire(&"abc".into()).unwrap();
        assert_ne!(first, second);

        assert!(!slot.holds(first));
        assert!(!slot.release_if(first));
        assert_eq!(slot.active(), Some(&InstanceId::from("abc")));
        assert!(slot.release_if(second));
    }
}
