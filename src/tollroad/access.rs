//! Owner gate and pause switch

use crate::tollroad::errors::{TollRoadError, TollRoadResult};
use crate::tollroad::events::TollRoadEvent;
use crate::tollroad::types::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGuard {
    owner: Address,
    paused: bool,
}

impl AccessGuard {
    pub fn new(owner: Address, paused: bool) -> TollRoadResult<Self> {
        if owner.is_zero() {
            return Err(TollRoadError::invalid("owner cannot be the zero address"));
        }
        Ok(Self { owner, paused })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn require_owner(&self, caller: Address) -> TollRoadResult<()> {
        if caller != self.owner {
            return Err(TollRoadError::unauthorized(caller));
        }
        Ok(())
    }

    pub fn require_not_paused(&self) -> TollRoadResult<()> {
        if self.paused {
            return Err(TollRoadError::Paused);
        }
        Ok(())
    }

    pub fn set_paused(&mut self, caller: Address, paused: bool) -> TollRoadResult<TollRoadEvent> {
        self.require_owner(caller)?;
        if paused == self.paused {
            return Err(TollRoadError::NoOpTransition(
                if paused { "paused" } else { "unpaused" }.to_string(),
            ));
        }

        self.paused = paused;
        Ok(TollRoadEvent::PausedSet {
            sender: caller,
            paused,
        })
    }

    pub fn set_owner(&mut self, caller: Address, new_owner: Address) -> TollRoadResult<TollRoadEvent> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(TollRoadError::invalid("owner cannot be the zero address"));
        }
        if new_owner == self.owner {
            return Err(TollRoadError::invalid("new owner equals current owner"));
        }

        let previous_owner = self.owner;
        self.owner = new_owner;
        Ok(TollRoadEvent::OwnerSet {
            previous_owner,
            new_owner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::repeat_byte(1)
    }

    fn stranger() -> Address {
        Address::repeat_byte(2)
    }

    #[test]
    fn test_initial_pause_state() {
        assert!(AccessGuard::new(owner(), true).unwrap().is_paused());
        assert!(!AccessGuard::new(owner(), false).unwrap().is_paused());
    }

    #[test]
    fn test_owner_can_pause_and_event_carries_sender() {
        let mut guard = AccessGuard::new(owner(), false).unwrap();
        let event = guard.set_paused(owner(), true).unwrap();
        assert!(guard.is_paused());
        assert_eq!(
            event,
            TollRoadEvent::PausedSet {
                sender: owner(),
                paused: true
            }
        );

        let event = guard.set_paused(owner(), false).unwrap();
        assert!(!guard.is_paused());
        assert!(matches!(event, TollRoadEvent::PausedSet { paused: false, .. }));
    }

    #[test]
    fn test_non_owner_cannot_pause() {
        let mut guard = AccessGuard::new(owner(), false).unwrap();
        assert!(matches!(
            guard.set_paused(stranger(), true),
            Err(TollRoadError::Unauthorized { .. })
        ));
        assert!(!guard.is_paused());
    }

    #[test]
    fn test_repeated_pause_is_rejected() {
        let mut guard = AccessGuard::new(owner(), false).unwrap();
        guard.set_paused(owner(), true).unwrap();
        assert!(matches!(
            guard.set_paused(owner(), true),
            Err(TollRoadError::NoOpTransition(_))
        ));
    }

    #[test]
    fn test_require_not_paused() {
        let mut guard = AccessGuard::new(owner(), true).unwrap();
        assert!(matches!(guard.require_not_paused(), Err(TollRoadError::Paused)));
        guard.set_paused(owner(), false).unwrap();
        assert!(guard.require_not_paused().is_ok());
    }

    #[test]
    fn test_ownership_transfer() {
        let mut guard = AccessGuard::new(owner(), false).unwrap();
        assert!(guard.set_owner(owner(), Address::ZERO).is_err());
        assert!(guard.set_owner(owner(), owner()).is_err());
        assert!(guard.set_owner(stranger(), stranger()).is_err());

        guard.set_owner(owner(), stranger()).unwrap();
        assert_eq!(guard.owner(), stranger());
        assert!(guard.require_owner(owner()).is_err());
    }

    #[test]
    fn test_zero_owner_rejected() {
        assert!(AccessGuard::new(Address::ZERO, false).is_err());
    }
}
