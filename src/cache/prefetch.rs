use super::{BlockId, RequestStatus};
use crate::address;
use serde::{Deserialize, Serialize};

/// When to prefetch the next sequential block.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Prefetch {
    #[default]
    DISABLED,
    /// Prefetch after a demand miss.
    ON_MISS,
    /// Prefetch after every demand access.
    ALWAYS,
}

impl Prefetch {
    #[inline]
    #[must_use]
    pub fn triggers(self, status: RequestStatus) -> bool {
        match self {
            Self::DISABLED => false,
            Self::ON_MISS => status == RequestStatus::MISS,
            Self::ALWAYS => true,
        }
    }
}

/// Next-line prefetcher with a re-entrancy guard.
///
/// Accesses issued while the guard is armed are prefetches and never
/// trigger further prefetches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Controller {
    policy: Prefetch,
    in_prefetch: bool,
    /// Block of the demand access that triggered the prefetch.
    demand: Option<BlockId>,
}

impl Controller {
    #[must_use]
    pub fn new(policy: Prefetch) -> Self {
        Self {
            policy,
            in_prefetch: false,
            demand: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> Prefetch {
        self.policy
    }

    #[inline]
    #[must_use]
    pub fn in_prefetch(&self) -> bool {
        self.in_prefetch
    }

    /// Arms the guard and returns the block to prefetch after a demand
    /// access to `block_addr`.
    ///
    /// Returns `None` if the policy does not trigger, a prefetch is already
    /// in flight, or the next block would wrap around the address space.
    #[must_use]
    pub fn begin(
        &mut self,
        status: RequestStatus,
        block_addr: address,
        block_size: u32,
        demand: BlockId,
    ) -> Option<address> {
        if self.in_prefetch || !self.policy.triggers(status) {
            return None;
        }
        let target = block_addr.checked_add(address::from(block_size))?;
        self.in_prefetch = true;
        self.demand = Some(demand);
        Some(target)
    }

    /// Disarms the guard.
    #[inline]
    pub fn end(&mut self) {
        debug_assert!(self.in_prefetch);
        self.in_prefetch = false;
        self.demand = None;
    }

    /// The block a prefetch in flight must not replace.
    #[inline]
    #[must_use]
    pub fn demand_block(&self) -> Option<BlockId> {
        self.demand
    }
}

#[cfg(test)]
mod tests {
    use super::{Controller, Prefetch};
    use crate::cache::RequestStatus;

    #[test]
    fn test_triggers() {
        assert!(!Prefetch::DISABLED.triggers(RequestStatus::MISS));
        assert!(Prefetch::ON_MISS.triggers(RequestStatus::MISS));
        assert!(!Prefetch::ON_MISS.triggers(RequestStatus::HIT));
        assert!(Prefetch::ALWAYS.triggers(RequestStatus::HIT));
    }

    #[test]
    fn test_guard_blocks_nested_prefetch() {
        let mut controller = Controller::new(Prefetch::ALWAYS);
        assert_eq!(controller.begin(RequestStatus::MISS, 0x100, 64, 3), Some(0x140));
        assert!(controller.in_prefetch());
        assert_eq!(controller.demand_block(), Some(3));
        assert_eq!(controller.begin(RequestStatus::MISS, 0x140, 64, 5), None);
        assert_eq!(controller.demand_block(), Some(3));
        controller.end();
        assert!(!controller.in_prefetch());
        assert_eq!(controller.demand_block(), None);
        assert_eq!(controller.begin(RequestStatus::HIT, 0x140, 64, 5), Some(0x180));
    }

    #[test]
    fn test_last_block_does_not_wrap() {
        let mut controller = Controller::new(Prefetch::ON_MISS);
        assert_eq!(controller.begin(RequestStatus::MISS, u64::MAX - 63, 64, 0), None);
        assert!(!controller.in_prefetch());
        assert_eq!(controller.demand_block(), None);
    }
}
