//! The session-wide identifier space (§3 DATA MODEL).
//!
//! Every participant — hubs, UIs, modules — draws its ID from one of a
//! few disjoint ranges. A handful of sentinels outside those ranges name
//! broadcast and "don't care" destinations for the router.
//!
//! Layout, low to high: generic sentinels (-5..=-1), hub IDs
//! (..=HUB_BASE, descending as hubs join), invalid (0), module IDs
//! (MODULE_BASE.. , ascending as modules spawn).

/// A participant ID.
pub type Id = i32;

/// First ID handed out to a spawned module.
pub const MODULE_BASE: Id = 1;

/// Invalid / not-yet-assigned ID.
pub const INVALID: Id = 0;

/// Addressed to every hub and every module.
pub const BROADCAST: Id = -1;

/// Addressed to every module, but not to hubs.
pub const BROADCAST_MODULE: Id = -2;

/// Marks a message that must be relayed through the master hub before
/// broadcasting further (a slave hub cannot broadcast directly to its
/// siblings).
pub const FOR_BROADCAST: Id = -3;

/// Addressed to "whichever cluster manager owns this message's sender",
/// used by a hub that does not yet know the destination module's hub.
pub const LOCAL_MANAGER: Id = -4;

/// Not a module/hub ID: resolves to "this process" for routing decisions
/// taken without consulting the state tracker.
pub const LOCAL_HUB: Id = -5;

/// First ID a hub can hold. The master hub always takes this one; slave
/// hubs are assigned `HUB_BASE - 1`, `HUB_BASE - 2`, ... as they join.
pub const HUB_BASE: Id = -100;

/// The master hub's fixed ID.
pub const MASTER_HUB_ID: Id = HUB_BASE;

/// True if `id` names a module (as opposed to a hub or a sentinel).
pub fn is_module(id: Id) -> bool {
    id >= MODULE_BASE
}

/// True if `id` names a hub.
pub fn is_hub(id: Id) -> bool {
    id <= HUB_BASE
}

/// True if `id` is one of the broadcast/sentinel values.
pub fn is_sentinel(id: Id) -> bool {
    matches!(
        id,
        INVALID | BROADCAST | BROADCAST_MODULE | FOR_BROADCAST | LOCAL_MANAGER | LOCAL_HUB
    )
}

/// Hands out hub IDs to slaves as they join: the master keeps [`MASTER_HUB_ID`],
/// each successive slave gets the next ID below the previous one.
#[derive(Debug, Default)]
pub struct HubIdAllocator {
    next: Id,
}

impl HubIdAllocator {
    pub fn new() -> Self {
        Self { next: HUB_BASE - 1 }
    }

    pub fn allocate(&mut self) -> Id {
        let id = self.next;
        self.next -= 1;
        id
    }
}

/// Hands out module IDs from a monotone counter, owned solely by the
/// master hub (§4.3: "master allocates module IDs from a monotone
/// counter; slaves request them by sending `Spawn` with invalid ID").
#[derive(Debug)]
pub struct ModuleIdAllocator {
    next: Id,
}

impl Default for ModuleIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleIdAllocator {
    pub fn new() -> Self {
        Self { next: MODULE_BASE }
    }

    pub fn allocate(&mut self) -> Id {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_and_hub_ranges_are_disjoint() {
        assert!(is_module(MODULE_BASE));
        assert!(is_module(MODULE_BASE + 100));
        assert!(!is_hub(MODULE_BASE));
        assert!(is_hub(MASTER_HUB_ID));
        assert!(!is_module(MASTER_HUB_ID));
        for s in [INVALID, BROADCAST, BROADCAST_MODULE, FOR_BROADCAST, LOCAL_MANAGER, LOCAL_HUB] {
            assert!(!is_hub(s));
            assert!(!is_module(s));
        }
    }

    #[test]
    fn sentinels_are_neither_module_nor_hub() {
        for s in [INVALID, BROADCAST, BROADCAST_MODULE, FOR_BROADCAST, LOCAL_MANAGER, LOCAL_HUB] {
            assert!(is_sentinel(s));
        }
    }

    #[test]
    fn module_ids_are_assigned_monotonically() {
        let mut alloc = ModuleIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_eq!(a, MODULE_BASE);
        assert_eq!(b, MODULE_BASE + 1);
    }

    #[test]
    fn hub_ids_descend_from_the_master() {
        let mut alloc = HubIdAllocator::new();
        let first = alloc.allocate();
        let second = alloc.allocate();
        assert_eq!(first, HUB_BASE - 1);
        assert_eq!(second, HUB_BASE - 2);
        assert_ne!(first, MASTER_HUB_ID);
    }
}
