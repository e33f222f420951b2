//! The static routing table and its six boolean queries (§4.2).
//!
//! `rt[type] = flags` is a process-wide constant, computed once from
//! [`MessageType::route_flags`] and never mutated afterward (§5:
//! "routing table `rt[]` is a process-wide constant initialised at
//! startup and never mutated").

use super::types::{MessageType, RouteFlags};

/// Which kind of endpoint is asking the router a question. The same
/// flag set answers differently depending on whether the asker sits at
/// a hub, a cluster manager, or a UI client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Hub { is_master: bool },
    Manager { is_master: bool },
    Ui,
    Module,
}

/// The static routing table, built once at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    fn flags(&self, ty: MessageType) -> RouteFlags {
        ty.route_flags()
    }

    /// Forward to attached UI clients.
    pub fn to_ui(&self, ty: MessageType) -> bool {
        self.flags(ty).contains(RouteFlags::DEST_UI)
            || self.flags(ty).contains(RouteFlags::BROADCAST)
    }

    /// Forward upward/peer to another hub.
    pub fn to_hub(&self, ty: MessageType, at: EndpointKind) -> bool {
        let flags = self.flags(ty);
        if flags.contains(RouteFlags::DEST_HUB) {
            return true;
        }
        if flags.contains(RouteFlags::BROADCAST) {
            return matches!(at, EndpointKind::Hub { .. });
        }
        if flags.contains(RouteFlags::DEST_MASTER_HUB) {
            return matches!(at, EndpointKind::Hub { is_master: false });
        }
        if flags.contains(RouteFlags::DEST_SLAVE_HUB) {
            return matches!(at, EndpointKind::Hub { is_master: true });
        }
        false
    }

    /// Forward downward to the local cluster manager.
    pub fn to_manager(&self, ty: MessageType, at: EndpointKind) -> bool {
        let flags = self.flags(ty);
        if flags.contains(RouteFlags::DEST_MANAGER) {
            return true;
        }
        if flags.contains(RouteFlags::DEST_MASTER_MANAGER) {
            return matches!(at, EndpointKind::Manager { is_master: true });
        }
        if flags.contains(RouteFlags::DEST_SLAVE_MANAGER) {
            return matches!(at, EndpointKind::Manager { is_master: false });
        }
        matches!(at, EndpointKind::Hub { .. })
            && (flags.contains(RouteFlags::BROADCAST) || flags.contains(RouteFlags::BROADCAST_MODULE))
    }

    /// Forward further down to a specific module.
    pub fn to_module(&self, ty: MessageType) -> bool {
        let flags = self.flags(ty);
        flags.contains(RouteFlags::DEST_MODULE) || flags.contains(RouteFlags::BROADCAST_MODULE)
    }

    /// Feed to the state tracker for replay.
    pub fn to_tracker(&self, ty: MessageType) -> bool {
        self.flags(ty).contains(RouteFlags::TRACK)
    }

    /// Consume locally and dispatch to the type-specific handler.
    pub fn to_handler(&self, ty: MessageType) -> bool {
        self.flags(ty).contains(RouteFlags::HANDLE)
    }

    /// A message destined for a sibling slave hub must first go through
    /// the master (§4.2 `ThroughMaster`).
    pub fn through_master(&self, ty: MessageType) -> bool {
        self.flags(ty).contains(RouteFlags::THROUGH_MASTER)
    }

    pub fn requires_subscription(&self, ty: MessageType) -> bool {
        self.flags(ty).contains(RouteFlags::REQUIRES_SUBSCRIPTION)
    }

    pub fn queue_if_unhandled(&self, ty: MessageType) -> bool {
        self.flags(ty).contains(RouteFlags::QUEUE_IF_UNHANDLED)
    }

    pub fn triggers_queue(&self, ty: MessageType) -> bool {
        self.flags(ty).contains(RouteFlags::TRIGGER_QUEUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_reaches_ui_hub_and_manager_everywhere() {
        let rt = Router::new();
        assert!(rt.to_ui(MessageType::Quit));
        assert!(rt.to_hub(MessageType::Quit, EndpointKind::Hub { is_master: false }));
        assert!(rt.to_manager(MessageType::Quit, EndpointKind::Hub { is_master: true }));
    }

    #[test]
    fn spawn_goes_only_to_the_destination_hub() {
        let rt = Router::new();
        assert!(!rt.to_ui(MessageType::Spawn));
        assert!(rt.to_hub(MessageType::Spawn, EndpointKind::Hub { is_master: false }));
    }

    #[test]
    fn file_query_requires_relay_through_the_master() {
        let rt = Router::new();
        assert!(rt.through_master(MessageType::FileQuery));
        assert!(!rt.through_master(MessageType::Quit));
    }

    #[test]
    fn execute_targets_modules_not_ui() {
        let rt = Router::new();
        assert!(rt.to_module(MessageType::Execute));
        assert!(!rt.to_ui(MessageType::Execute));
    }

    #[test]
    fn kill_broadcasts_to_every_module() {
        let rt = Router::new();
        assert!(rt.to_module(MessageType::Kill));
    }
}
