//! Roots subsystem, client-side (component H).
//!
//! A client's root set is shared across every server it has connected to:
//! adding or removing a root fans `notifications/roots/list_changed` out to
//! all of them, but only when membership actually changed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::core::capability::CapabilityRegistry;
use crate::core::peer::{BoxFuture, HandlerError, Peer};
use crate::protocol::methods as m;
use crate::protocol::roots_types::{ListRootsResult, Root};

pub struct RootsModule {
    roots: Mutex<HashSet<Root>>,
    peers: Mutex<Vec<Arc<Peer>>>,
}

impl RootsModule {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            roots: Mutex::new(HashSet::new()),
            peers: Mutex::new(Vec::new()),
        })
    }

    /// Attaches to a server connection: registers the `roots/list` handler
    /// on it and adds it to the fan-out list for future membership changes.
    pub fn install(self: &Arc<Self>, peer: &Arc<Peer>, registry: &mut CapabilityRegistry) {
        registry.enable_roots(true);
        self.peers.lock().unwrap().push(peer.clone());

        let this = self.clone();
        peer.register_request_handler(m::ROOTS_LIST, Arc::new(move |params| this.clone().handle_list(params)));
    }

    /// Adds `root` to the set. Returns whether the set actually changed —
    /// re-adding an existing root (by uri) is a no-op and fans out nothing.
    pub fn add_root(&self, root: Root) -> bool {
        let changed = self.roots.lock().unwrap().insert(root);
        if changed {
            self.notify_list_changed();
        }
        changed
    }

    pub fn remove_root(&self, uri: &str) -> bool {
        let changed = self.roots.lock().unwrap().remove(&Root::new(uri));
        if changed {
            self.notify_list_changed();
        }
        changed
    }

    pub fn roots(&self) -> Vec<Root> {
        self.roots.lock().unwrap().iter().cloned().collect()
    }

    fn notify_list_changed(&self) {
        for peer in self.peers.lock().unwrap().iter() {
            let _ = peer.send_notification(m::ROOTS_LIST_CHANGED, None);
        }
    }

    fn handle_list(self: Arc<Self>, _params: serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, HandlerError>> {
        Box::pin(async move {
            let result = ListRootsResult { roots: self.roots() };
            serde_json::to_value(result).map_err(|e| HandlerError::new(crate::protocol::types::error_codes::INTERNAL_ERROR, e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_adding_an_existing_root_is_a_no_op() {
        let module = RootsModule::new();
        assert!(module.add_root(Root::new("file:///a")));
        assert!(!module.add_root(Root::with_name("file:///a", "renamed")));
        assert_eq!(module.roots().len(), 1);
    }

    #[test]
    fn removing_an_absent_root_reports_no_change() {
        let module = RootsModule::new();
        assert!(!module.remove_root("file:///missing"));
    }

    #[tokio::test]
    async fn membership_change_fans_out_to_every_attached_peer() {
        let (peer_a, mut outbound_a) = Peer::new();
        let (peer_b, mut outbound_b) = Peer::new();
        let module = RootsModule::new();
        let mut registry_a = CapabilityRegistry::new();
        let mut registry_b = CapabilityRegistry::new();
        module.install(&peer_a, &mut registry_a);
        module.install(&peer_b, &mut registry_b);

        module.add_root(Root::new("file:///a"));

        let a = tokio::time::timeout(std::time::Duration::from_millis(50), outbound_a.recv()).await;
        let b = tokio::time::timeout(std::time::Duration::from_millis(50), outbound_b.recv()).await;
        assert!(a.is_ok() && a.unwrap().is_some());
        assert!(b.is_ok() && b.unwrap().is_some());
    }
}
