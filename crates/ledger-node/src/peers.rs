use ledger_core::PeerAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Addresses a node believes make up the network.
///
/// Inbound snapshots replace the whole set (last writer wins), so a stale
/// snapshot can drop peers that are still alive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerSet(BTreeSet<PeerAddress>);

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: PeerAddress) -> bool {
        self.0.insert(addr)
    }

    pub fn contains(&self, addr: &PeerAddress) -> bool {
        self.0.contains(addr)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn replace(&mut self, other: PeerSet) {
        self.0 = other.0;
    }

    /// Every peer except the given ones, in address order.
    pub fn without(&self, excluded: &[&PeerAddress]) -> Vec<PeerAddress> {
        self.0
            .iter()
            .filter(|p| !excluded.contains(p))
            .cloned()
            .collect()
    }
}

impl FromIterator<PeerAddress> for PeerSet {
    fn from_iter<I: IntoIterator<Item = PeerAddress>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> PeerAddress {
        PeerAddress::new("127.0.0.1", port)
    }

    #[test]
    fn replace_discards_previous_members() {
        let mut set: PeerSet = [peer(1), peer(2)].into_iter().collect();
        set.replace([peer(3)].into_iter().collect());
        assert_eq!(set.len(), 1);
        assert!(set.contains(&peer(3)));
        assert!(!set.contains(&peer(1)));
    }

    #[test]
    fn without_filters_and_orders() {
        let set: PeerSet = [peer(3), peer(1), peer(2)].into_iter().collect();
        assert_eq!(set.without(&[&peer(2)]), vec![peer(1), peer(3)]);
        assert!(set.without(&[&peer(1), &peer(2), &peer(3)]).is_empty());
    }

    #[test]
    fn serializes_as_plain_list() {
        let set: PeerSet = [peer(1)].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"[{"host":"127.0.0.1","port":1}]"#);
    }
}
