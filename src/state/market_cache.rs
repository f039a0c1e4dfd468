use crate::state::market::TrackedAsset;
use std::collections::HashMap;

/// Identifies one in-flight add fetch. A completion is only applied while
/// its ticket is still the pending one for that asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchTicket(pub u64);

/// Tracked assets, their pending add fetches and the streamed price overlay.
#[derive(Clone, Debug, Default)]
pub struct MarketCache {
    tracked: HashMap<String, TrackedAsset>,
    // Insertion order of tracked ids, for stable card ordering.
    order: Vec<String>,
    pending: HashMap<String, FetchTicket>,
    // Ticket of the add that inserted each tracked asset.
    generations: HashMap<String, FetchTicket>,
    overlay: HashMap<String, f64>,
    next_ticket: u64,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.tracked.contains_key(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Issues a ticket unless `id` is already tracked or being fetched.
    pub fn begin_fetch(&mut self, id: &str) -> Option<FetchTicket> {
        if self.is_tracked(id) || self.is_pending(id) {
            return None;
        }
        self.next_ticket += 1;
        let ticket = FetchTicket(self.next_ticket);
        self.pending.insert(id.to_string(), ticket);
        Some(ticket)
    }

    /// Clears the pending ticket for `id` if it matches. Returns whether the
    /// completion is still wanted.
    pub fn settle_fetch(&mut self, id: &str, ticket: FetchTicket) -> bool {
        match self.pending.get(id) {
            Some(current) if *current == ticket => {
                self.pending.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Inserts or wholesale replaces the snapshot for an asset, recording the
    /// add that produced it.
    pub fn upsert(&mut self, asset: TrackedAsset, ticket: FetchTicket) {
        if !self.tracked.contains_key(&asset.id) {
            self.order.push(asset.id.clone());
        }
        self.generations.insert(asset.id.clone(), ticket);
        self.tracked.insert(asset.id.clone(), asset);
    }

    /// Replaces the snapshot only if the asset is still tracked under the
    /// same add. A refresh requested before a remove and re-add never
    /// overwrites the newer snapshot.
    pub fn replace_if_tracked(&mut self, asset: TrackedAsset, ticket: FetchTicket) -> bool {
        if self.generations.get(&asset.id) != Some(&ticket) {
            return false;
        }
        match self.tracked.get_mut(&asset.id) {
            Some(slot) => {
                *slot = asset;
                true
            }
            None => false,
        }
    }

    /// Drops the asset and any in-flight add for it. Returns whether
    /// anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let was_pending = self.pending.remove(id).is_some();
        let was_tracked = self.tracked.remove(id).is_some();
        self.generations.remove(id);
        if was_tracked {
            self.order.retain(|tracked| tracked != id);
        }
        was_tracked || was_pending
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&TrackedAsset> {
        self.tracked.get(id)
    }

    /// Tracked assets in the order they were added.
    pub fn assets(&self) -> impl Iterator<Item = &TrackedAsset> {
        self.order.iter().filter_map(|id| self.tracked.get(id))
    }

    /// Tracked ids in insertion order, each with the add it belongs to.
    pub fn generations(&self) -> Vec<(String, FetchTicket)> {
        self.order
            .iter()
            .filter_map(|id| self.generations.get(id).map(|ticket| (id.clone(), *ticket)))
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Last write wins per key.
    pub fn overlay_price(&mut self, id: &str, price: f64) {
        self.overlay.insert(id.to_string(), price);
    }

    pub fn overlay(&self, id: &str) -> Option<f64> {
        self.overlay.get(id).copied()
    }

    /// Overlay price first, then the REST price, else `None`.
    pub fn display_price(&self, id: &str) -> Option<f64> {
        self.overlay(id)
            .or_else(|| self.tracked.get(id).map(|a| a.last_price))
    }
}
