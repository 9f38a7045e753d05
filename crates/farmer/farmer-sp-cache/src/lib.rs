//! The bounded, time-evicted cache of in-flight signage points, the proofs
//! received against them, and the quality-string index used to route a
//! signature request back to the harvester/plot that produced a given proof.
//!
//! Entries are keyed by `sp_hash` since several signage points across
//! different sub-slots can legally share one challenge-chain hash; every
//! operation here is called from the single dispatcher task (spec.md §5), so
//! nothing in this crate takes a lock.

use farmer_protocol::SignagePoint;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The tuple needed to route a signature request back to the harvester/plot
/// that produced a proof of a given quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityIndexEntry {
    pub harvester_plot_identifier: String,
    pub sp_hash: [u8; 32],
    pub challenge_hash: [u8; 32],
    pub peer_id: String,
}

/// A proof recorded against one `sp_hash`, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRecord {
    pub quality: [u8; 32],
    pub harvester_plot_identifier: String,
    pub peer_id: String,
}

struct SpEntry {
    inserted_at: Instant,
    signage_points: Vec<SignagePoint>,
    proofs: Vec<ProofRecord>,
}

/// Keyed by `sp_hash`. See module docs.
pub struct SignagePointCache {
    entries: HashMap<[u8; 32], SpEntry>,
    quality_index: HashMap<[u8; 32], QualityIndexEntry>,
    max_age: Duration,
}

impl SignagePointCache {
    /// `max_age` is `3 * SUB_SLOT_TIME_TARGET`, per spec.md §3/§4.2.
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            quality_index: HashMap::new(),
            max_age,
        }
    }

    /// Records the signage point's arrival at `now`, appending to any earlier
    /// signage points already sharing this `sp_hash`.
    pub fn insert_sp(&mut self, sp: SignagePoint, now: Instant) {
        self.entries
            .entry(sp.sp_hash)
            .or_insert_with(|| SpEntry {
                inserted_at: now,
                signage_points: Vec::new(),
                proofs: Vec::new(),
            })
            .signage_points
            .push(sp);
    }

    /// Records a verified proof against `sp_hash`. The quality index admits
    /// only the first proof of a given quality (spec.md §5 ordering rule);
    /// later duplicates are still recorded in the proof list but not indexed.
    pub fn insert_proof(
        &mut self,
        sp_hash: [u8; 32],
        harvester_plot_identifier: String,
        peer_id: String,
        challenge_hash: [u8; 32],
        quality: [u8; 32],
        now: Instant,
    ) {
        let entry = self.entries.entry(sp_hash).or_insert_with(|| SpEntry {
            inserted_at: now,
            signage_points: Vec::new(),
            proofs: Vec::new(),
        });
        entry.proofs.push(ProofRecord {
            quality,
            harvester_plot_identifier: harvester_plot_identifier.clone(),
            peer_id: peer_id.clone(),
        });

        self.quality_index.entry(quality).or_insert(QualityIndexEntry {
            harvester_plot_identifier,
            sp_hash,
            challenge_hash,
            peer_id,
        });
    }

    #[must_use]
    pub fn lookup_by_quality(&self, quality: &[u8; 32]) -> Option<&QualityIndexEntry> {
        self.quality_index.get(quality)
    }

    #[must_use]
    pub fn response_count(&self, sp_hash: &[u8; 32]) -> usize {
        self.entries
            .get(sp_hash)
            .map_or(0, |entry| entry.proofs.len())
    }

    /// Removes every `sp_hash` entry (and its proofs and quality index
    /// entries) whose insertion time is older than `max_age` relative to
    /// `now`. Returns the number of `sp_hash` buckets evicted.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let max_age = self.max_age;
        let expired: Vec<[u8; 32]> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.inserted_at) > max_age)
            .map(|(sp_hash, _)| *sp_hash)
            .collect();

        for sp_hash in &expired {
            if let Some(entry) = self.entries.remove(sp_hash) {
                for proof in &entry.proofs {
                    self.quality_index.remove(&proof.quality);
                }
            }
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "evicted expired signage points");
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(sp_hash: [u8; 32]) -> SignagePoint {
        SignagePoint {
            challenge_hash: [0u8; 32],
            sp_hash,
            rc_hash: [0u8; 32],
            sub_slot_iters: 0,
            difficulty: 0,
            signage_point_index: 0,
            peak_height: 0,
            last_tx_height: 0,
        }
    }

    #[test]
    fn insert_and_lookup_by_quality() {
        let mut cache = SignagePointCache::new(Duration::from_secs(1800));
        let now = Instant::now();
        let sp_hash = [1u8; 32];
        cache.insert_sp(sp(sp_hash), now);
        cache.insert_proof(
            sp_hash,
            "plot-a".to_string(),
            "peer-1".to_string(),
            [2u8; 32],
            [3u8; 32],
            now,
        );

        assert_eq!(cache.response_count(&sp_hash), 1);
        let found = cache.lookup_by_quality(&[3u8; 32]).unwrap();
        assert_eq!(found.harvester_plot_identifier, "plot-a");
        assert_eq!(found.sp_hash, sp_hash);
    }

    #[test]
    fn duplicate_quality_within_one_sp_keeps_first_index_entry() {
        let mut cache = SignagePointCache::new(Duration::from_secs(1800));
        let now = Instant::now();
        let sp_hash = [1u8; 32];
        cache.insert_sp(sp(sp_hash), now);
        cache.insert_proof(sp_hash, "plot-a".into(), "peer-1".into(), [0u8; 32], [9u8; 32], now);
        cache.insert_proof(sp_hash, "plot-b".into(), "peer-2".into(), [0u8; 32], [9u8; 32], now);

        assert_eq!(cache.response_count(&sp_hash), 2);
        assert_eq!(
            cache.lookup_by_quality(&[9u8; 32]).unwrap().harvester_plot_identifier,
            "plot-a"
        );
    }

    #[test]
    fn stale_entries_are_evicted_together() {
        let mut cache = SignagePointCache::new(Duration::from_secs(1800));
        let t0 = Instant::now();
        let sp_hash = [5u8; 32];
        cache.insert_sp(sp(sp_hash), t0);
        cache.insert_proof(sp_hash, "plot-a".into(), "peer-1".into(), [0u8; 32], [7u8; 32], t0);

        let later = t0 + Duration::from_secs(1801);
        let evicted = cache.evict_expired(later);

        assert_eq!(evicted, 1);
        assert_eq!(cache.response_count(&sp_hash), 0);
        assert!(cache.lookup_by_quality(&[7u8; 32]).is_none());
    }

    #[test]
    fn fresh_entries_survive_a_sweep() {
        let mut cache = SignagePointCache::new(Duration::from_secs(1800));
        let t0 = Instant::now();
        let sp_hash = [6u8; 32];
        cache.insert_sp(sp(sp_hash), t0);

        let soon = t0 + Duration::from_secs(10);
        assert_eq!(cache.evict_expired(soon), 0);
        assert_eq!(cache.response_count(&sp_hash), 0);
    }
}
