//! The harvester session manager (spec.md §4.5): peer connect/disconnect
//! lifecycle, the deferred handshake guard, and plot-sync delta handling.
//!
//! Mutated only from the single task loop that owns it (spec.md §5), so no
//! internal locking -- the same design spec.md states for `pool_state` and
//! the signage-point cache.

use std::collections::HashMap;
use std::sync::Arc;

use farmer_protocol::HarvesterHandshake;
use tokio::sync::mpsc;

use crate::peer::{HarvesterPeer, HarvesterPeerError, PeerId};
use crate::plot_sync::PlotSyncEvent;

struct HarvesterSession {
    peer: Arc<dyn HarvesterPeer>,
    plot_sync_rx: mpsc::Receiver<PlotSyncEvent>,
    handshake_sent: bool,
}

/// Observes the two state changes spec.md §4.5 names; implemented by
/// whatever in `farmer-core` republishes these to RPC subscribers.
pub trait HarvesterObserver {
    fn harvester_update(&mut self, peer_id: PeerId);
    fn harvester_removed(&mut self, peer_id: PeerId);
}

/// Tracks every connected harvester by peer id.
pub struct HarvesterSessionManager {
    sessions: HashMap<PeerId, HarvesterSession>,
}

impl std::fmt::Debug for HarvesterSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarvesterSessionManager")
            .field("connected", &self.sessions.len())
            .finish()
    }
}

impl Default for HarvesterSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvesterSessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    /// On connect: remember the peer and its plot-sync receiver. The
    /// handshake itself is not sent here -- it is deferred until keys are
    /// ready (spec.md §4.6), driven by the per-peer handshake task in
    /// `farmer-core` calling [`Self::send_handshake_once`].
    pub fn on_connect(&mut self, peer: Arc<dyn HarvesterPeer>, plot_sync_rx: mpsc::Receiver<PlotSyncEvent>) {
        let peer_id = peer.peer_id();
        tracing::debug!(?peer_id, "harvester connected");
        self.sessions.insert(
            peer_id,
            HarvesterSession {
                peer,
                plot_sync_rx,
                handshake_sent: false,
            },
        );
    }

    /// On disconnect: drop the receiver and emit `harvester_removed`.
    pub fn on_disconnect(&mut self, peer_id: PeerId, observer: &mut impl HarvesterObserver) {
        if self.sessions.remove(&peer_id).is_some() {
            tracing::debug!(?peer_id, "harvester disconnected");
            observer.harvester_removed(peer_id);
        }
    }

    #[must_use]
    pub fn is_connected(&self, peer_id: PeerId) -> bool {
        self.sessions.contains_key(&peer_id)
    }

    #[must_use]
    pub fn peer(&self, peer_id: PeerId) -> Option<&Arc<dyn HarvesterPeer>> {
        self.sessions.get(&peer_id).map(|session| &session.peer)
    }

    #[must_use]
    pub fn connected_peer_ids(&self) -> Vec<PeerId> {
        self.sessions.keys().copied().collect()
    }

    /// Sends the handshake to `peer_id` exactly once; subsequent calls are a
    /// no-op. Returns `Ok(false)` if the peer is no longer connected --
    /// callers (the per-peer handshake task) treat that as "nothing to do".
    pub async fn send_handshake_once(
        &mut self,
        peer_id: PeerId,
        handshake: HarvesterHandshake,
    ) -> Result<bool, HarvesterPeerError> {
        let Some(session) = self.sessions.get_mut(&peer_id) else {
            return Ok(false);
        };
        if session.handshake_sent {
            return Ok(true);
        }
        session.peer.send_handshake(handshake).await?;
        session.handshake_sent = true;
        Ok(true)
    }

    /// Polls one plot-sync event for `peer_id`, if the peer is connected and
    /// has one pending. A non-empty delta or an initial-sync completion
    /// notifies the observer (spec.md §4.5's "causes a `harvester_update`
    /// state change").
    pub fn try_recv_plot_sync(&mut self, peer_id: PeerId, observer: &mut impl HarvesterObserver) {
        let Some(session) = self.sessions.get_mut(&peer_id) else {
            return;
        };
        while let Ok(event) = session.plot_sync_rx.try_recv() {
            let notify = match &event {
                PlotSyncEvent::Delta(delta) => !delta.is_empty(),
                PlotSyncEvent::InitialSyncComplete => true,
            };
            if notify {
                observer.harvester_update(peer_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{ChannelHarvesterPeer, HarvesterOutboundMessage};
    use crate::plot_sync::PlotSyncDelta;

    #[derive(Default)]
    struct RecordingObserver {
        updates: Vec<PeerId>,
        removals: Vec<PeerId>,
    }

    impl HarvesterObserver for RecordingObserver {
        fn harvester_update(&mut self, peer_id: PeerId) {
            self.updates.push(peer_id);
        }

        fn harvester_removed(&mut self, peer_id: PeerId) {
            self.removals.push(peer_id);
        }
    }

    fn sample_handshake() -> HarvesterHandshake {
        HarvesterHandshake {
            farmer_public_keys: vec![[1u8; 48]],
            pool_public_keys: vec![],
        }
    }

    #[tokio::test]
    async fn disconnect_emits_harvester_removed_only_once() {
        let mut manager = HarvesterSessionManager::new();
        let (tx, _rx_outbound) = mpsc::channel(1);
        let (_tx_plot, rx_plot) = mpsc::channel(1);
        let peer_id = PeerId([1u8; 32]);
        manager.on_connect(Arc::new(ChannelHarvesterPeer::new(peer_id, tx)), rx_plot);

        let mut observer = RecordingObserver::default();
        manager.on_disconnect(peer_id, &mut observer);
        manager.on_disconnect(peer_id, &mut observer);
        assert_eq!(observer.removals, vec![peer_id]);
        assert!(!manager.is_connected(peer_id));
    }

    #[tokio::test]
    async fn handshake_is_sent_exactly_once() {
        let mut manager = HarvesterSessionManager::new();
        let (tx, mut rx_outbound) = mpsc::channel(4);
        let (_tx_plot, rx_plot) = mpsc::channel(1);
        let peer_id = PeerId([2u8; 32]);
        manager.on_connect(Arc::new(ChannelHarvesterPeer::new(peer_id, tx)), rx_plot);

        assert!(manager
            .send_handshake_once(peer_id, sample_handshake())
            .await
            .unwrap());
        assert!(manager
            .send_handshake_once(peer_id, sample_handshake())
            .await
            .unwrap());

        let mut received = Vec::new();
        while let Ok(message) = rx_outbound.try_recv() {
            received.push(message);
        }
        assert_eq!(received, vec![HarvesterOutboundMessage::Handshake(sample_handshake())]);
    }

    #[tokio::test]
    async fn empty_delta_does_not_notify_but_nonempty_delta_does() {
        let mut manager = HarvesterSessionManager::new();
        let (tx, _rx_outbound) = mpsc::channel(1);
        let (tx_plot, rx_plot) = mpsc::channel(4);
        let peer_id = PeerId([3u8; 32]);
        manager.on_connect(Arc::new(ChannelHarvesterPeer::new(peer_id, tx)), rx_plot);

        tx_plot
            .send(PlotSyncEvent::Delta(PlotSyncDelta::default()))
            .await
            .unwrap();
        tx_plot
            .send(PlotSyncEvent::Delta(PlotSyncDelta {
                added: vec!["plot-1".to_string()],
                ..Default::default()
            }))
            .await
            .unwrap();

        let mut observer = RecordingObserver::default();
        manager.try_recv_plot_sync(peer_id, &mut observer);
        assert_eq!(observer.updates, vec![peer_id]);
    }
}
