//! The outbound half of a harvester connection, abstracted behind a trait so
//! the session manager can be tested without a real websocket transport --
//! grounded on `chia-client::peer::Peer`'s shape (`peer_id()` plus a
//! fire-and-forget `send`), minus the TLS/websocket machinery itself, which
//! spec.md places outside the farmer core ("dictated by the consensus peer
//! and not re-specified here").

use async_trait::async_trait;
use farmer_protocol::{HarvesterHandshake, NewSignagePointHarvester, RequestSignatures};

/// Identifies one harvester connection. Distinct from a plot identifier or a
/// launcher id -- this is a session handle, not protocol data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub [u8; 32]);

#[derive(Debug, thiserror::Error)]
#[error("send to harvester peer failed: {0}")]
pub struct HarvesterPeerError(pub String);

/// The three outbound message kinds a harvester session ever sends.
#[async_trait]
pub trait HarvesterPeer: Send + Sync {
    fn peer_id(&self) -> PeerId;
    async fn send_handshake(&self, handshake: HarvesterHandshake) -> Result<(), HarvesterPeerError>;
    async fn send_new_signage_point(
        &self,
        signage_point: NewSignagePointHarvester,
    ) -> Result<(), HarvesterPeerError>;
    async fn send_request_signatures(
        &self,
        request: RequestSignatures,
    ) -> Result<(), HarvesterPeerError>;
}

/// Outbound messages as sent over a [`ChannelHarvesterPeer`]'s channel --
/// the test/in-process stand-in for the real framed wire connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvesterOutboundMessage {
    Handshake(HarvesterHandshake),
    NewSignagePoint(NewSignagePointHarvester),
    RequestSignatures(RequestSignatures),
}

/// A [`HarvesterPeer`] backed by an mpsc channel rather than a socket --
/// useful in-process (a harvester and farmer sharing one runtime) and for
/// tests.
#[derive(Debug, Clone)]
pub struct ChannelHarvesterPeer {
    peer_id: PeerId,
    sender: tokio::sync::mpsc::Sender<HarvesterOutboundMessage>,
}

impl ChannelHarvesterPeer {
    #[must_use]
    pub fn new(peer_id: PeerId, sender: tokio::sync::mpsc::Sender<HarvesterOutboundMessage>) -> Self {
        Self { peer_id, sender }
    }
}

#[async_trait]
impl HarvesterPeer for ChannelHarvesterPeer {
    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn send_handshake(&self, handshake: HarvesterHandshake) -> Result<(), HarvesterPeerError> {
        self.sender
            .send(HarvesterOutboundMessage::Handshake(handshake))
            .await
            .map_err(|error| HarvesterPeerError(error.to_string()))
    }

    async fn send_new_signage_point(
        &self,
        signage_point: NewSignagePointHarvester,
    ) -> Result<(), HarvesterPeerError> {
        self.sender
            .send(HarvesterOutboundMessage::NewSignagePoint(signage_point))
            .await
            .map_err(|error| HarvesterPeerError(error.to_string()))
    }

    async fn send_request_signatures(
        &self,
        request: RequestSignatures,
    ) -> Result<(), HarvesterPeerError> {
        self.sender
            .send(HarvesterOutboundMessage::RequestSignatures(request))
            .await
            .map_err(|error| HarvesterPeerError(error.to_string()))
    }
}
