//! Harvester session manager: peer connect/disconnect lifecycle, the
//! deferred handshake, and plot-sync delta observation (spec.md §4.5).

mod peer;
mod plot_sync;
mod session;

pub use peer::{ChannelHarvesterPeer, HarvesterOutboundMessage, HarvesterPeer, HarvesterPeerError, PeerId};
pub use plot_sync::{PlotSyncDelta, PlotSyncEvent};
pub use session::{HarvesterObserver, HarvesterSessionManager};
