//! redpacket - Community Chat-Bot Red Packet Engine
//!
//! A creator funds a packet with an asset amount split across a fixed
//! number of shares; group members race to claim shares until the packet
//! is exhausted or expires, after which unclaimed funds return to the
//! creator via the payment network.
//!
//! # Modules
//!
//! - [`packet`] - the lifecycle engine (store, state machine, split, claim
//!   arbitration, refund settlement, sweeper, HTTP glue)
//! - [`community`] - chat-side glue: members, assets, prohibited flag,
//!   notification queue
//! - [`network`] - payment network traits and REST client
//! - [`config`] / [`logging`] / [`db`] - service plumbing

pub mod community;
pub mod config;
pub mod db;
pub mod logging;
pub mod network;
pub mod packet;

// Convenient re-exports at crate root
pub use network::{AssetLedger, NetworkClient, TransferGateway, TransferOrder};
pub use packet::{
    ClaimArbiter, Packet, PacketError, PacketId, PacketService, PacketState, PacketStore,
    PacketView, Participant, RefundSettler, RefundSweeper, refund_trace_id, split_amount,
};
