//! Master-replica replication.
//!
//! The master keeps a registry of attached replicas, forwards every executed
//! write to them byte-for-byte, and coordinates WAIT over their acknowledged
//! offsets. The replica performs the PSYNC handshake at boot and keeps an
//! offset counter over the command stream it consumes from the master.

mod handshake;
mod offset_counter;
mod replica_registry;

pub use handshake::{HandshakeError, MasterConnection, perform_handshake};
pub use offset_counter::OffsetCounter;
pub use replica_registry::ReplicaRegistry;
