//! # op-core
//!
//! Delivery primitives shared by the Open Protocol session.
//!
//! - **Publisher** - close-safe channel with many writers and shared readers
//! - **DeliveryQueue** - per-destination ordered queue draining into a publisher
//! - **TopicRegistry** - topic key to delivery queue table, owned by one task
//! - **Topic** - the subscribable result families and their MIDs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌───────────────┐     ┌──────────┐
//! │  Read loop  │────▶│ TopicRegistry │────▶│ DeliveryQueue │────▶│ Publisher│
//! └─────────────┘     └───────────────┘     └───────────────┘     └──────────┘
//!                                                                      │
//!                                                                      ▼
//!                                                                 ┌──────────┐
//!                                                                 │  Reader  │
//!                                                                 └──────────┘
//! ```

pub mod delivery;
pub mod publisher;
pub mod registry;
pub mod topic;

pub use delivery::DeliveryQueue;
pub use publisher::{Publisher, PublisherError, Reader, Writer};
pub use registry::{RegistryError, TopicRegistry};
pub use topic::{Topic, TopicKey};
