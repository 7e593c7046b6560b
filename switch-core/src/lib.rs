//! Scraping and configuration of managed switch web interfaces.
//!
//! Each supported model gets a [`SwitchAdapter`] that knows its login
//! handshake and page formats. Adapters are looked up by name through the
//! [`registry`], or picked by sniffing the login pages with [`detect`].

pub mod adapter;
pub mod crypto;
pub mod detect;
pub mod error;
pub mod html;
pub mod migrate;
pub mod model;
pub mod models;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod vendor;

pub use adapter::{SwitchAdapter, SwitchBase, SwitchConfig};
pub use detect::{connect_with_detection, detect_switch_model};
pub use error::{Result, SwitchError};
pub use migrate::{copy_vlans, MigrationReport};
pub use model::{Inventory, MacEntry, Payload, Port, PortVlan, Vlan};
pub use registry::{create, get_model, list_models, register};
pub use snapshot::Snapshot;
pub use vendor::{VendorLookup, VendorResolver};
