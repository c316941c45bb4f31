//! Configuration draft engine for Modbus RTU bridge devices.
//!
//! The engine keeps an editable in-memory draft of a serial bus, its
//! slave devices, and their datapoints, maps it to and from the JSON
//! document the bridge firmware persists, and validates that document
//! against protocol constraints before anything is sent.
//!
//! ## Architecture
//!
//! - [`session::DraftSession`]: the editable hierarchy plus the selection
//!   cursor and every edit command
//! - [`mapper`]: tolerant `to_draft`, minimal `to_document`
//! - [`validate`]: collected rule violations over the raw document
//! - [`service::ConfigService`]: load / commit / backup / import / test
//!   execution against an injected [`store::ConfigStore`]
//!
//! Rendering, scheduling, and the Modbus transport itself live elsewhere;
//! this crate only produces, validates, and navigates the description the
//! firmware consumes.

pub mod addr;
pub mod draft;
pub mod ident;
pub mod mapper;
pub mod schema;
pub mod service;
pub mod session;
pub mod store;
pub mod validate;

#[cfg(feature = "http")]
pub mod http;

pub use addr::{format_address, parse_address, AddressFormat};
pub use draft::{DraftBus, DraftDatapoint, DraftDevice};
pub use ident::{datapoint_id, slugify, unique_id};
pub use mapper::{to_document, to_draft};
pub use schema::{
    ConfigDocument, DataType, FunctionCode, Parity, RegisterSlice, SerialFormat,
};
pub use service::{CommitError, CommitPreview, ConfigService};
pub use session::{DraftError, DraftSession, Selection, TreeMatches};
pub use store::{ConfigStore, InMemoryStore, StoreError, TestOutcome, TestRequest};
pub use validate::{validate_document, ValidationProfile, ValidationReport};

#[cfg(feature = "http")]
pub use http::HttpConfigStore;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub const BUILD_PROFILE: &str = if cfg!(debug_assertions) { "debug" } else { "release" };
