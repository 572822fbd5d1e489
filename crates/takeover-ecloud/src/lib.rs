//! takeover-ecloud — grow the disaster cluster through the ecloud node API.
//!
//! Every request to the cloud API is signed with the `V2.0` HMAC-SHA1
//! scheme. The scaler adds nodes one at a time from a fixed VM template.
//!
//! # Growth
//!
//! ```text
//! nodes  = list(cluster)
//! target = nodes.total + increase_num        (increase_num >= 2)
//! repeat increase_num times:
//!     add_node(cluster, template)            (abort on first failure)
//! ```
//!
//! # Components
//!
//! - **`sign`** — canonical query, string-to-sign, HMAC-SHA1 signature
//! - **`client`** — `EcloudClient`, the signed HTTP client
//! - **`scaler`** — `NodeBackend` contract and `CapacityScaler`

pub mod client;
pub mod error;
pub mod scaler;
pub mod sign;

pub use client::EcloudClient;
pub use error::{EcloudError, EcloudResult, GrowError};
pub use scaler::{CapacityScaler, Grow, GrowReport, NodeBackend};
pub use sign::{Signer, SigningContext};
