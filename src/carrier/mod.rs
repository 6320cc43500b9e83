//! Carrier REST API: payload types, client trait, HTTP implementation,
//! error taxonomy, and retry.

pub mod client;
pub mod error;
pub mod http;
pub mod payload;
pub mod retry;

pub use client::{CarrierApi, QueryWindow};
pub use error::{CarrierApiError, CarrierErrorKind};
pub use http::HttpCarrierClient;
pub use payload::{CarrierPayload, LabelInfo, PayloadItem, PayloadPackage, PayloadTag, PayloadWeight, ShipmentPage};
pub use retry::{RetryConfig, retry_with_backoff};
