//! Inbound carrier webhooks: event classification and signature
//! verification.

pub mod events;
pub mod signature;

pub use events::{CarrierEventKind, WebhookEnvelope};
pub use signature::{
    KEY_SET_TTL, KeyResolver, KeySetCache, REPLAY_WINDOW_SECS, SignatureError, StaticKeyResolver,
    verify_webhook,
};
