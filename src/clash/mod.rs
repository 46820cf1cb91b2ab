//! Clash dialect support: reading proxies out of Clash configs and
//! synthesizing a load-balanced one.

pub mod bridge;
pub mod synth;

pub use bridge::{Bridge, BridgeError, MAX_PROVIDER_DEPTH, record_from_clash};
pub use synth::{LoadBalanceStrategy, SynthesisError, synthesize};
