//! Turning an inbound subscription request into a response body
//!
//! [`negotiate`] picks the output dialect, [`token`] signs converter
//! callbacks, [`converter`] talks to the external conversion service and
//! [`SubscriptionService`] ties them to the aggregator and store.

pub mod converter;
pub mod negotiate;
mod service;
pub mod token;

pub use converter::{ConversionRequest, ConvertError, Converter, HttpConverter};
pub use negotiate::{QueryParams, Target, resolve_target};
pub use service::{
    Delivery, DeliveryError, DeliveryFormat, Result, Route, SubscriptionRequest,
    SubscriptionService,
};
