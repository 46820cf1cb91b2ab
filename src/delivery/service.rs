//! Subscription request pipeline
//!
//! Route and token check, source selection, aggregation, then one of:
//! callback short-circuit, local synthesis, base64, or delegation to the
//! external converter.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::converter::{ConversionRequest, ConvertError, Converter};
use super::negotiate::{QueryParams, Target, resolve_target};
use super::token;
use crate::aggregate::{self, MergedNodes};
use crate::clash;
use crate::config::SubscriptionSettings;
use crate::fetch::Orchestrator;
use crate::link::uri::decode_component_lossy;
use crate::model::{Profile, Source};
use crate::observability::Metrics;
use crate::store::{FjallStore, StoreError};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalid token")]
    InvalidToken,

    #[error("Profile sharing is disabled until a custom profile token is set")]
    ProfileTokenNotSet,

    #[error("Profile not found or disabled: {0}")]
    ProfileNotFound(String),

    #[error("Subconverter backend is not configured.")]
    ConverterNotConfigured,

    #[error(transparent)]
    Upstream(#[from] ConvertError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Token and optional profile identifier taken from the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub token: String,
    pub profile: Option<String>,
}

impl Route {
    /// `/{token}`, `/{token}/{profile}` (optionally under `/sub/`), or
    /// `?token=` when the path carries no segment.
    pub fn parse(path: &str, query: &QueryParams) -> Option<Self> {
        let path = path.strip_prefix("/sub/").unwrap_or(path);
        let mut segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_component_lossy);

        match segments.next() {
            Some(token) => Some(Self { token, profile: segments.next() }),
            None => query
                .get("token")
                .filter(|t| !t.is_empty())
                .map(|token| Self { token: token.to_string(), profile: None }),
        }
    }
}

/// Everything the pipeline needs from one inbound request.
#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    pub route: Route,
    pub query: QueryParams,
    pub user_agent: String,
    /// Externally reachable base of this service, used for callbacks.
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFormat {
    Base64,
    Synthesized,
    Converted(Target),
}

/// A rendered subscription body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub body: String,
    pub format: DeliveryFormat,
    /// Download name, when the body is meant to be saved as a file.
    pub file_name: Option<String>,
}

/// Sources and converter settings chosen for one request.
#[derive(Debug)]
struct Selection {
    sources: Vec<Source>,
    display_name: String,
    converter_host: String,
    converter_config: String,
}

pub struct SubscriptionService {
    store: FjallStore,
    orchestrator: Orchestrator,
    converter: Arc<dyn Converter>,
    defaults: SubscriptionSettings,
    callback_secret: String,
    fallback_user_agent: String,
    metrics: Arc<Metrics>,
}

impl SubscriptionService {
    pub fn new(
        store: FjallStore,
        orchestrator: Orchestrator,
        converter: Arc<dyn Converter>,
        defaults: SubscriptionSettings,
        callback_secret: &str,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            converter,
            defaults,
            callback_secret: callback_secret.to_string(),
            fallback_user_agent: "Clash for Windows/0.20.39".to_string(),
            metrics,
        }
    }

    /// User agent sent to feeds when the client sent none.
    pub fn with_fallback_user_agent(mut self, user_agent: &str) -> Self {
        self.fallback_user_agent = user_agent.to_string();
        self
    }

    /// Read the stored settings, as a liveness check of the store.
    pub fn check_store(&self) -> Result<()> {
        self.store.load_settings()?;
        Ok(())
    }

    pub async fn render(&self, request: &SubscriptionRequest) -> Result<Delivery> {
        let settings = self.defaults.merged(&self.store.load_settings()?);
        let sources = self.store.load_sources()?;
        let profiles = self.store.load_profiles()?;

        let selection = select(&settings, &request.route, &sources, &profiles)?;
        if selection.converter_host.trim().is_empty() {
            return Err(DeliveryError::ConverterNotConfigured);
        }

        let target = resolve_target(&request.query, &request.user_agent);
        let is_callback =
            token::is_valid(&self.callback_secret, request.query.get("callback_token"));
        debug!(%target, is_callback, sources = selection.sources.len(), "Rendering subscription");

        let fetch_agent = if request.user_agent.trim().is_empty() {
            self.fallback_user_agent.as_str()
        } else {
            request.user_agent.as_str()
        };
        let selected: Vec<&Source> = selection.sources.iter().collect();
        let merged = aggregate::aggregate(
            &self.orchestrator,
            &selected,
            fetch_agent,
            settings.prepend_source_name,
        )
        .await;

        self.metrics.subscription_served();

        if is_callback {
            self.metrics.callback_short_circuit();
            return Ok(base64_delivery(&merged));
        }

        if settings.load_balance && target == Target::Clash {
            match clash::synthesize(&merged.nodes, settings.strategy()) {
                Ok(body) => {
                    info!(nodes = merged.nodes.len(), "Served synthesized config");
                    return Ok(Delivery {
                        body,
                        format: DeliveryFormat::Synthesized,
                        file_name: Some(format!("{}.yaml", selection.display_name)),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Synthesis failed, delegating to converter");
                    self.metrics.synthesis_fallback();
                }
            }
        }

        if target == Target::Base64 {
            return Ok(base64_delivery(&merged));
        }

        let callback = token::callback_url(
            &request.base_url,
            &request.route.token,
            request.route.profile.as_deref(),
            &token::callback_token(&self.callback_secret),
        );
        let conversion = ConversionRequest {
            host: selection.converter_host.clone(),
            target: target.as_str().to_string(),
            source_url: callback,
            config: Some(selection.converter_config.clone()),
        };

        self.metrics.conversion_delegated();
        let body = self.converter.convert(&conversion).await?;
        Ok(Delivery {
            body,
            format: DeliveryFormat::Converted(target),
            file_name: Some(selection.display_name),
        })
    }
}

fn base64_delivery(merged: &MergedNodes) -> Delivery {
    Delivery {
        body: merged.to_base64(),
        format: DeliveryFormat::Base64,
        file_name: None,
    }
}

fn select(
    settings: &SubscriptionSettings,
    route: &Route,
    sources: &[Source],
    profiles: &[Profile],
) -> Result<Selection> {
    let Some(identifier) = route.profile.as_deref() else {
        if route.token != settings.token {
            return Err(DeliveryError::InvalidToken);
        }
        return Ok(Selection {
            sources: sources.iter().filter(|s| s.enabled).cloned().collect(),
            display_name: settings.file_name.clone(),
            converter_host: settings.converter_host.clone(),
            converter_config: settings.converter_config.clone(),
        });
    };

    if !settings.profile_sharing_enabled() {
        return Err(DeliveryError::ProfileTokenNotSet);
    }
    if route.token != settings.profile_token {
        return Err(DeliveryError::InvalidToken);
    }

    let profile = profiles
        .iter()
        .find(|p| p.custom_id.as_deref() == Some(identifier))
        .or_else(|| profiles.iter().find(|p| p.id == identifier))
        .filter(|p| p.enabled)
        .ok_or_else(|| DeliveryError::ProfileNotFound(identifier.to_string()))?;

    Ok(Selection {
        sources: profile.members(sources).into_iter().cloned().collect(),
        display_name: if profile.name.is_empty() {
            settings.file_name.clone()
        } else {
            profile.name.clone()
        },
        converter_host: profile
            .converter_override()
            .unwrap_or(settings.converter_host.as_str())
            .to_string(),
        converter_config: profile
            .config_override()
            .unwrap_or(settings.converter_config.as_str())
            .to_string(),
    })
}
