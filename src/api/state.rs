use std::sync::Arc;

use crate::config::Config;
use crate::delivery::SubscriptionService;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<SubscriptionService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, service: SubscriptionService, metrics: Arc<Metrics>) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(service),
            metrics,
        }
    }
}
