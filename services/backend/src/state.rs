//! The injected collaborator bundle shared by every request handler and
//! background task.

use std::sync::Arc;

use zmeta_rules::RuleEngine;

use crate::config::Config;
use crate::dedup::AlertDeduper;
use crate::metrics::Metrics;
use crate::recorder::RecorderHandle;
use crate::ws::{WsHub, WsHubConfig};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
    pub hub: Arc<WsHub>,
    pub recorder: RecorderHandle,
    pub rules: Arc<RuleEngine>,
    pub deduper: Arc<AlertDeduper>,
}

impl AppState {
    pub fn new(config: Config, recorder: RecorderHandle) -> Self {
        let metrics = Arc::new(Metrics::new());
        let hub = Arc::new(WsHub::new(
            WsHubConfig::with_capacity(config.ws_queue_max),
            Arc::clone(&metrics),
        ));
        let rules = Arc::new(RuleEngine::new(config.rules_path.clone()));
        AppState {
            config: Arc::new(config),
            metrics,
            hub,
            recorder,
            rules,
            deduper: Arc::new(AlertDeduper::default()),
        }
    }
}
