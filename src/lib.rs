mod compatibility;
mod error;
mod metrics;
mod ranker;
mod simulation;
mod types;

pub use compatibility::{CompatibilityData, CompatibilityModel};
pub use error::{MarketError, Result};
pub use metrics::{
    representative_of, sorted_match_counts, RepresentativeMetadata, RepresentativeTrace,
    Representatives, RunSummary,
};
pub use ranker::{Ranker, ScoredCandidate};
pub use simulation::{run, MarketSimulation, MarketState, PendingEntry, RunOutcome};
pub use types::*;

use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(err: MarketError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn parse_group(name: &str) -> std::result::Result<Group, JsValue> {
    Group::from_name(name).ok_or_else(|| JsValue::from_str(&format!("Unknown group: {}", name)))
}

/// WASM-exposed marketplace wrapper: one compatibility model, latest run outcome
#[wasm_bindgen]
pub struct MarketEngine {
    model: CompatibilityModel,
    outcome: Option<RunOutcome>,
}

#[wasm_bindgen]
impl MarketEngine {
    /// Create from compatibility data JSON (see `CompatibilityData`)
    #[wasm_bindgen(constructor)]
    pub fn new(compatibility_json: &str) -> std::result::Result<MarketEngine, JsValue> {
        let model = CompatibilityModel::from_json(compatibility_json).map_err(js_error)?;
        Ok(MarketEngine { model, outcome: None })
    }

    /// Run a full simulation. Missing config fields take their defaults.
    /// A failed run keeps the previous outcome.
    pub fn run(&mut self, config_json: &str) -> std::result::Result<(), JsValue> {
        let config: MarketConfig = serde_json::from_str(config_json)
            .map_err(|e| JsValue::from_str(&format!("Config parse error: {}", e)))?;
        let outcome = run(&self.model, &config).map_err(js_error)?;

        web_sys::console::log_1(&JsValue::from_str(&format!(
            "Simulation finished: {} days, {} decisions, {} matches",
            config.days,
            outcome.event_log.len(),
            outcome.match_pair_count(),
        )));

        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn has_outcome(&self) -> bool {
        self.outcome.is_some()
    }

    /// Full event log as JSON
    pub fn get_event_log(&self) -> String {
        self.outcome
            .as_ref()
            .map(|o| serde_json::to_string(&o.event_log).unwrap_or_default())
            .unwrap_or_else(|| "[]".to_string())
    }

    /// Events of a single day as JSON
    pub fn get_day_log(&self, day: u32) -> String {
        self.outcome
            .as_ref()
            .map(|o| serde_json::to_string(o.events_for_day(day)).unwrap_or_default())
            .unwrap_or_else(|| "[]".to_string())
    }

    /// user id -> matched user ids, as JSON
    pub fn get_matches(&self) -> String {
        self.outcome
            .as_ref()
            .map(|o| serde_json::to_string(&o.matches).unwrap_or_default())
            .unwrap_or_else(|| "{}".to_string())
    }

    /// Aggregate metrics as JSON
    pub fn get_metrics(&self) -> std::result::Result<String, JsValue> {
        let outcome = self.require_outcome()?;
        let metrics = MarketMetrics::compute(&self.model, outcome).map_err(js_error)?;
        serde_json::to_string(&metrics).map_err(|e| js_error(e.into()))
    }

    /// Config echo plus metrics and totals, as JSON
    pub fn get_summary(&self) -> std::result::Result<String, JsValue> {
        let outcome = self.require_outcome()?;
        let summary = RunSummary::build(&self.model, outcome).map_err(js_error)?;
        serde_json::to_string(&summary).map_err(|e| js_error(e.into()))
    }

    /// Sorted per-user match counts for "women" or "men" (for bar charts)
    pub fn get_match_counts(&self, group: &str) -> std::result::Result<String, JsValue> {
        let group = parse_group(group)?;
        let outcome = self.require_outcome()?;
        let counts: Vec<_> = sorted_match_counts(&self.model, outcome, group)
            .into_iter()
            .map(|(id, matches)| serde_json::json!({ "user_id": id, "matches": matches }))
            .collect();
        serde_json::to_string(&counts).map_err(|e| js_error(e.into()))
    }

    /// Trace and metadata for the representative woman and man
    pub fn get_representative_trace(&self) -> std::result::Result<String, JsValue> {
        let outcome = self.require_outcome()?;
        let trace = RepresentativeTrace::build(&self.model, outcome).map_err(js_error)?;
        serde_json::to_string(&trace).map_err(|e| js_error(e.into()))
    }

    /// User ids of one group, in model order
    pub fn get_group_ids(&self, group: &str) -> std::result::Result<js_sys::Array, JsValue> {
        let group = parse_group(group)?;
        Ok(self
            .model
            .ids(group)
            .iter()
            .map(|id| JsValue::from_str(id))
            .collect())
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        serde_json::to_string(&MarketConfig::default()).unwrap_or_default()
    }
}

impl MarketEngine {
    fn require_outcome(&self) -> std::result::Result<&RunOutcome, JsValue> {
        self.outcome
            .as_ref()
            .ok_or_else(|| JsValue::from_str("No simulation has been run yet"))
    }
}
