//! Deployment configuration, loaded once from JSON and validated into an
//! [`Engine`](crate::Engine).
//!
//! ```json
//! {
//!   "candidates": [
//!     { "id": "foo", "target": "www.foo.com", "monitorId": 304, "padding": 0 },
//!     { "id": "bar", "target": "www.bar.com", "continents": ["EU"], "weight": 30 }
//!   ],
//!   "policy": {
//!     "availabilityThreshold": 90,
//!     "defaultCandidate": "foo",
//!     "defaultTtl": 20,
//!     "geoOverride": true,
//!     "countryOverrides": { "UA": "foo" }
//!   },
//!   "strategy": { "kind": "multiFactor" },
//!   "profiles": { "rtt": 1.9, "std": 1.25, "trp": 0.5 },
//!   "defaultProfile": "rtt"
//! }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::catalog::{Candidate, CandidateId};
use crate::error::ConfigError;
use crate::location::{Asn, Continent, CountryCode};
use crate::num::{Percentage, Weight};
use crate::strategy::Strategy;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(alias = "providers")]
    pub candidates: Vec<Candidate>,
    pub policy: Policy,
    #[serde(default)]
    pub strategy: Strategy,
    /// Named rank multipliers for [`Strategy::MultiFactor`].
    #[serde(default)]
    pub profiles: BTreeMap<String, Weight>,
    #[serde(default)]
    pub default_profile: Option<String>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The rank multiplier of the selected profile. Without a selected profile ranks are left
    /// unscaled.
    pub fn profile_weight(&self) -> Result<Weight, ConfigError> {
        match &self.default_profile {
            None => Ok(Weight::ONE),
            Some(name) => self
                .profiles
                .get(name)
                .copied()
                .ok_or_else(|| ConfigError::UnknownProfile(name.clone())),
        }
    }
}

/// Steering policy shared by every request.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Candidates must report uptime strictly above this to be eligible.
    #[serde(default = "no_threshold")]
    pub availability_threshold: Percentage,
    /// Treat candidates without a monitor as unhealthy.
    #[serde(default)]
    pub require_monitor_data: bool,
    #[serde(default, alias = "defaultProvider")]
    pub default_candidate: Option<CandidateId>,
    pub default_ttl: u32,
    /// TTL of answers produced without any candidate. Defaults to `default_ttl`.
    #[serde(default)]
    pub error_ttl: Option<u32>,
    #[serde(default)]
    pub geo_override: bool,
    #[serde(default)]
    pub asn_override: bool,
    #[serde(default)]
    pub geo_default: bool,
    #[serde(default, alias = "countryToProvider")]
    pub country_overrides: BTreeMap<CountryCode, CandidateId>,
    #[serde(default, alias = "continentToProvider")]
    pub continent_overrides: BTreeMap<Continent, CandidateId>,
    #[serde(default, alias = "asnToProvider")]
    pub asn_overrides: BTreeMap<Asn, CandidateId>,
    /// Per-country candidate sets picked from at random among healthy members.
    #[serde(default, alias = "countriesAnswersSets")]
    pub country_answer_sets: BTreeMap<CountryCode, Vec<CandidateId>>,
    #[serde(default)]
    pub catalog_fallback: CatalogFallback,
    #[serde(default)]
    pub padding_mode: PaddingMode,
}

fn no_threshold() -> Percentage {
    Percentage::ZERO
}

impl Policy {
    pub fn new(default_ttl: u32) -> Self {
        Self {
            availability_threshold: Percentage::ZERO,
            require_monitor_data: false,
            default_candidate: None,
            default_ttl,
            error_ttl: None,
            geo_override: false,
            asn_override: false,
            geo_default: false,
            country_overrides: BTreeMap::new(),
            continent_overrides: BTreeMap::new(),
            asn_overrides: BTreeMap::new(),
            country_answer_sets: BTreeMap::new(),
            catalog_fallback: CatalogFallback::None,
            padding_mode: PaddingMode::Absolute,
        }
    }

    pub fn error_ttl(&self) -> u32 {
        self.error_ttl.unwrap_or(self.default_ttl)
    }
}

/// Last-resort pick over the whole catalog, tried before the static default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CatalogFallback {
    #[default]
    None,
    Random,
    HighestUptime,
}

/// How a candidate's padding adjusts its performance score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaddingMode {
    /// `performance + padding`
    #[default]
    Absolute,
    /// `performance * (1 + padding / 100)`
    Percent,
}

impl PaddingMode {
    pub fn apply(&self, performance: f64, padding: f64) -> f64 {
        match self {
            PaddingMode::Absolute => performance + padding,
            PaddingMode::Percent => performance * (1.0 + padding / 100.0),
        }
    }
}
