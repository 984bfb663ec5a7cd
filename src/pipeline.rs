use std::fmt;

use crate::catalog::{Candidate, Catalog};
use crate::config::{CatalogFallback, Config, Policy};
use crate::eligibility;
use crate::error::{ConfigError, ConfigFault};
use crate::location::RequestContext;
use crate::overrides::{self, record};
use crate::strategy::{self, RandomSource, Scoring, Strategy};
use crate::telemetry::{Metric, Telemetry};

/// States of the decision pipeline. Every request walks [`Stage::PIPELINE`] in order and stops
/// at the first stage that yields a candidate; [`Stage::Error`] is reached only when none does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    GeoOverride,
    AsnOverride,
    AnswerSet,
    StrictSelect,
    GeoDefault,
    CatalogFallback,
    StaticDefault,
    Error,
}

impl Stage {
    pub const PIPELINE: [Stage; 7] = [
        Stage::GeoOverride,
        Stage::AsnOverride,
        Stage::AnswerSet,
        Stage::StrictSelect,
        Stage::GeoDefault,
        Stage::CatalogFallback,
        Stage::StaticDefault,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::GeoOverride => "geo_override",
            Stage::AsnOverride => "asn_override",
            Stage::AnswerSet => "answer_set",
            Stage::StrictSelect => "strict_select",
            Stage::GeoDefault => "geo_default",
            Stage::CatalogFallback => "catalog_fallback",
            Stage::StaticDefault => "static_default",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

/// The answer for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// CNAME target to answer with. Absent only when the configuration could not produce any
    /// candidate, in which case the host should answer with its own fallback and raise an alarm.
    pub address: Option<String>,
    pub ttl: u32,
    /// The stage that produced this decision.
    pub stage: Stage,
    /// Configuration faults observed while deciding.
    pub faults: Vec<ConfigFault>,
}

impl Decision {
    pub fn is_configuration_error(&self) -> bool {
        self.stage == Stage::Error
    }
}

/// A loaded deployment: catalog, policy and strategy, immutable for the life of the process and
/// shared across concurrent requests.
#[derive(Clone, Debug)]
pub struct Engine {
    catalog: Catalog,
    policy: Policy,
    strategy: Strategy,
    scoring: Scoring,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let profile_weight = config.profile_weight()?;
        let scoring = Scoring {
            padding_mode: config.policy.padding_mode,
            profile_weight,
        };
        let engine = Self {
            catalog: Catalog::new(config.candidates)?,
            policy: config.policy,
            strategy: config.strategy,
            scoring,
        };
        for fault in engine.audit() {
            tracing::warn!(%fault, "configuration fault");
        }
        tracing::info!(
            candidates = engine.catalog.len(),
            strategy = ?engine.strategy,
            "steering configuration loaded"
        );
        Ok(engine)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::new(Config::from_json(json)?)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Every fault the configuration can produce at request time, found up front.
    pub fn audit(&self) -> Vec<ConfigFault> {
        let mut faults = Vec::new();
        if self.catalog.is_empty() {
            faults.push(ConfigFault::EmptyCatalog);
        }
        if let Some(id) = &self.policy.default_candidate {
            if !self.catalog.contains(id) {
                faults.push(ConfigFault::MissingDefault(id.clone()));
            }
        }
        let policy = &self.policy;
        for &country in policy.country_overrides.keys() {
            if let Err(fault) =
                overrides::resolve(&policy.country_overrides, country, &self.catalog)
            {
                faults.push(fault);
            }
        }
        for &continent in policy.continent_overrides.keys() {
            if let Err(fault) =
                overrides::resolve(&policy.continent_overrides, continent, &self.catalog)
            {
                faults.push(fault);
            }
        }
        for &asn in policy.asn_overrides.keys() {
            if let Err(fault) = overrides::resolve(&policy.asn_overrides, asn, &self.catalog) {
                faults.push(fault);
            }
        }
        for (&country, ids) in &policy.country_answer_sets {
            for id in ids.iter().filter(|id| !self.catalog.contains(id)) {
                faults.push(ConfigFault::DanglingAnswerSetEntry {
                    country,
                    id: id.clone(),
                });
            }
        }
        faults
    }

    /// Decide the answer for one request. Always returns a decision; configuration problems
    /// degrade the answer and are reported in [`Decision::faults`].
    pub fn decide<T, R>(&self, context: &RequestContext, telemetry: &T, rng: &mut R) -> Decision
    where
        T: Telemetry + ?Sized,
        R: RandomSource + ?Sized,
    {
        let mut faults = Vec::new();
        if self.catalog.is_empty() {
            record(&mut faults, ConfigFault::EmptyCatalog);
        } else {
            for stage in Stage::PIPELINE {
                let Some((candidate, ttl)) =
                    self.attempt(stage, context, telemetry, rng, &mut faults)
                else {
                    tracing::trace!(%stage, "stage did not resolve");
                    continue;
                };
                tracing::debug!(
                    %stage,
                    candidate = %candidate.id,
                    target = %candidate.target,
                    ttl,
                    "resolved"
                );
                return Decision {
                    address: Some(candidate.target.clone()),
                    ttl,
                    stage,
                    faults,
                };
            }
        }
        let ttl = self.policy.error_ttl();
        tracing::error!(
            ?context,
            ttl,
            faults = faults.len(),
            "no candidate resolved, answering without an address"
        );
        Decision {
            address: None,
            ttl,
            stage: Stage::Error,
            faults,
        }
    }

    fn attempt<'e, T, R>(
        &'e self,
        stage: Stage,
        context: &RequestContext,
        telemetry: &T,
        rng: &mut R,
        faults: &mut Vec<ConfigFault>,
    ) -> Option<(&'e Candidate, u32)>
    where
        T: Telemetry + ?Sized,
        R: RandomSource + ?Sized,
    {
        let policy = &self.policy;
        let default_ttl = policy.default_ttl;
        match stage {
            Stage::GeoOverride if policy.geo_override => {
                overrides::geo(policy, context, &self.catalog, faults).map(|c| (c, default_ttl))
            }
            Stage::AsnOverride if policy.asn_override => {
                overrides::asn(policy, context, &self.catalog, faults).map(|c| (c, default_ttl))
            }
            Stage::AnswerSet => {
                let members =
                    overrides::answer_set(policy, context.country, &self.catalog, faults)?;
                let healthy: Vec<&Candidate> = members
                    .into_iter()
                    .filter(|c| eligibility::is_healthy(c, policy.require_monitor_data, telemetry))
                    .collect();
                strategy::random_choice(&healthy, rng).map(|c| (c, default_ttl))
            }
            Stage::StrictSelect => {
                let admissible = eligibility::filter(&self.catalog, context, policy, telemetry);
                tracing::debug!(
                    admissible = admissible.len(),
                    candidates = self.catalog.len(),
                    "filtered to admissible candidates"
                );
                if admissible.is_empty() {
                    return None;
                }
                self.strategy
                    .select(&admissible, context, &self.scoring, telemetry, rng)
                    .map(|c| (c, c.ttl_or(default_ttl)))
            }
            Stage::GeoDefault if policy.geo_default => {
                overrides::geo(policy, context, &self.catalog, faults).map(|c| (c, default_ttl))
            }
            Stage::CatalogFallback => {
                let all: Vec<&Candidate> = self.catalog.iter().collect();
                let candidate = match policy.catalog_fallback {
                    CatalogFallback::None => None,
                    CatalogFallback::Random => strategy::random_choice(&all, rng),
                    CatalogFallback::HighestUptime => strategy::extremum_by_metric(
                        &all,
                        Metric::Uptime,
                        context,
                        self.scoring.padding_mode,
                        telemetry,
                    ),
                };
                candidate.map(|c| (c, default_ttl))
            }
            Stage::StaticDefault => {
                let id = policy.default_candidate.as_ref()?;
                match self.catalog.get(id) {
                    Some(candidate) => Some((candidate, default_ttl)),
                    None => {
                        record(faults, ConfigFault::MissingDefault(id.clone()));
                        None
                    }
                }
            }
            Stage::GeoOverride | Stage::AsnOverride | Stage::GeoDefault | Stage::Error => None,
        }
    }
}
