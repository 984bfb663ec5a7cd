use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use arrayvec::ArrayVec;

use crate::catalog::{CandidateId, MonitorId};
use crate::location::{Continent, CountryCode, RequestContext};
use crate::num::finite;

/// Which slice of RUM data a metric is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Global,
    Country(CountryCode),
    Continent(Continent),
}

impl Scope {
    /// Scopes to consult for a request, most specific first. The global scope is always last.
    pub fn fallback_chain(context: &RequestContext) -> ArrayVec<Scope, 3> {
        let mut chain = ArrayVec::new();
        if let Some(country) = context.country {
            chain.push(Scope::Country(country));
        }
        if let Some(continent) = context.continent {
            chain.push(Scope::Continent(continent));
        }
        chain.push(Scope::Global);
        chain
    }
}

impl FromStr for Scope {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("global") => Ok(Scope::Global),
            Some(("country", code)) => code.parse().map(Scope::Country),
            Some(("continent", code)) => code.parse().map(Scope::Continent),
            _ => Err(format!("invalid scope {s:?}")),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Country(country) => write!(f, "country:{country}"),
            Scope::Continent(continent) => write!(f, "continent:{continent}"),
        }
    }
}

/// The RUM metrics a strategy can rank candidates by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Rolling availability percentage. Higher is better.
    Uptime,
    /// Opaque performance score (typically RTT). Lower is better.
    Performance,
}

/// Point-in-time view of the external monitoring and RUM services. Implementations answer
/// synchronously; any caching, retrying or timeout handling happens behind this trait.
pub trait Telemetry {
    fn is_reachable(&self, monitor: MonitorId) -> bool;
    fn uptime(&self, candidate: &CandidateId, scope: Scope) -> Option<f64>;
    fn performance(&self, candidate: &CandidateId, scope: Scope) -> Option<f64>;

    fn metric(&self, metric: Metric, candidate: &CandidateId, scope: Scope) -> Option<f64> {
        match metric {
            Metric::Uptime => self.uptime(candidate, scope),
            Metric::Performance => self.performance(candidate, scope),
        }
    }
}

impl<T: Telemetry + ?Sized> Telemetry for &T {
    fn is_reachable(&self, monitor: MonitorId) -> bool {
        (**self).is_reachable(monitor)
    }
    fn uptime(&self, candidate: &CandidateId, scope: Scope) -> Option<f64> {
        (**self).uptime(candidate, scope)
    }
    fn performance(&self, candidate: &CandidateId, scope: Scope) -> Option<f64> {
        (**self).performance(candidate, scope)
    }
}

/// Read `metric` for `candidate` from the most specific scope the request allows, falling back
/// to broader scopes while the value is missing or not finite.
pub fn scoped<T>(
    telemetry: &T,
    metric: Metric,
    candidate: &CandidateId,
    context: &RequestContext,
) -> Option<f64>
where
    T: Telemetry + ?Sized,
{
    Scope::fallback_chain(context)
        .into_iter()
        .find_map(|scope| finite(telemetry.metric(metric, candidate, scope)))
}

/// In-memory telemetry, for tests and offline simulation. Unknown monitors are unreachable and
/// unknown metrics are missing.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    monitors: BTreeMap<MonitorId, bool>,
    uptime: BTreeMap<(CandidateId, Scope), f64>,
    performance: BTreeMap<(CandidateId, Scope), f64>,
}

impl Snapshot {
    pub fn set_monitor(&mut self, monitor: MonitorId, up: bool) {
        self.monitors.insert(monitor, up);
    }

    pub fn set_metric(&mut self, metric: Metric, candidate: CandidateId, scope: Scope, value: f64) {
        let table = match metric {
            Metric::Uptime => &mut self.uptime,
            Metric::Performance => &mut self.performance,
        };
        table.insert((candidate, scope), value);
    }

    pub fn with_monitor(mut self, monitor: u32, up: bool) -> Self {
        self.set_monitor(MonitorId(monitor), up);
        self
    }

    pub fn with_uptime(mut self, candidate: &str, scope: Scope, value: f64) -> Self {
        self.set_metric(Metric::Uptime, candidate.into(), scope, value);
        self
    }

    pub fn with_performance(mut self, candidate: &str, scope: Scope, value: f64) -> Self {
        self.set_metric(Metric::Performance, candidate.into(), scope, value);
        self
    }
}

impl Telemetry for Snapshot {
    fn is_reachable(&self, monitor: MonitorId) -> bool {
        self.monitors.get(&monitor).copied().unwrap_or(false)
    }

    fn uptime(&self, candidate: &CandidateId, scope: Scope) -> Option<f64> {
        self.uptime.get(&(candidate.clone(), scope)).copied()
    }

    fn performance(&self, candidate: &CandidateId, scope: Scope) -> Option<f64> {
        self.performance.get(&(candidate.clone(), scope)).copied()
    }
}
