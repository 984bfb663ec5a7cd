use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::location::{Asn, Continent, CountryCode, RequestContext};
use crate::num::Weight;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CandidateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Identifier of an external reachability monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub u32);

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a candidate may serve from. Each dimension is independent and `None` leaves that
/// dimension unrestricted. A dimension only excludes a candidate when the request's value for
/// it is known.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoRestriction {
    #[serde(default)]
    pub countries: Option<BTreeSet<CountryCode>>,
    #[serde(default, alias = "except_countries")]
    pub except_countries: Option<BTreeSet<CountryCode>>,
    #[serde(default)]
    pub continents: Option<BTreeSet<Continent>>,
    #[serde(default)]
    pub asns: Option<BTreeSet<Asn>>,
}

impl GeoRestriction {
    pub fn admits(&self, context: &RequestContext) -> bool {
        if let (Some(except), Some(country)) = (&self.except_countries, &context.country) {
            if except.contains(country) {
                return false;
            }
        }
        if let (Some(countries), Some(country)) = (&self.countries, &context.country) {
            if !countries.contains(country) {
                return false;
            }
        }
        if let (Some(continents), Some(continent)) = (&self.continents, &context.continent) {
            if !continents.contains(continent) {
                return false;
            }
        }
        if let (Some(asns), Some(asn)) = (&self.asns, &context.asn) {
            if !asns.contains(asn) {
                return false;
            }
        }
        true
    }
}

/// A steerable endpoint, answered as a CNAME to `target`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(alias = "name")]
    pub id: CandidateId,
    #[serde(alias = "cname")]
    pub target: String,
    #[serde(default)]
    pub weight: Weight,
    /// Bonus (negative) or penalty (positive) applied to the candidate's performance score.
    #[serde(default)]
    pub padding: f64,
    #[serde(default, alias = "ttl")]
    pub ttl_override: Option<u32>,
    #[serde(default, alias = "monitor")]
    pub monitor_id: Option<MonitorId>,
    #[serde(flatten)]
    pub restriction: GeoRestriction,
    #[serde(default, alias = "preferredMarkets")]
    pub market_multipliers: BTreeMap<Continent, Weight>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: CandidateId::new(id),
            target: target.into(),
            weight: Weight::ZERO,
            padding: 0.0,
            ttl_override: None,
            monitor_id: None,
            restriction: GeoRestriction::default(),
            market_multipliers: BTreeMap::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Weight::new(weight).unwrap_or_default();
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl_override = Some(ttl);
        self
    }

    pub fn with_monitor(mut self, monitor: u32) -> Self {
        self.monitor_id = Some(MonitorId(monitor));
        self
    }

    pub fn with_restriction(mut self, restriction: GeoRestriction) -> Self {
        self.restriction = restriction;
        self
    }

    pub fn with_market_multiplier(mut self, continent: Continent, multiplier: f64) -> Self {
        if let Some(multiplier) = Weight::new(multiplier) {
            self.market_multipliers.insert(continent, multiplier);
        }
        self
    }

    /// A TTL of zero is treated as unset.
    pub fn ttl_or(&self, default_ttl: u32) -> u32 {
        self.ttl_override.filter(|ttl| *ttl != 0).unwrap_or(default_ttl)
    }

    pub fn market_multiplier(&self, continent: Option<Continent>) -> Option<Weight> {
        self.market_multipliers.get(&continent?).copied()
    }
}

/// The validated, read-only set of candidates. Iteration follows configuration order, which
/// is also the tie-breaking order for every selection strategy.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    candidates: Vec<Candidate>,
    index: BTreeMap<CandidateId, usize>,
}

impl Catalog {
    pub fn new(candidates: Vec<Candidate>) -> Result<Self, ConfigError> {
        let mut index = BTreeMap::new();
        for (position, candidate) in candidates.iter().enumerate() {
            if candidate.target.trim().is_empty() {
                return Err(ConfigError::EmptyTarget {
                    id: candidate.id.clone(),
                });
            }
            if !candidate.padding.is_finite() {
                return Err(ConfigError::InvalidPadding {
                    id: candidate.id.clone(),
                });
            }
            if let Some((continent, _)) = candidate
                .market_multipliers
                .iter()
                .find(|(_, multiplier)| multiplier.is_zero())
            {
                return Err(ConfigError::InvalidMultiplier {
                    id: candidate.id.clone(),
                    continent: *continent,
                });
            }
            if index.insert(candidate.id.clone(), position).is_some() {
                return Err(ConfigError::DuplicateCandidate(candidate.id.clone()));
            }
        }
        // Any subset of weights then sums to a finite total as well.
        let total: Weight = candidates.iter().map(|c| c.weight).sum();
        if !total.as_f64().is_finite() {
            return Err(ConfigError::WeightOverflow);
        }
        Ok(Self { candidates, index })
    }

    pub fn get(&self, id: &CandidateId) -> Option<&Candidate> {
        self.index.get(id).map(|&position| &self.candidates[position])
    }

    pub fn contains(&self, id: &CandidateId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl<'c> IntoIterator for &'c Catalog {
    type Item = &'c Candidate;
    type IntoIter = std::slice::Iter<'c, Candidate>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ConfigError;

    fn country(code: &str) -> CountryCode {
        CountryCode::new(code).unwrap()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = Catalog::new(vec![
            Candidate::new("foo", "www.foo.com"),
            Candidate::new("foo", "www.bar.com"),
        ]);
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateCandidate(id)) if id.as_str() == "foo"
        ));
    }

    #[test]
    fn invalid_candidates_are_rejected() {
        let result = Catalog::new(vec![Candidate::new("foo", " ")]);
        assert!(matches!(result, Err(ConfigError::EmptyTarget { .. })));

        let candidate = Candidate::new("foo", "www.foo.com").with_padding(f64::NAN);
        let result = Catalog::new(vec![candidate]);
        assert!(matches!(result, Err(ConfigError::InvalidPadding { .. })));

        let candidate =
            Candidate::new("foo", "www.foo.com").with_market_multiplier(Continent::Europe, 0.0);
        let result = Catalog::new(vec![candidate]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidMultiplier {
                continent: Continent::Europe,
                ..
            })
        ));
    }

    #[test]
    fn total_weight_must_be_finite() {
        let result = Catalog::new(vec![
            Candidate::new("foo", "www.foo.com").with_weight(f64::MAX),
            Candidate::new("bar", "www.bar.com").with_weight(f64::MAX),
        ]);
        assert!(matches!(result, Err(ConfigError::WeightOverflow)));

        let catalog = Catalog::new(vec![
            Candidate::new("foo", "www.foo.com").with_weight(f64::MAX),
            Candidate::new("bar", "www.bar.com"),
        ]);
        assert!(catalog.is_ok());
    }

    #[test]
    fn lookup_and_order() {
        let catalog = Catalog::new(vec![
            Candidate::new("foo", "www.foo.com"),
            Candidate::new("bar", "www.bar.com"),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(&"bar".into()).map(|c| c.target.as_str()), Some("www.bar.com"));
        assert!(!catalog.contains(&"baz".into()));
        let ids: Vec<&str> = catalog.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["foo", "bar"]);
    }

    #[test]
    fn zero_ttl_is_unset() {
        assert_eq!(Candidate::new("a", "a").ttl_or(30), 30);
        assert_eq!(Candidate::new("a", "a").with_ttl(0).ttl_or(30), 30);
        assert_eq!(Candidate::new("a", "a").with_ttl(20).ttl_or(30), 20);
    }

    #[test]
    fn restrictions_only_bite_when_both_sides_are_known() {
        let restriction = GeoRestriction {
            countries: Some([country("UA")].into()),
            except_countries: Some([country("CN")].into()),
            continents: Some([Continent::Europe, Continent::NorthAmerica].into()),
            asns: Some([Asn(123), Asn(321)].into()),
        };
        assert!(restriction.admits(&RequestContext::default()));
        assert!(restriction.admits(&RequestContext::default().with_country(country("UA"))));
        assert!(!restriction.admits(&RequestContext::default().with_country(country("PL"))));
        assert!(!restriction.admits(&RequestContext::default().with_continent(Continent::Asia)));
        assert!(!restriction.admits(&RequestContext::default().with_asn(Asn(7))));
        assert!(restriction.admits(
            &RequestContext::default()
                .with_country(country("UA"))
                .with_continent(Continent::Europe)
                .with_asn(Asn(321))
        ));

        let except = GeoRestriction {
            except_countries: Some([country("CN")].into()),
            ..Default::default()
        };
        assert!(!except.admits(&RequestContext::default().with_country(country("CN"))));
        assert!(except.admits(&RequestContext::default().with_country(country("JP"))));
    }

    #[test]
    fn deserialize_legacy_field_names() {
        let candidate: Candidate = serde_json::from_str(
            r#"{
                "name": "fastly",
                "cname": "www.qux.com",
                "padding": 10,
                "ttl": 20,
                "monitor": 304,
                "except_countries": ["CN"],
                "preferredMarkets": {"EU": 1.3, "SA": 0.01}
            }"#,
        )
        .unwrap();
        assert_eq!(candidate.id.as_str(), "fastly");
        assert_eq!(candidate.target, "www.qux.com");
        assert_eq!(candidate.padding, 10.0);
        assert_eq!(candidate.ttl_override, Some(20));
        assert_eq!(candidate.monitor_id, Some(MonitorId(304)));
        assert_eq!(
            candidate.restriction.except_countries,
            Some([country("CN")].into())
        );
        assert_eq!(
            candidate.market_multiplier(Some(Continent::Europe)).map(|m| m.as_f64()),
            Some(1.3)
        );
        assert!(candidate.market_multiplier(None).is_none());
        assert!(candidate.weight.is_zero());
    }
}
