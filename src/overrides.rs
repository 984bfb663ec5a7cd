use std::collections::BTreeMap;

use crate::catalog::{Candidate, CandidateId, Catalog};
use crate::config::Policy;
use crate::error::ConfigFault;
use crate::location::{Asn, Continent, CountryCode, RequestContext};

/// A request dimension that static override tables are keyed by.
pub trait OverrideKey: Ord + Copy {
    fn dangling(self, id: CandidateId) -> ConfigFault;
}

impl OverrideKey for CountryCode {
    fn dangling(self, id: CandidateId) -> ConfigFault {
        ConfigFault::DanglingCountryOverride { country: self, id }
    }
}

impl OverrideKey for Continent {
    fn dangling(self, id: CandidateId) -> ConfigFault {
        ConfigFault::DanglingContinentOverride {
            continent: self,
            id,
        }
    }
}

impl OverrideKey for Asn {
    fn dangling(self, id: CandidateId) -> ConfigFault {
        ConfigFault::DanglingAsnOverride { asn: self, id }
    }
}

/// Look `key` up in `map` and resolve the mapped id against the catalog. A key without an
/// entry is simply unresolved; an entry naming an unknown candidate is a fault.
pub fn resolve<'c, K>(
    map: &BTreeMap<K, CandidateId>,
    key: K,
    catalog: &'c Catalog,
) -> Result<Option<&'c Candidate>, ConfigFault>
where
    K: OverrideKey,
{
    let Some(id) = map.get(&key) else {
        return Ok(None);
    };
    catalog
        .get(id)
        .map(Some)
        .ok_or_else(|| key.dangling(id.clone()))
}

/// Like [`resolve`], but faults are recorded and treated as unresolved.
fn resolve_or_record<'c, K>(
    map: &BTreeMap<K, CandidateId>,
    key: Option<K>,
    catalog: &'c Catalog,
    faults: &mut Vec<ConfigFault>,
) -> Option<&'c Candidate>
where
    K: OverrideKey,
{
    match resolve(map, key?, catalog) {
        Ok(candidate) => candidate,
        Err(fault) => {
            record(faults, fault);
            None
        }
    }
}

/// The geo lookup may run twice per request, so each fault is kept once.
pub(crate) fn record(faults: &mut Vec<ConfigFault>, fault: ConfigFault) {
    if !faults.contains(&fault) {
        tracing::warn!(%fault, "configuration fault");
        faults.push(fault);
    }
}

/// Country override, else continent override.
pub fn geo<'c>(
    policy: &Policy,
    context: &RequestContext,
    catalog: &'c Catalog,
    faults: &mut Vec<ConfigFault>,
) -> Option<&'c Candidate> {
    resolve_or_record(&policy.country_overrides, context.country, catalog, faults).or_else(|| {
        resolve_or_record(&policy.continent_overrides, context.continent, catalog, faults)
    })
}

pub fn asn<'c>(
    policy: &Policy,
    context: &RequestContext,
    catalog: &'c Catalog,
    faults: &mut Vec<ConfigFault>,
) -> Option<&'c Candidate> {
    resolve_or_record(&policy.asn_overrides, context.asn, catalog, faults)
}

/// Members of the answer set for `country`, in catalog order. Returns `None` when the country
/// has no answer set at all.
pub fn answer_set<'c>(
    policy: &Policy,
    country: Option<CountryCode>,
    catalog: &'c Catalog,
    faults: &mut Vec<ConfigFault>,
) -> Option<Vec<&'c Candidate>> {
    let country = country?;
    let ids = policy.country_answer_sets.get(&country)?;
    for id in ids.iter().filter(|id| !catalog.contains(id)) {
        let fault = ConfigFault::DanglingAnswerSetEntry {
            country,
            id: id.clone(),
        };
        record(faults, fault);
    }
    Some(
        catalog
            .iter()
            .filter(|candidate| ids.contains(&candidate.id))
            .collect(),
    )
}
