use crate::catalog::{Candidate, Catalog};
use crate::config::Policy;
use crate::location::RequestContext;
use crate::telemetry::{scoped, Metric, Telemetry};

/// Why a candidate was not admitted for a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exclusion {
    /// A country, continent, or ASN restriction rejects the request's location.
    Location,
    /// The candidate's monitor is down, or it has none and monitor data is required.
    Unhealthy,
    /// Uptime is missing or not above the availability threshold.
    Unavailable,
}

/// Reduce the catalog to the candidates admissible for `context`, in catalog order.
pub fn filter<'c, T>(
    catalog: &'c Catalog,
    context: &RequestContext,
    policy: &Policy,
    telemetry: &T,
) -> Vec<&'c Candidate>
where
    T: Telemetry + ?Sized,
{
    catalog
        .iter()
        .filter(|candidate| match admit(candidate, context, policy, telemetry) {
            Ok(()) => true,
            Err(reason) => {
                tracing::trace!(candidate = %candidate.id, ?reason, "candidate excluded");
                false
            }
        })
        .collect()
}

/// Checks are applied cheapest first: location, then monitor state, then RUM uptime.
pub fn admit<T>(
    candidate: &Candidate,
    context: &RequestContext,
    policy: &Policy,
    telemetry: &T,
) -> Result<(), Exclusion>
where
    T: Telemetry + ?Sized,
{
    if !candidate.restriction.admits(context) {
        return Err(Exclusion::Location);
    }
    if !is_healthy(candidate, policy.require_monitor_data, telemetry) {
        return Err(Exclusion::Unhealthy);
    }
    let uptime = scoped(telemetry, Metric::Uptime, &candidate.id, context);
    match uptime {
        Some(uptime) if uptime > policy.availability_threshold.as_f64() => Ok(()),
        _ => Err(Exclusion::Unavailable),
    }
}

pub fn is_healthy<T>(candidate: &Candidate, require_monitor_data: bool, telemetry: &T) -> bool
where
    T: Telemetry + ?Sized,
{
    match candidate.monitor_id {
        Some(monitor) => telemetry.is_reachable(monitor),
        None => !require_monitor_data,
    }
}

#[cfg(test)]
mod test {
    use super::{admit, filter, Exclusion};
    use crate::catalog::{Candidate, Catalog, GeoRestriction};
    use crate::config::Policy;
    use crate::location::{Continent, CountryCode, RequestContext};
    use crate::num::Percentage;
    use crate::telemetry::{Scope, Snapshot};

    fn policy(threshold: f64) -> Policy {
        let mut policy = Policy::new(20);
        policy.availability_threshold = Percentage::new(threshold).unwrap();
        policy
    }

    #[test]
    fn health_rules() {
        let telemetry = Snapshot::default()
            .with_monitor(1, true)
            .with_monitor(2, false)
            .with_uptime("up", Scope::Global, 100.0)
            .with_uptime("down", Scope::Global, 100.0)
            .with_uptime("unmonitored", Scope::Global, 100.0);
        let up = Candidate::new("up", "up.example").with_monitor(1);
        let down = Candidate::new("down", "down.example").with_monitor(2);
        let unmonitored = Candidate::new("unmonitored", "unmonitored.example");
        let context = RequestContext::default();

        let mut policy = policy(90.0);
        assert_eq!(admit(&up, &context, &policy, &telemetry), Ok(()));
        assert_eq!(admit(&down, &context, &policy, &telemetry), Err(Exclusion::Unhealthy));
        assert_eq!(admit(&unmonitored, &context, &policy, &telemetry), Ok(()));

        policy.require_monitor_data = true;
        assert_eq!(
            admit(&unmonitored, &context, &policy, &telemetry),
            Err(Exclusion::Unhealthy)
        );
    }

    #[test]
    fn availability_is_strictly_above_threshold() {
        let pl = CountryCode::new("PL").unwrap();
        let telemetry = Snapshot::default()
            .with_uptime("a", Scope::Global, 90.0)
            .with_uptime("a", Scope::Country(pl), 95.0)
            .with_uptime("b", Scope::Global, 90.5);
        let a = Candidate::new("a", "a.example");
        let b = Candidate::new("b", "b.example");
        let c = Candidate::new("c", "c.example");
        let policy = policy(90.0);

        let global = RequestContext::default();
        assert_eq!(admit(&a, &global, &policy, &telemetry), Err(Exclusion::Unavailable));
        assert_eq!(admit(&b, &global, &policy, &telemetry), Ok(()));
        assert_eq!(admit(&c, &global, &policy, &telemetry), Err(Exclusion::Unavailable));

        let poland = RequestContext::default().with_country(pl);
        assert_eq!(admit(&a, &poland, &policy, &telemetry), Ok(()));
        assert_eq!(admit(&b, &poland, &policy, &telemetry), Ok(()));
    }

    #[test]
    fn nan_uptime_is_unavailable() {
        let telemetry = Snapshot::default().with_uptime("a", Scope::Global, f64::NAN);
        let a = Candidate::new("a", "a.example");
        assert_eq!(
            admit(&a, &RequestContext::default(), &policy(0.0), &telemetry),
            Err(Exclusion::Unavailable)
        );
    }

    #[test]
    fn filter_keeps_catalog_order() {
        let ua = CountryCode::new("UA").unwrap();
        let catalog = Catalog::new(vec![
            Candidate::new("belugacdn", "www.foo.com").with_restriction(GeoRestriction {
                countries: Some([ua].into()),
                ..Default::default()
            }),
            Candidate::new("ovh-cdn", "www.bar.com").with_restriction(GeoRestriction {
                continents: Some([Continent::NorthAmerica, Continent::Europe].into()),
                ..Default::default()
            }),
            Candidate::new("fastly", "www.qux.com").with_restriction(GeoRestriction {
                except_countries: Some([CountryCode::new("CN").unwrap()].into()),
                ..Default::default()
            }),
        ])
        .unwrap();
        let telemetry = ["belugacdn", "ovh-cdn", "fastly"]
            .into_iter()
            .fold(Snapshot::default(), |t, id| t.with_uptime(id, Scope::Global, 99.0));
        let policy = policy(90.0);

        let ids = |context: RequestContext| -> Vec<String> {
            filter(&catalog, &context, &policy, &telemetry)
                .into_iter()
                .map(|c| c.id.to_string())
                .collect()
        };
        assert_eq!(ids(RequestContext::default()), ["belugacdn", "ovh-cdn", "fastly"]);
        assert_eq!(
            ids(RequestContext::default()
                .with_country(ua)
                .with_continent(Continent::Europe)),
            ["belugacdn", "ovh-cdn", "fastly"]
        );
        assert_eq!(
            ids(RequestContext::default()
                .with_country(CountryCode::new("CN").unwrap())
                .with_continent(Continent::Asia)),
            Vec::<String>::new()
        );
        assert_eq!(
            ids(RequestContext::default()
                .with_country(CountryCode::new("US").unwrap())
                .with_continent(Continent::NorthAmerica)),
            ["ovh-cdn", "fastly"]
        );
    }
}
