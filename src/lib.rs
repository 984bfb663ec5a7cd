pub mod catalog;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod location;
pub mod num;
pub mod overrides;
pub mod pipeline;
pub mod strategy;
pub mod telemetry;

pub use crate::catalog::{Candidate, CandidateId, Catalog, GeoRestriction, MonitorId};
pub use crate::config::{CatalogFallback, Config, PaddingMode, Policy};
pub use crate::error::{ConfigError, ConfigFault};
pub use crate::location::{Asn, Continent, CountryCode, RequestContext};
pub use crate::num::{Percentage, Weight};
pub use crate::pipeline::{Decision, Engine, Stage};
pub use crate::strategy::{RandomSource, Scoring, Strategy};
pub use crate::telemetry::{Metric, Scope, Snapshot, Telemetry};
