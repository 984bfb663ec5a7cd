use crate::catalog::CandidateId;
use crate::location::{Asn, Continent, CountryCode};

/// Configuration that cannot be turned into an [`Engine`](crate::Engine) at all.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("candidate {0} is defined more than once")]
    DuplicateCandidate(CandidateId),
    #[error("candidate {id} has a non-finite padding")]
    InvalidPadding { id: CandidateId },
    #[error("candidate {id} has a non-positive market multiplier for {continent}")]
    InvalidMultiplier { id: CandidateId, continent: Continent },
    #[error("candidate weights do not sum to a finite total")]
    WeightOverflow,
    #[error("candidate {id} has an empty target")]
    EmptyTarget { id: CandidateId },
    #[error("scoring profile {0:?} is not defined")]
    UnknownProfile(String),
}

/// A configuration problem observed while deciding a request. Faults never abort a decision;
/// they are attached to it and logged so that operators can fix the configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigFault {
    #[error("the candidate catalog is empty")]
    EmptyCatalog,
    #[error("default candidate {0} is not in the catalog")]
    MissingDefault(CandidateId),
    #[error("country override for {country} points at unknown candidate {id}")]
    DanglingCountryOverride { country: CountryCode, id: CandidateId },
    #[error("continent override for {continent} points at unknown candidate {id}")]
    DanglingContinentOverride { continent: Continent, id: CandidateId },
    #[error("ASN override for {asn} points at unknown candidate {id}")]
    DanglingAsnOverride { asn: Asn, id: CandidateId },
    #[error("answer set for {country} lists unknown candidate {id}")]
    DanglingAnswerSetEntry { country: CountryCode, id: CandidateId },
}
