use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// ISO 3166-1 alpha-2 country code, stored upper-case.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    pub fn new(code: &str) -> Option<Self> {
        match code.as_bytes() {
            &[a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                Some(Self([a.to_ascii_uppercase(), b.to_ascii_uppercase()]))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        // Both bytes are ASCII letters by construction.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for CountryCode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or_else(|| format!("invalid country code {s:?}"))
    }
}

impl TryFrom<String> for CountryCode {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum Continent {
    #[serde(rename = "AF")]
    Africa,
    #[serde(rename = "AN")]
    Antarctica,
    #[serde(rename = "AS")]
    Asia,
    #[serde(rename = "EU")]
    Europe,
    #[serde(rename = "NA")]
    NorthAmerica,
    #[serde(rename = "OC")]
    Oceania,
    #[serde(rename = "SA")]
    SouthAmerica,
}

impl Continent {
    pub const ALL: [Continent; 7] = [
        Continent::Africa,
        Continent::Antarctica,
        Continent::Asia,
        Continent::Europe,
        Continent::NorthAmerica,
        Continent::Oceania,
        Continent::SouthAmerica,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Continent::Africa => "AF",
            Continent::Antarctica => "AN",
            Continent::Asia => "AS",
            Continent::Europe => "EU",
            Continent::NorthAmerica => "NA",
            Continent::Oceania => "OC",
            Continent::SouthAmerica => "SA",
        }
    }
}

impl FromStr for Continent {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Continent::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid continent code {s:?}"))
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Autonomous system number of the resolver's subnet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct Asn(pub u32);

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

/// What the host knows about the client behind a resolution request. Every dimension is
/// optional: geo lookups fail, and ASN data is only present with EDNS client subnet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub country: Option<CountryCode>,
    pub continent: Option<Continent>,
    pub asn: Option<Asn>,
}

impl RequestContext {
    pub fn with_country(mut self, country: CountryCode) -> Self {
        self.country = Some(country);
        self
    }

    pub fn with_continent(mut self, continent: Continent) -> Self {
        self.continent = Some(continent);
        self
    }

    pub fn with_asn(mut self, asn: Asn) -> Self {
        self.asn = Some(asn);
        self
    }
}

#[cfg(test)]
mod test {
    use super::{Asn, Continent, CountryCode};
    use std::collections::BTreeMap;

    #[test]
    fn country_codes_are_normalized() {
        assert_eq!(CountryCode::new("pl"), CountryCode::new("PL"));
        assert_eq!(CountryCode::new("pl").unwrap().as_str(), "PL");
        assert!(CountryCode::new("POL").is_none());
        assert!(CountryCode::new("P1").is_none());
        assert!(CountryCode::new("").is_none());
    }

    #[test]
    fn continent_codes() {
        assert_eq!("eu".parse::<Continent>(), Ok(Continent::Europe));
        assert!("XX".parse::<Continent>().is_err());
        for continent in Continent::ALL {
            assert_eq!(continent.code().parse::<Continent>(), Ok(continent));
        }
    }

    #[test]
    fn codes_deserialize_as_map_keys() {
        let countries: BTreeMap<CountryCode, u8> = serde_json::from_str(r#"{"ua": 1}"#).unwrap();
        assert_eq!(countries[&CountryCode::new("UA").unwrap()], 1);
        let continents: BTreeMap<Continent, u8> = serde_json::from_str(r#"{"OC": 2}"#).unwrap();
        assert_eq!(continents[&Continent::Oceania], 2);
        let asns: BTreeMap<Asn, u8> = serde_json::from_str(r#"{"123": 3}"#).unwrap();
        assert_eq!(asns[&Asn(123)], 3);
        assert!(serde_json::from_str::<BTreeMap<CountryCode, u8>>(r#"{"USA": 1}"#).is_err());
    }
}
