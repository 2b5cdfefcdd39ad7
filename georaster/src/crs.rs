use std::{fmt, str::FromStr};

/// Coordinate reference system, identified by EPSG code.
///
/// Only identity is tracked. Nothing in this workspace reprojects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Crs {
    Epsg(u16),
    #[default]
    Unknown,
}

impl Crs {
    pub const WGS84: Crs = Crs::Epsg(4326);

    pub fn epsg(&self) -> Option<u16> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Unknown => None,
        }
    }

    /// Returns `false` only when both sides are known and differ.
    pub fn is_compatible(&self, other: &Crs) -> bool {
        match (self, other) {
            (Crs::Epsg(a), Crs::Epsg(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a valid CRS identifier '{0}'")]
pub struct ParseCrsError(String);

impl FromStr for Crs {
    type Err = ParseCrsError;

    /// Accepts `4326`, `EPSG:4326`, and the OGC URN
    /// `urn:ogc:def:crs:EPSG::4326`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mk_err = || ParseCrsError(s.to_owned());
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unknown") {
            return Ok(Crs::Unknown);
        }
        let code = trimmed
            .rsplit(':')
            .next()
            .filter(|code| !code.is_empty())
            .ok_or_else(mk_err)?;
        let prefix = &trimmed[..trimmed.len() - code.len()];
        let prefix_ok = prefix.is_empty()
            || prefix.eq_ignore_ascii_case("epsg:")
            || prefix.eq_ignore_ascii_case("urn:ogc:def:crs:epsg::");
        if !prefix_ok {
            return Err(mk_err());
        }
        code.parse::<u16>().map(Crs::Epsg).map_err(|_| mk_err())
    }
}
