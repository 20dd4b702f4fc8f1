//! Reference ellipsoids for geodesic measurement

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A reference ellipsoid given by semi-major axis and flattening
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ellipsoid {
    /// Semi-major axis (m)
    pub semi_major: f64,
    /// Flattening
    pub flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid::from_inverse_flattening(6_378_137.0, 298.257_223_563);
    pub const GRS80: Ellipsoid = Ellipsoid::from_inverse_flattening(6_378_137.0, 298.257_222_101);
    pub const BESSEL_1841: Ellipsoid = Ellipsoid::from_inverse_flattening(6_377_397.155, 299.152_812_8);
    pub const KRASSOWSKY_1940: Ellipsoid = Ellipsoid::from_inverse_flattening(6_378_245.0, 298.3);
    pub const INTERNATIONAL_1924: Ellipsoid = Ellipsoid::from_inverse_flattening(6_378_388.0, 297.0);
    pub const CLARKE_1866: Ellipsoid = Ellipsoid::from_inverse_flattening(6_378_206.4, 294.978_698_2);

    const PRESETS: [(&'static str, &'static str, Ellipsoid); 6] = [
        ("WGS84", "EPSG:7030", Ellipsoid::WGS84),
        ("GRS80", "EPSG:7019", Ellipsoid::GRS80),
        ("bessel", "EPSG:7004", Ellipsoid::BESSEL_1841),
        ("krass", "EPSG:7024", Ellipsoid::KRASSOWSKY_1940),
        ("intl", "EPSG:7022", Ellipsoid::INTERNATIONAL_1924),
        ("clrk66", "EPSG:7008", Ellipsoid::CLARKE_1866),
    ];

    pub const fn from_inverse_flattening(semi_major: f64, inverse_flattening: f64) -> Self {
        Self {
            semi_major,
            flattening: 1.0 / inverse_flattening,
        }
    }

    /// Ellipsoid from semi-major and semi-minor axes
    pub fn from_axes(semi_major: f64, semi_minor: f64) -> Self {
        Self {
            semi_major,
            flattening: (semi_major - semi_minor) / semi_major,
        }
    }

    pub fn semi_minor(&self) -> f64 {
        self.semi_major * (1.0 - self.flattening)
    }

    /// First eccentricity squared
    pub fn e2(&self) -> f64 {
        2.0 * self.flattening - self.flattening * self.flattening
    }

    /// Second eccentricity squared
    pub fn e_prime2(&self) -> f64 {
        let e2 = self.e2();
        e2 / (1.0 - e2)
    }

    /// Preset acronym if this ellipsoid is one of the known presets
    pub fn acronym(&self) -> Option<&'static str> {
        Self::PRESETS
            .iter()
            .find(|(_, _, e)| e == self)
            .map(|(name, _, _)| *name)
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Ellipsoid::WGS84
    }
}

impl FromStr for Ellipsoid {
    type Err = Error;

    /// Parse a preset acronym (`WGS84`, `GRS80`, ...), its EPSG code, or the
    /// `PARAMETER:<semi-major>:<semi-minor>` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = |reason: &str| Error::InvalidParameter {
            name: "ellipsoid",
            value: s.to_string(),
            reason: reason.to_string(),
        };

        if let Some(rest) = trimmed
            .strip_prefix("PARAMETER:")
            .or_else(|| trimmed.strip_prefix("parameter:"))
        {
            let (a, b) = rest
                .split_once(':')
                .ok_or_else(|| invalid("expected PARAMETER:<semi-major>:<semi-minor>"))?;
            let a: f64 = a.trim().parse().map_err(|_| invalid("semi-major is not a number"))?;
            let b: f64 = b.trim().parse().map_err(|_| invalid("semi-minor is not a number"))?;
            if !(a > 0.0 && b > 0.0 && b <= a) {
                return Err(invalid("axes must be positive with semi-minor <= semi-major"));
            }
            return Ok(Ellipsoid::from_axes(a, b));
        }

        Self::PRESETS
            .iter()
            .find(|(name, epsg, _)| {
                name.eq_ignore_ascii_case(trimmed) || epsg.eq_ignore_ascii_case(trimmed)
            })
            .map(|(_, _, e)| *e)
            .ok_or_else(|| invalid("unknown ellipsoid"))
    }
}

impl fmt::Display for Ellipsoid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.acronym() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "PARAMETER:{}:{}", self.semi_major, self.semi_minor()),
        }
    }
}

impl TryFrom<String> for Ellipsoid {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ellipsoid> for String {
    fn from(e: Ellipsoid) -> Self {
        e.to_string()
    }
}
