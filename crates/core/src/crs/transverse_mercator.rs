//! Pure-Rust Transverse Mercator projection (Snyder 1987, USGS formulas).
//!
//! Covers UTM zones and the national TM grids used for cadastral data
//! (Poland CS92 and CS2000). No external C dependencies (no libproj).

use geo_types::Coord;

use super::Ellipsoid;

/// UTM scale factor on the central meridian
pub const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Parameters of a Transverse Mercator grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    pub ellipsoid: Ellipsoid,
    /// Longitude of the central meridian (degrees)
    pub lon0: f64,
    /// Latitude of origin (degrees)
    pub lat0: f64,
    /// Scale factor on the central meridian
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl TransverseMercator {
    /// UTM zone `zone` (1-60) in the given hemisphere
    pub fn utm(ellipsoid: Ellipsoid, zone: u32, north: bool) -> Self {
        Self {
            ellipsoid,
            lon0: (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0,
            lat0: 0.0,
            k0: UTM_K0,
            false_easting: UTM_FALSE_EASTING,
            false_northing: if north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH },
        }
    }

    /// Convert (longitude, latitude) in degrees to (easting, northing) in metres.
    ///
    /// Layers are only ever unprojected, so this serves as the round-trip
    /// reference for `inverse`.
    #[cfg(test)]
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major;
        let e2 = self.ellipsoid.e2();
        let ep2 = self.ellipsoid.e_prime2();

        let lat = lat_deg.to_radians();
        let lon = lon_deg.to_radians();
        let lon0 = self.lon0.to_radians();

        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let tan_lat = lat.tan();

        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = ep2 * cos_lat * cos_lat;
        let a_coeff = cos_lat * (lon - lon0);

        let m = self.meridional_arc(lat);
        let m0 = self.meridional_arc(self.lat0.to_radians());

        let a2 = a_coeff * a_coeff;
        let a4 = a2 * a2;
        let a6 = a4 * a2;

        // Snyder eq. 8-9
        let easting = self.k0
            * n
            * (a_coeff
                + (1.0 - t + c) * a2 * a_coeff / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a4 * a_coeff / 120.0)
            + self.false_easting;

        // Snyder eq. 8-10
        let northing = self.k0
            * (m - m0
                + n * tan_lat
                    * (a2 / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0))
            + self.false_northing;

        (easting, northing)
    }

    /// Convert (easting, northing) in metres to (longitude, latitude) in degrees.
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major;
        let e2 = self.ellipsoid.e2();
        let ep2 = self.ellipsoid.e_prime2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        let x = easting - self.false_easting;
        let y = northing - self.false_northing;

        // Footpoint latitude (Snyder eq. 8-20, 7-19, 3-24, 3-26)
        let m = self.meridional_arc(self.lat0.to_radians()) + y / self.k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let sqrt_1_e2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
        let e1_2 = e1 * e1;
        let e1_3 = e1_2 * e1;
        let e1_4 = e1_3 * e1;

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

        let sin_phi1 = phi1.sin();
        let cos_phi1 = phi1.cos();
        let tan_phi1 = phi1.tan();
        let w = 1.0 - e2 * sin_phi1 * sin_phi1;

        let c1 = ep2 * cos_phi1 * cos_phi1;
        let t1 = tan_phi1 * tan_phi1;
        let n1 = a / w.sqrt();
        let r1 = a * (1.0 - e2) / w.powf(1.5);
        let d = x / (n1 * self.k0);

        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d3 * d;
        let d5 = d4 * d;
        let d6 = d5 * d;

        // Snyder eq. 8-17
        let lat = phi1
            - (n1 * tan_phi1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d6
                        / 720.0);

        // Snyder eq. 8-18
        let lon = self.lon0.to_radians()
            + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5
                    / 120.0)
                / cos_phi1;

        (lon.to_degrees(), lat.to_degrees())
    }

    /// Inverse projection of a single coordinate
    pub fn to_lon_lat(&self, c: Coord<f64>) -> Coord<f64> {
        let (lon, lat) = self.inverse(c.x, c.y);
        Coord { x: lon, y: lat }
    }

    /// Meridional arc from equator to latitude `lat` (radians).
    /// Snyder eq. 3-21.
    fn meridional_arc(&self, lat: f64) -> f64 {
        let a = self.ellipsoid.semi_major;
        let e2 = self.ellipsoid.e2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
    }
}
