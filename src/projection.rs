//! # Geostationary Projection
//!
//! Transforms from geographic coordinates to the
//! fixed-grid coordinates of a geostationary imager. Scan angles are radians
//! from nadir; the grid works in metres, i.e. scan angle multiplied by the
//! perspective-point height, which is what `+proj=geos ... +units=m` expects.
//!
//! Reference: GOES-R Product Definition and Users' Guide (PUG) Volume 4,
//! Section 4.2.8.

use std::fmt;
use std::str::FromStr;

/// Axis the instrument sweeps along.
///
/// GOES-R uses `x`; Meteosat and Himawari use `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAxis {
    X,
    Y,
}

impl FromStr for SweepAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x" | "X" => Ok(SweepAxis::X),
            "y" | "Y" => Ok(SweepAxis::Y),
            other => Err(format!("unknown sweep angle axis '{}'", other)),
        }
    }
}

impl fmt::Display for SweepAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepAxis::X => write!(f, "x"),
            SweepAxis::Y => write!(f, "y"),
        }
    }
}

/// Geostationary projection parameters as stored in `goes_imager_projection`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeosProjection {
    /// Satellite height above the ellipsoid surface (metres)
    pub perspective_point_height: f64,
    /// Longitude of the sub-satellite point (degrees)
    pub longitude_of_projection_origin: f64,
    pub sweep_angle_axis: SweepAxis,
    /// Equatorial radius (metres)
    pub semi_major_axis: f64,
    /// Polar radius (metres)
    pub semi_minor_axis: f64,
}

impl GeosProjection {
    /// GOES-18 (GOES-West) nominal parameters.
    pub fn goes18() -> Self {
        Self {
            perspective_point_height: 35786023.0,
            longitude_of_projection_origin: -137.0,
            sweep_angle_axis: SweepAxis::X,
            semi_major_axis: 6378137.0,
            semi_minor_axis: 6356752.31414,
        }
    }

    /// PROJ string describing this coordinate reference system.
    ///
    /// ```rust
    /// use goes2json::projection::GeosProjection;
    ///
    /// let crs = GeosProjection::goes18().to_proj4();
    /// assert_eq!(
    ///     crs,
    ///     "+proj=geos +h=35786023 +lon_0=-137 +sweep=x +a=6378137 +b=6356752.31414 +units=m"
    /// );
    /// ```
    pub fn to_proj4(&self) -> String {
        format!(
            "+proj=geos +h={} +lon_0={} +sweep={} +a={} +b={} +units=m",
            self.perspective_point_height,
            self.longitude_of_projection_origin,
            self.sweep_angle_axis,
            self.semi_major_axis,
            self.semi_minor_axis,
        )
    }

    /// Distance from the Earth's centre to the satellite (metres)
    fn orbit_radius(&self) -> f64 {
        self.perspective_point_height + self.semi_major_axis
    }

    /// Projects a geographic point to scan angles (radians).
    ///
    /// Returns `None` when the point is on the far side of the Earth.
    pub fn geo_to_scan(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let req = self.semi_major_axis;
        let rpol = self.semi_minor_axis;
        let h = self.orbit_radius();

        let lat = lat_deg.to_radians();
        let dlon = (lon_deg - self.longitude_of_projection_origin).to_radians();

        // Geocentric latitude and distance to the surface point
        let phi_c = ((rpol / req).powi(2) * lat.tan()).atan();
        let e2 = 1.0 - (rpol / req).powi(2);
        let rc = rpol / (1.0 - e2 * phi_c.cos().powi(2)).sqrt();

        let sx = h - rc * phi_c.cos() * dlon.cos();
        let sy = -rc * phi_c.cos() * dlon.sin();
        let sz = rc * phi_c.sin();

        // Line of sight must not cross the ellipsoid before the point
        if h * (h - sx) < sy * sy + (req / rpol).powi(2) * sz * sz {
            return None;
        }

        let angles = match self.sweep_angle_axis {
            SweepAxis::X => ((-sy / (sx * sx + sy * sy + sz * sz).sqrt()).asin(), (sz / sx).atan()),
            SweepAxis::Y => ((-sy / sx).atan(), (sz / sx.hypot(sy)).atan()),
        };
        Some(angles)
    }

    /// Inverse of [`geo_to_scan`](Self::geo_to_scan), used to check the
    /// forward transform.
    ///
    /// Returns `(lon, lat)` in degrees, or `None` when the line of sight
    /// misses the Earth.
    #[cfg(test)]
    fn scan_to_geo(&self, x_rad: f64, y_rad: f64) -> Option<(f64, f64)> {
        let req = self.semi_major_axis;
        let rpol = self.semi_minor_axis;
        let h = self.orbit_radius();
        let flat = (req / rpol).powi(2);

        // Unit line-of-sight vector in the satellite frame
        let (dx, dy, dz) = match self.sweep_angle_axis {
            SweepAxis::X => (
                x_rad.cos() * y_rad.cos(),
                -x_rad.sin(),
                x_rad.cos() * y_rad.sin(),
            ),
            SweepAxis::Y => (
                x_rad.cos() * y_rad.cos(),
                -x_rad.sin() * y_rad.cos(),
                y_rad.sin(),
            ),
        };

        let a = dx * dx + dy * dy + flat * dz * dz;
        let b = -2.0 * h * dx;
        let c = h * h - req * req;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let rs = (-b - discriminant.sqrt()) / (2.0 * a);
        let sx = rs * dx;
        let sy = rs * dy;
        let sz = rs * dz;

        let lat = (flat * sz / (h - sx).hypot(sy)).atan();
        let lon = self.longitude_of_projection_origin.to_radians() - sy.atan2(h - sx);

        Some((lon.to_degrees(), lat.to_degrees()))
    }

    /// Projects a geographic point to fixed-grid metres.
    pub fn geo_to_metric(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let (x, y) = self.geo_to_scan(lon_deg, lat_deg)?;
        Some((
            x * self.perspective_point_height,
            y * self.perspective_point_height,
        ))
    }
}
