//! Equatorial → galactic coordinate conversion seam.
//!
//! The engine never stores equatorial values; sources that report RA/Dec get
//! converted at normalization time through this trait so the rotation itself
//! stays a swappable collaborator.

/// Converts ICRS right ascension / declination (degrees) into galactic
/// longitude / latitude (degrees).
pub trait EquatorialToGalactic: Send + Sync {
    fn to_galactic(&self, ra_deg: f64, dec_deg: f64) -> (f64, f64);
}

/// Fixed ICRS → galactic rotation (IAU 1958 galactic frame, J2000 equinox).
pub struct IcrsRotation;

// Rows of the ICRS→galactic rotation matrix.
const R: [[f64; 3]; 3] = [
    [-0.0548755604162154, -0.8734370902348850, -0.4838350155487132],
    [0.4941094278755837, -0.4448296299600112, 0.7469822444972189],
    [-0.8676661490190047, -0.1980763734312015, 0.4559837761750669],
];

impl EquatorialToGalactic for IcrsRotation {
    fn to_galactic(&self, ra_deg: f64, dec_deg: f64) -> (f64, f64) {
        let ra = ra_deg.to_radians();
        let dec = dec_deg.to_radians();

        let v = [dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin()];
        let x = R[0][0] * v[0] + R[0][1] * v[1] + R[0][2] * v[2];
        let y = R[1][0] * v[0] + R[1][1] * v[1] + R[1][2] * v[2];
        let z = R[2][0] * v[0] + R[2][1] * v[1] + R[2][2] * v[2];

        let lon = y.atan2(x).to_degrees().rem_euclid(360.0);
        let lat = z.clamp(-1.0, 1.0).asin().to_degrees();
        (lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn galactic_center() {
        let (lon, lat) = IcrsRotation.to_galactic(266.40499, -28.93617);
        let lon_off = lon.min(360.0 - lon);
        assert!(lon_off < 0.1, "lon {lon}");
        assert!(lat.abs() < 0.1, "lat {lat}");
    }

    #[test]
    fn north_galactic_pole() {
        let (_, lat) = IcrsRotation.to_galactic(192.85948, 27.12825);
        assert!((lat - 90.0).abs() < 1e-3, "lat {lat}");
    }

    #[test]
    fn longitude_in_range() {
        for ra in [0.0, 90.0, 180.0, 270.0, 359.9] {
            let (lon, lat) = IcrsRotation.to_galactic(ra, -45.0);
            assert!((0.0..360.0).contains(&lon));
            assert!((-90.0..=90.0).contains(&lat));
        }
    }
}
