use crate::{error::NearestSite, model::site::Site};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates (haversine).
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Checks coordinates against the configured work sites.
#[derive(Debug, Clone)]
pub struct GeoValidator {
    sites: Vec<Site>,
}

impl GeoValidator {
    pub fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Name of the first site whose radius covers the point.
    pub fn validate(&self, latitude: f64, longitude: f64) -> Option<&str> {
        self.sites
            .iter()
            .find(|s| distance_km(latitude, longitude, s.latitude, s.longitude) <= s.radius_km)
            .map(|s| s.name.as_str())
    }

    /// Closest site regardless of radius.
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Option<NearestSite> {
        self.sites
            .iter()
            .map(|s| (s, distance_km(latitude, longitude, s.latitude, s.longitude)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(site, distance)| NearestSite {
                name: site.name.clone(),
                distance_km: (distance * 100.0).round() / 100.0,
                latitude: site.latitude,
                longitude: site.longitude,
                radius_km: site.radius_km,
                address: site.address.clone(),
            })
    }
}
