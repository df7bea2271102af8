use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A work location where check-in and check-out are accepted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Site {
    #[schema(example = "MNC Tower")]
    pub name: String,
    #[schema(example = -6.1840816)]
    pub latitude: f64,
    #[schema(example = 106.8266783)]
    pub longitude: f64,
    /// Accepted distance from the site centre, in kilometres.
    #[schema(example = 0.5)]
    pub radius_km: f64,
    #[serde(default)]
    pub address: String,
}

impl Site {
    fn new(name: &str, latitude: f64, longitude: f64, radius_km: f64, address: &str) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
            radius_km,
            address: address.to_string(),
        }
    }
}

/// Sites used when `ATTENDANCE_SITES` is not configured.
pub fn default_sites() -> Vec<Site> {
    vec![
        Site::new(
            "MNC Tower",
            -6.1840816,
            106.8266783,
            0.5,
            "Jl. Kebon Sirih No.Kav. 17-19, Menteng, Jakarta Pusat 10340",
        ),
        Site::new(
            "iNews Tower",
            -6.1849557,
            106.8292002,
            0.5,
            "Jl. K.H. Wahid Hasyim No.36-38, Menteng, Jakarta Pusat 10340",
        ),
        Site::new(
            "MNC University",
            -6.1641491,
            106.7601071,
            0.5,
            "Jl. Panjang Blok A8, Kedoya Utara, Kebon Jeruk, Jakarta Barat 11520",
        ),
    ]
}
