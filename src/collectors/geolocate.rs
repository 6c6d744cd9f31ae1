//! External geolocation integration point.
//!
//! Cell-tower and Wi-Fi evidence only yields a position after a third-party
//! database lookup. No service is bundled: callers opt in by enabling
//! external lookup *and* supplying a [`Geolocator`]. Every position obtained
//! this way is marked as inferred.

use super::cell_tower::CellTower;
use super::wifi::AccessPoint;
use anyhow::Result;

/// A position returned by a geolocation service.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Service-reported radius in meters.
    pub accuracy_meters: Option<f64>,
    /// Name of the service that answered.
    pub service: String,
}

/// Resolves radio identifiers to approximate positions.
pub trait Geolocator: Send + Sync {
    /// Locate a serving or neighbouring cell tower.
    fn locate_cell(&self, tower: &CellTower) -> Result<Option<GeoFix>>;

    /// Locate a device from the strongest visible access points.
    fn locate_wifi(&self, access_points: &[AccessPoint]) -> Result<Option<GeoFix>>;
}

pub const CELL_INFERENCE_METHOD: &str = "cell_tower_geolocation";
pub const CELL_INFERENCE_RISK: &str = "Position is the registered location of the serving tower, \
    not the device; actual error can reach several kilometres and depends on the external database";

pub const WIFI_INFERENCE_METHOD: &str = "wifi_bssid_geolocation";
pub const WIFI_INFERENCE_RISK: &str = "Position is estimated from third-party access point \
    records; relocated or mobile access points produce confidently wrong results";

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Geolocator answering every query with a fixed position.
    pub struct FixedGeolocator {
        pub fix: Option<GeoFix>,
    }

    impl FixedGeolocator {
        pub fn at(latitude: f64, longitude: f64) -> Self {
            Self {
                fix: Some(GeoFix {
                    latitude,
                    longitude,
                    accuracy_meters: Some(1500.0),
                    service: "fixed".to_string(),
                }),
            }
        }
    }

    impl Geolocator for FixedGeolocator {
        fn locate_cell(&self, _tower: &CellTower) -> Result<Option<GeoFix>> {
            Ok(self.fix.clone())
        }

        fn locate_wifi(&self, _access_points: &[AccessPoint]) -> Result<Option<GeoFix>> {
            Ok(self.fix.clone())
        }
    }
}
