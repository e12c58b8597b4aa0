//! GeoJSON study-area and district polygon reader.

use std::path::{Path, PathBuf};

use geo::{Coord, LineString, Polygon};
use scarp_validate::District;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::IoError;

/// A feature's `name` property and its geometry.
type NamedGeometry = (Option<String>, Value);

/// Reads polygons from a GeoJSON file.
///
/// Accepts a bare `Polygon` geometry, a `Feature` holding one, or a
/// `FeatureCollection`. Only the exterior ring of each polygon is kept.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::JsonParse`] | File is not valid JSON |
/// | [`IoError::InvalidGeoJson`] | No polygon, unsupported geometry or bad coordinates |
pub struct BoundaryReader {
    path: PathBuf,
}

impl BoundaryReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// The first polygon in the file.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_polygon(&self) -> Result<Polygon<f64>, IoError> {
        let features = self.features()?;
        let (_, geometry) = features
            .first()
            .ok_or_else(|| self.invalid("no features".to_string()))?;
        let polygon = self.polygon(geometry)?;
        info!(vertices = polygon.exterior().0.len(), "study area loaded");
        Ok(polygon)
    }

    /// Every polygon feature, named by its `name` property.
    ///
    /// Features without a name are called `district-<index>`.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_districts(&self) -> Result<Vec<District>, IoError> {
        let features = self.features()?;
        if features.is_empty() {
            return Err(self.invalid("no features".to_string()));
        }
        let mut districts = Vec::with_capacity(features.len());
        for (index, (name, geometry)) in features.into_iter().enumerate() {
            let name = name.unwrap_or_else(|| {
                warn!(index, "district has no name property");
                format!("district-{index}")
            });
            districts.push(District {
                name,
                polygon: self.polygon(&geometry)?,
            });
        }
        info!(n_districts = districts.len(), "districts loaded");
        Ok(districts)
    }

    fn features(&self) -> Result<Vec<NamedGeometry>, IoError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let mut root: Value = serde_json::from_str(&text).map_err(|e| IoError::JsonParse {
            path: self.path.clone(),
            source: e,
        })?;
        match root.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => match root.get_mut("features").map(Value::take) {
                Some(Value::Array(features)) => {
                    features.into_iter().map(|f| self.feature(f)).collect()
                }
                _ => Err(self.invalid("FeatureCollection without features".to_string())),
            },
            Some("Feature") => Ok(vec![self.feature(root)?]),
            Some(_) => Ok(vec![(None, root)]),
            None => Err(self.invalid("missing \"type\"".to_string())),
        }
    }

    fn feature(&self, mut feature: Value) -> Result<NamedGeometry, IoError> {
        let name = feature
            .pointer("/properties/name")
            .and_then(Value::as_str)
            .map(str::to_string);
        match feature.get_mut("geometry").map(Value::take) {
            Some(geometry) if !geometry.is_null() => Ok((name, geometry)),
            _ => Err(self.invalid("feature without geometry".to_string())),
        }
    }

    fn polygon(&self, geometry: &Value) -> Result<Polygon<f64>, IoError> {
        match geometry.get("type").and_then(Value::as_str) {
            Some("Polygon") => {}
            other => {
                return Err(self.invalid(format!(
                    "unsupported geometry type {}",
                    other.unwrap_or("<missing>")
                )));
            }
        }
        let exterior = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .and_then(|rings| rings.first())
            .and_then(Value::as_array)
            .ok_or_else(|| self.invalid("polygon without exterior ring".to_string()))?;
        let coords = exterior
            .iter()
            .map(|position| {
                let xy = position.as_array().filter(|p| p.len() >= 2);
                match xy.map(|p| (p[0].as_f64(), p[1].as_f64())) {
                    Some((Some(x), Some(y))) if x.is_finite() && y.is_finite() => {
                        Ok(Coord { x, y })
                    }
                    _ => Err(self.invalid(format!("bad position {position}"))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if coords.len() < 4 {
            return Err(self.invalid(format!(
                "exterior ring has {} positions, need at least 4",
                coords.len()
            )));
        }
        Ok(Polygon::new(LineString::new(coords), vec![]))
    }

    fn invalid(&self, reason: String) -> IoError {
        IoError::InvalidGeoJson {
            path: self.path.clone(),
            reason,
        }
    }
}
