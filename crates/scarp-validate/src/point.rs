//! Observed and synthetic point sets.

use geo::Point;
use scarp_raster::PopulationMask;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One recorded landslide incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub injured: u32,
    #[serde(default)]
    pub missing: u32,
    #[serde(default)]
    pub affected: u32,
    #[serde(default)]
    pub infrastructure_destroyed: u32,
    #[serde(default)]
    pub year: Option<i32>,
}

impl Incident {
    #[must_use]
    pub fn location(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    /// Any casualty, displacement or destroyed infrastructure recorded.
    #[must_use]
    pub fn is_damaging(&self) -> bool {
        self.deaths > 0
            || self.missing > 0
            || self.injured > 0
            || self.affected > 0
            || self.infrastructure_destroyed > 0
    }
}

/// Where a point set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Observed,
    Synthetic,
}

/// A point and, for observed points, the incident it records.
#[derive(Debug, Clone, PartialEq)]
pub struct SitePoint {
    pub location: Point<f64>,
    pub incident: Option<Incident>,
}

/// Ordered, immutable collection of points. Filters return new sets.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    origin: Origin,
    points: Vec<SitePoint>,
}

impl PointSet {
    /// Observed set, in input order.
    #[must_use]
    pub fn observed(incidents: Vec<Incident>) -> Self {
        let points = incidents
            .into_iter()
            .map(|incident| SitePoint {
                location: incident.location(),
                incident: Some(incident),
            })
            .collect();
        Self {
            origin: Origin::Observed,
            points,
        }
    }

    /// Synthetic set of bare locations.
    #[must_use]
    pub fn synthetic(locations: Vec<Point<f64>>) -> Self {
        let points = locations
            .into_iter()
            .map(|location| SitePoint {
                location,
                incident: None,
            })
            .collect();
        Self {
            origin: Origin::Synthetic,
            points,
        }
    }

    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    #[must_use]
    pub fn points(&self) -> &[SitePoint] {
        &self.points
    }

    pub fn locations(&self) -> impl Iterator<Item = Point<f64>> + '_ {
        self.points.iter().map(|p| p.location)
    }

    pub fn incidents(&self) -> impl Iterator<Item = &Incident> + '_ {
        self.points.iter().filter_map(|p| p.incident.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First `n` points.
    #[must_use]
    pub fn take(&self, n: usize) -> Self {
        Self {
            origin: self.origin,
            points: self.points.iter().take(n).cloned().collect(),
        }
    }

    /// Keep points whose containing pixel is populated.
    #[must_use]
    pub fn populated(&self, mask: &PopulationMask) -> Self {
        self.filter("populated", |p| {
            mask.is_populated_at(p.location.x(), p.location.y())
        })
    }

    /// Keep incidents with any recorded damage. Synthetic points carry no
    /// attributes and are all dropped.
    #[must_use]
    pub fn damaging(&self) -> Self {
        self.filter("damaging", |p| {
            p.incident.as_ref().is_some_and(Incident::is_damaging)
        })
    }

    /// Keep incidents dated `year` or later; undated incidents are dropped.
    #[must_use]
    pub fn since_year(&self, year: i32) -> Self {
        self.filter("since_year", |p| {
            p.incident
                .as_ref()
                .and_then(|i| i.year)
                .is_some_and(|y| y >= year)
        })
    }

    fn filter(&self, name: &'static str, keep: impl Fn(&SitePoint) -> bool) -> Self {
        let points: Vec<SitePoint> = self.points.iter().filter(|p| keep(p)).cloned().collect();
        debug!(
            filter = name,
            before = self.points.len(),
            after = points.len(),
            "point set filtered"
        );
        Self {
            origin: self.origin,
            points,
        }
    }
}

#[cfg(test)]
mod tests {
    use scarp_raster::{Crs, GridSpec, Raster};

    use super::*;

    fn incident(id: &str, lon: f64, lat: f64) -> Incident {
        Incident {
            id: id.to_string(),
            lon,
            lat,
            deaths: 0,
            injured: 0,
            missing: 0,
            affected: 0,
            infrastructure_destroyed: 0,
            year: None,
        }
    }

    #[test]
    fn damaging_checks_every_impact_field() {
        let mut a = incident("a", 0.0, 0.0);
        assert!(!a.is_damaging());
        a.affected = 3;
        assert!(a.is_damaging());
        let mut b = incident("b", 0.0, 0.0);
        b.infrastructure_destroyed = 1;
        assert!(b.is_damaging());
    }

    #[test]
    fn filters_preserve_order_and_origin() {
        let mut quiet = incident("quiet", 0.5, 0.5);
        quiet.year = Some(2020);
        let mut deadly = incident("deadly", 1.5, 1.5);
        deadly.deaths = 2;
        deadly.year = Some(2015);
        let mut late = incident("late", 2.5, 2.5);
        late.injured = 1;
        late.year = Some(2021);
        let set = PointSet::observed(vec![quiet, deadly, late]);

        let damaging = set.damaging();
        assert_eq!(damaging.origin(), Origin::Observed);
        let ids: Vec<&str> = damaging.incidents().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["deadly", "late"]);

        let binding = set.since_year(2020);
        let recent: Vec<&str> = binding.incidents().map(|i| i.id.as_str()).collect();
        assert_eq!(recent, ["quiet", "late"]);
    }

    #[test]
    fn synthetic_points_do_not_survive_attribute_filters() {
        let set = PointSet::synthetic(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        assert_eq!(set.incidents().count(), 0);
        assert!(set.damaging().is_empty());
        assert!(set.since_year(1900).is_empty());
    }

    #[test]
    fn populated_filter_uses_pixel_lookup() {
        let spec = GridSpec::new(2, 2, 0.0, 2.0, 1.0, Crs::Projected { epsg: 32645 }).unwrap();
        let pop = Raster::new(spec, vec![10.0, 0.0, 0.0, 5.0]).unwrap();
        let mask = PopulationMask::from_counts(&pop, &spec).unwrap();
        let set = PointSet::synthetic(vec![
            Point::new(0.5, 1.5),
            Point::new(1.5, 1.5),
            Point::new(1.5, 0.5),
            Point::new(9.0, 9.0),
        ]);
        let kept: Vec<Point<f64>> = set.populated(&mask).locations().collect();
        assert_eq!(kept, [Point::new(0.5, 1.5), Point::new(1.5, 0.5)]);
    }
}
