//! Bearing-line triangulation against remote observers
//!
//! The local observer's heading is intersected with the bearing lines shared
//! by remote observers. Every sufficiently large heading change produces a
//! [`TriangulationUpdate`] carrying what the map overlay draws: the local
//! line of sight, the intersection points, and the viewport to frame them.

use crate::algorithms::geodesy::{self, bearing_difference, normalize_bearing, Triangulation};
use crate::api::events::{EventDispatcher, HostEvent};
use crate::core::{BoundingBox, Coordinate};
use crate::utils::config::{SceneConfig, TriangulationConfig, ViewportConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote observer's position and the azimuth they reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangulationObservation {
    pub coordinate: Coordinate,
    pub azimuth: f64,
    /// Sampled bearing line, filled in when the observation is registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arc: Option<Vec<Coordinate>>,
}

impl TriangulationObservation {
    pub fn new(lat: f64, lon: f64, azimuth: f64) -> Self {
        Self {
            coordinate: Coordinate::new(lat, lon),
            azimuth: normalize_bearing(azimuth),
            arc: None,
        }
    }

    /// Sample this observation's bearing line
    pub fn compute_arc(&mut self, steps: usize, length_m: f64) {
        self.arc = Some(
            geodesy::geodesic_arc(steps, length_m, self.coordinate.lat, self.coordinate.lon, self.azimuth).collect(),
        );
    }

    /// Intersection of this observation's bearing line with another ray
    pub fn intersect(&self, origin: &Coordinate, azimuth: f64) -> Triangulation {
        geodesy::triangulate(
            origin.lat,
            origin.lon,
            azimuth,
            self.coordinate.lat,
            self.coordinate.lon,
            self.azimuth,
        )
    }
}

impl fmt::Display for TriangulationObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[lat: {:.6}, lon: {:.6}, azimuth: {:.3}]",
            self.coordinate.lat, self.coordinate.lon, self.azimuth
        )
    }
}

/// Intersection between the local line of sight and one observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriangulatedPoint {
    /// Index of the observation in the session
    pub observation: usize,
    pub coordinate: Coordinate,
    /// Surface distance from the local observer (meters)
    pub distance_m: f64,
}

/// Everything the map overlay needs after a heading change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriangulationUpdate {
    pub azimuth: f64,
    pub line_of_sight: Vec<Coordinate>,
    pub intersections: Vec<TriangulatedPoint>,
    /// Area to frame: the intersections and the observer, or the observer's surroundings
    pub viewport: BoundingBox,
    /// Map rotation matching the heading, in whole even degrees
    pub map_rotation: f64,
}

/// Map rotation for a heading: `360 - azimuth`, truncated to an even whole degree
pub fn map_rotation(azimuth: f64) -> f64 {
    let rotation = normalize_bearing(360.0 - azimuth).trunc();
    (rotation / 2.0).trunc() * 2.0
}

/// Triangulation state of the local observer's map view
#[derive(Debug)]
pub struct TriangulationSession {
    config: TriangulationConfig,
    viewport: ViewportConfig,
    observations: Vec<TriangulationObservation>,
    last_dispatched_azimuth: Option<f64>,
    events: EventDispatcher,
}

impl TriangulationSession {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            config: config.triangulation.clone(),
            viewport: config.viewport.clone(),
            observations: Vec::new(),
            last_dispatched_azimuth: None,
            events: EventDispatcher::new(),
        }
    }

    /// Replace the remote observations, sampling each one's bearing line
    pub fn set_observations(&mut self, mut observations: Vec<TriangulationObservation>) {
        for observation in &mut observations {
            observation.compute_arc(self.config.remote_arc_steps, self.config.arc_length_m);
        }
        log::info!("tracking {} remote observations", observations.len());
        self.observations = observations;
    }

    pub fn observations(&self) -> &[TriangulationObservation] {
        &self.observations
    }

    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }

    /// Feed a new heading for the observer at `observer`.
    ///
    /// Returns `None` while the heading stays within the configured epsilon of
    /// the last one acted upon.
    pub fn update_azimuth(&mut self, observer: Coordinate, azimuth: f64) -> Option<TriangulationUpdate> {
        let azimuth = normalize_bearing(azimuth);
        if let Some(previous) = self.last_dispatched_azimuth {
            if bearing_difference(previous, azimuth) < self.config.azimuth_epsilon_deg {
                return None;
            }
        }
        self.last_dispatched_azimuth = Some(azimuth);
        self.events.dispatch(&HostEvent::AzimuthChanged { azimuth });

        let line_of_sight: Vec<Coordinate> = geodesy::geodesic_arc(
            self.config.observer_arc_steps,
            self.config.arc_length_m,
            observer.lat,
            observer.lon,
            azimuth,
        )
        .collect();

        let intersections: Vec<TriangulatedPoint> = self
            .observations
            .iter()
            .enumerate()
            .filter_map(|(index, observation)| {
                let point = observation.intersect(&observer, azimuth).intersection()?;
                let distance_m = geodesy::aerial_distance(observer.lat, observer.lon, point.lat, point.lon);
                (distance_m <= self.config.max_intersection_distance_m).then_some(TriangulatedPoint {
                    observation: index,
                    coordinate: point,
                    distance_m,
                })
            })
            .collect();

        let viewport = if intersections.is_empty() {
            BoundingBox::around(observer, self.viewport.observer_bbox_radius_m * 2.0)
        } else {
            let framed: Vec<Coordinate> = intersections
                .iter()
                .map(|point| point.coordinate)
                .chain(std::iter::once(observer))
                .collect();
            BoundingBox::enclosing(&framed).unwrap_or_else(|| self.observer_viewport(observer))
        };

        log::debug!(
            "azimuth {:.2}: {} of {} observations intersect",
            azimuth,
            intersections.len(),
            self.observations.len()
        );

        Some(TriangulationUpdate {
            azimuth,
            line_of_sight,
            intersections,
            viewport,
            map_rotation: map_rotation(azimuth),
        })
    }

    /// Report a tap on the map at the given location
    pub fn single_tap(&self, latitude: f64, longitude: f64) {
        self.events.dispatch(&HostEvent::SingleTapLocation { latitude, longitude });
    }

    /// Bounding box framing the observer's surroundings
    pub fn observer_viewport(&self, observer: Coordinate) -> BoundingBox {
        BoundingBox::around(observer, self.viewport.observer_bbox_radius_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn session_with_events() -> (TriangulationSession, Arc<Mutex<Vec<HostEvent>>>) {
        let mut session = TriangulationSession::new(&SceneConfig::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        session
            .events_mut()
            .register(Box::new(move |event| sink.lock().unwrap().push(event.clone())));
        (session, received)
    }

    #[test]
    fn test_observation_arcs_are_precomputed() {
        let mut session = TriangulationSession::new(&SceneConfig::default());
        session.set_observations(vec![TriangulationObservation::new(31.0, 35.0, 90.0)]);

        let arc = session.observations()[0].arc.as_ref().unwrap();
        assert_eq!(arc.len(), 1_000);
        assert_eq!(arc[0], Coordinate::new(31.0, 35.0));
    }

    #[test]
    fn test_update_finds_nearby_intersection() {
        let (mut session, received) = session_with_events();
        let observer = Coordinate::new(0.0, 0.0);
        session.set_observations(vec![
            TriangulationObservation::new(0.0, 0.02, 315.0),
            // Parallel to the observer's line of sight
            TriangulationObservation::new(0.0, 0.02, 45.0),
        ]);

        let update = session.update_azimuth(observer, 45.0).unwrap();

        assert_eq!(update.line_of_sight.len(), 200);
        assert_eq!(update.intersections.len(), 1);
        let hit = &update.intersections[0];
        assert_eq!(hit.observation, 0);
        assert!((hit.coordinate.lat - 0.01).abs() < 1e-5);
        assert!(update.viewport.contains(&hit.coordinate));
        assert!(update.viewport.contains(&observer));
        assert_eq!(
            received.lock().unwrap().as_slice(),
            &[HostEvent::AzimuthChanged { azimuth: 45.0 }]
        );
    }

    #[test]
    fn test_distant_intersections_are_dropped() {
        let mut session = TriangulationSession::new(&SceneConfig::default());
        // Converges roughly 70 km away, beyond the 50 km limit
        session.set_observations(vec![TriangulationObservation::new(0.0, 0.9, 315.0)]);

        let update = session.update_azimuth(Coordinate::new(0.0, 0.0), 45.0).unwrap();
        assert!(update.intersections.is_empty());
        assert!(update.viewport.lat_span() > 0.0);
    }

    #[test]
    fn test_small_heading_changes_are_ignored() {
        let (mut session, received) = session_with_events();
        let observer = Coordinate::new(10.0, 10.0);

        assert!(session.update_azimuth(observer, 100.0).is_some());
        assert!(session.update_azimuth(observer, 100.005).is_none());
        assert!(session.update_azimuth(observer, 100.02).is_some());
        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_heading_change_across_north() {
        let mut session = TriangulationSession::new(&SceneConfig::default());
        let observer = Coordinate::new(10.0, 10.0);

        assert!(session.update_azimuth(observer, 359.999).is_some());
        assert!(session.update_azimuth(observer, 0.001).is_none());
    }

    #[test]
    fn test_single_tap_event() {
        let (session, received) = session_with_events();
        session.single_tap(32.5, 34.9);
        assert_eq!(
            received.lock().unwrap().as_slice(),
            &[HostEvent::SingleTapLocation {
                latitude: 32.5,
                longitude: 34.9
            }]
        );
    }

    #[test]
    fn test_map_rotation() {
        assert_eq!(map_rotation(0.0), 0.0);
        assert_eq!(map_rotation(90.0), 270.0);
        assert_eq!(map_rotation(45.5), 314.0);
        assert_eq!(map_rotation(359.0), 0.0);
    }

    #[test]
    fn test_observation_display() {
        let observation = TriangulationObservation::new(31.5, 35.25, 12.0);
        assert_eq!(observation.to_string(), "[lat: 31.500000, lon: 35.250000, azimuth: 12.000]");
    }
}
