//! Anchor placement engine
//!
//! Turns the device pose and the registered markers into camera-relative
//! anchors, one pass at a time. Passes are requested by the refresh scheduler,
//! by setting changes or by location updates, and run on the frame driver's
//! thread through [`AnchorPlacementEngine::process_frame`].

use crate::algorithms::geodesy;
use crate::api::events::{EventDispatcher, HostEvent};
use crate::api::pose::DevicePoseProvider;
use crate::core::Coordinate;
use crate::placement::geometry::{compute_geometry, MarkerGeometry, PlacementParams};
use crate::placement::marker::{LocationMarker, MarkerId};
use crate::placement::overlap::{resolve_overlaps, OverlapAction, OverlapCandidate, OverlapPolicy};
use crate::placement::refresh::{
    lock_scheduler, spawn_refresh_timer, Clock, PassEntry, RefreshHandle, RefreshScheduler, RefreshState,
    RefreshTimer, SharedScheduler, SystemClock,
};
use crate::renderer::{AnchorHandle, AnchorRenderer, RecoveryStrategy, RenderError};
use crate::utils::config::PlacementConfig;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Per-marker placement errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("device location not yet established")]
    LocationUnavailable,
    #[error("invalid marker coordinate {coordinate}")]
    InvalidCoordinate { coordinate: Coordinate },
    #[error("no {marker} registered")]
    UnknownMarker { marker: MarkerId },
    #[error("renderer failure: {0}")]
    Renderer(#[from] RenderError),
}

/// Result type for placement operations
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Why a marker was not placed this pass
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The marker belongs to another distance group and is hidden
    OutOfGroup { group: i32 },
    /// The marker is further away than it wants to be rendered from
    BeyondRenderRange { distance_m: f64, limit_m: f64 },
    /// Hidden behind a nearer overlapping marker
    Overlapped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedMarker {
    pub marker: MarkerId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementFailure {
    pub marker: MarkerId,
    pub error: PlacementError,
}

/// A marker anchored during a pass
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub marker: MarkerId,
    pub anchor: AnchorHandle,
    pub geometry: MarkerGeometry,
}

/// What a placement pass did with every marker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub placements: Vec<Placement>,
    pub skipped: Vec<SkippedMarker>,
    pub failures: Vec<PlacementFailure>,
}

impl PassReport {
    pub fn placement(&self, marker: MarkerId) -> Option<&Placement> {
        self.placements.iter().find(|placement| placement.marker == marker)
    }

    pub fn skip_reason(&self, marker: MarkerId) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|skipped| skipped.marker == marker)
            .map(|skipped| &skipped.reason)
    }

    /// Whether every marker was handled without error
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn skip(&mut self, marker: MarkerId, reason: SkipReason) {
        log::trace!("{} skipped: {:?}", marker, reason);
        self.skipped.push(SkippedMarker { marker, reason });
    }

    fn fail(&mut self, marker: MarkerId, error: PlacementError) {
        log::warn!("{} not placed: {}", marker, error);
        self.failures.push(PlacementFailure { marker, error });
    }
}

/// Result of driving the engine for one frame
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// No refresh was pending
    Idle,
    /// A pass was already in flight; the request folds into it
    Coalesced,
    /// No location fix yet; nothing was touched
    LocationUnavailable,
    Completed(PassReport),
}

impl PassOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

enum Plan {
    Place(MarkerGeometry),
    Skip(SkipReason),
}

/// Places location markers in the camera scene
pub struct AnchorPlacementEngine<R: AnchorRenderer, P: DevicePoseProvider> {
    renderer: R,
    pose: P,
    config: PlacementConfig,
    markers: Vec<LocationMarker>,
    /// Id of `markers[0]`; advances past every cleared marker
    first_id: usize,
    refresh: RefreshHandle,
    scheduler: SharedScheduler,
    timer: Option<RefreshTimer>,
    /// Whether the scheduler is ticked by a background thread instead of frames
    timer_driven: bool,
    distance_limit_m: f64,
    bearing_adjustment_deg: f64,
    current_distance_group: i32,
    refresh_on_location_change: bool,
    minimal_refreshing: bool,
    events: EventDispatcher,
}

impl<R: AnchorRenderer, P: DevicePoseProvider> AnchorPlacementEngine<R, P> {
    pub fn new(renderer: R, pose: P, config: &PlacementConfig) -> Self {
        Self::with_clock(renderer, pose, config, Arc::new(SystemClock))
    }

    /// Engine whose refresh scheduler reads time from `clock`
    pub fn with_clock(renderer: R, pose: P, config: &PlacementConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            renderer,
            pose,
            config: config.clone(),
            markers: Vec::new(),
            first_id: 0,
            refresh: RefreshHandle::new(),
            scheduler: Arc::new(Mutex::new(RefreshScheduler::new(config, clock))),
            timer: None,
            timer_driven: false,
            distance_limit_m: config.distance_limit_m,
            bearing_adjustment_deg: config.bearing_adjustment_deg,
            current_distance_group: 0,
            refresh_on_location_change: config.refresh_on_location_change,
            minimal_refreshing: config.minimal_refreshing,
            events: EventDispatcher::new(),
        }
    }

    /// Start periodic refreshing, unless refreshes follow location changes
    pub fn start(&mut self) {
        if self.refresh_on_location_change {
            self.refresh.request_refresh();
        } else {
            self.scheduler().start(&self.refresh);
            self.resume_timer();
        }
        log::info!("placement engine started with {} markers", self.markers.len());
    }

    /// Stop periodic refreshing, including the background timer
    pub fn stop(&mut self) {
        self.halt_timer();
        self.scheduler().stop();
    }

    /// Tick the refresh scheduler on a background thread instead of in
    /// [`process_frame`](Self::process_frame).
    ///
    /// The thread only runs while refreshes are timer-driven; it is stopped
    /// and restarted along with the scheduler.
    pub fn spawn_timer(&mut self) {
        self.timer_driven = true;
        if !self.refresh_on_location_change {
            self.resume_timer();
        }
    }

    pub fn has_running_timer(&self) -> bool {
        self.timer.is_some()
    }

    fn resume_timer(&mut self) {
        if self.timer_driven && self.timer.is_none() {
            log::debug!("starting background refresh timer");
            self.timer = Some(spawn_refresh_timer(Arc::clone(&self.scheduler), self.refresh.clone()));
        }
    }

    fn halt_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
    }

    fn scheduler(&self) -> MutexGuard<'_, RefreshScheduler> {
        lock_scheduler(&self.scheduler)
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn pose(&self) -> &P {
        &self.pose
    }

    pub fn pose_mut(&mut self) -> &mut P {
        &mut self.pose
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }

    /// Handle for requesting refreshes from other threads
    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    pub fn request_refresh(&self) {
        self.refresh.request_refresh();
    }

    pub fn add_marker(&mut self, marker: LocationMarker) -> MarkerId {
        let id = self.id_at(self.markers.len());
        self.markers.push(marker);
        self.refresh.request_refresh();
        id
    }

    pub fn marker(&self, id: MarkerId) -> Option<&LocationMarker> {
        self.markers.get(self.slot(id)?)
    }

    pub fn markers(&self) -> &[LocationMarker] {
        &self.markers
    }

    /// Detach every anchor and forget all markers; their ids stop resolving
    pub fn clear_markers(&mut self) {
        self.first_id += self.markers.len();
        for marker in self.markers.drain(..) {
            if let Some(anchor) = marker.anchor {
                if let Err(error) = self.renderer.detach(anchor) {
                    log::warn!("failed to detach anchor {}: {}", anchor, error);
                }
            }
        }
    }

    fn id_at(&self, slot: usize) -> MarkerId {
        MarkerId::new(self.first_id + slot)
    }

    fn slot(&self, id: MarkerId) -> Option<usize> {
        id.index().checked_sub(self.first_id)
    }

    pub fn distance_limit(&self) -> f64 {
        self.distance_limit_m
    }

    /// Cap for marker distances inside the scene
    pub fn set_distance_limit(&mut self, limit_m: f64) {
        if !(limit_m.is_finite() && limit_m > 0.0) {
            log::warn!("ignoring invalid distance limit {}", limit_m);
            return;
        }
        self.distance_limit_m = limit_m;
    }

    pub fn reset_distance_limit(&mut self) {
        self.distance_limit_m = self.config.default_distance_limit_m;
    }

    pub fn bearing_adjustment(&self) -> f64 {
        self.bearing_adjustment_deg
    }

    /// Compass correction added to every relative bearing; triggers a refresh
    pub fn set_bearing_adjustment(&mut self, degrees: f64) {
        self.bearing_adjustment_deg = degrees;
        self.refresh.request_refresh();
    }

    pub fn current_distance_group(&self) -> i32 {
        self.current_distance_group
    }

    pub fn set_current_distance_group(&mut self, group: i32) {
        self.current_distance_group = group;
        self.refresh.request_refresh();
    }

    /// Bucket every marker into a distance band around the current location
    pub fn assign_distance_groups(&mut self) -> PlacementResult<()> {
        let device = self.pose.location().ok_or(PlacementError::LocationUnavailable)?;
        let group_size = self.config.distance_group_size_m;

        for marker in &mut self.markers {
            let distance = geodesy::aerial_distance(device.lat, device.lon, marker.coordinate.lat, marker.coordinate.lon);
            marker.distance_group = (distance / group_size).floor() as i32;
        }
        self.refresh.request_refresh();
        Ok(())
    }

    pub fn minimal_refreshing(&self) -> bool {
        self.minimal_refreshing
    }

    pub fn set_minimal_refreshing(&mut self, enabled: bool) {
        self.minimal_refreshing = enabled;
    }

    pub fn refresh_on_location_change(&self) -> bool {
        self.refresh_on_location_change
    }

    /// Switch between timer-driven refreshes and one refresh per location update
    pub fn set_refresh_on_location_change(&mut self, enabled: bool) {
        if enabled {
            self.halt_timer();
            self.scheduler().stop();
        } else {
            self.scheduler().start(&self.refresh);
            self.resume_timer();
        }
        self.refresh.request_refresh();
        self.refresh_on_location_change = enabled;
        log::info!(
            "anchors now refresh {}",
            if enabled { "on location change" } else { "on a timer" }
        );
    }

    /// Notify the engine of a new location fix.
    ///
    /// Returns the outcome of the synchronous pass when refreshes follow
    /// location changes.
    pub fn on_location_changed(&mut self) -> Option<PassOutcome> {
        if let Some(location) = self.pose.location() {
            self.events.dispatch(&HostEvent::LocationChanged { location });
        }
        if !self.refresh_on_location_change {
            return None;
        }
        self.refresh.request_refresh();
        Some(self.refresh_if_required())
    }

    pub fn refresh_state(&self) -> RefreshState {
        let scheduler = self.scheduler();
        RefreshState {
            interval: scheduler.interval(),
            calibration_iteration: scheduler.iteration(),
            refreshing: self.refresh.is_refreshing(),
            anchors_need_refresh: self.refresh.needs_refresh(),
            current_distance_group: self.current_distance_group,
        }
    }

    /// Per-frame driver: advance the scheduler and run a pass if one is due
    pub fn process_frame(&mut self) -> PassOutcome {
        if self.timer.is_none() {
            self.scheduler().tick(&self.refresh);
        }
        self.refresh_if_required()
    }

    /// Run a placement pass if one was requested and none is in flight
    pub fn refresh_if_required(&mut self) -> PassOutcome {
        let _guard = match self.refresh.try_begin_pass() {
            PassEntry::Idle => return PassOutcome::Idle,
            PassEntry::Busy => {
                log::trace!("refresh already in flight");
                return PassOutcome::Coalesced;
            }
            PassEntry::Entered(guard) => guard,
        };

        let Some(device) = self.pose.location() else {
            log::debug!("location not yet established, skipping refresh");
            return PassOutcome::LocationUnavailable;
        };
        let heading = self.pose.heading();
        log::debug!(
            "refreshing {} markers from {} heading {:.1}",
            self.markers.len(),
            device,
            heading
        );

        let report = self.run_pass(&device, heading);
        log::debug!(
            "pass done: {} placed, {} skipped, {} failed",
            report.placements.len(),
            report.skipped.len(),
            report.failures.len()
        );
        PassOutcome::Completed(report)
    }

    fn run_pass(&mut self, device: &Coordinate, heading: f64) -> PassReport {
        let params = PlacementParams::from_config(&self.config, self.distance_limit_m, self.bearing_adjustment_deg);
        let camera_height = self.renderer.camera_height();
        let mut report = PassReport::default();
        let mut planned: Vec<(MarkerId, MarkerGeometry)> = Vec::new();

        for slot in 0..self.markers.len() {
            let id = self.id_at(slot);
            match self.plan_marker(id, device, heading, camera_height, &params) {
                Ok(Plan::Place(geometry)) => planned.push((id, geometry)),
                Ok(Plan::Skip(reason)) => report.skip(id, reason),
                Err(error) => report.fail(id, error),
            }
        }

        let candidates: Vec<OverlapCandidate> = planned
            .iter()
            .map(|(marker, geometry)| OverlapCandidate {
                marker: *marker,
                relative_bearing_deg: geometry.relative_bearing_deg,
                true_distance_m: geometry.true_distance_m,
            })
            .collect();

        for action in resolve_overlaps(&candidates, OverlapPolicy::from_config(&self.config)) {
            match action {
                OverlapAction::Raise { marker, by_m } => {
                    if let Some((_, geometry)) = planned.iter_mut().find(|(id, _)| *id == marker) {
                        geometry.offset.y += by_m;
                        geometry.height_offset_m += by_m;
                    }
                }
                OverlapAction::Hide { marker } => {
                    planned.retain(|(id, _)| *id != marker);
                    match self.hide_marker(marker) {
                        Ok(()) => report.skip(marker, SkipReason::Overlapped),
                        Err(error) => report.fail(marker, error),
                    }
                }
            }
        }

        for (id, geometry) in planned {
            match self.anchor_marker(id, &geometry) {
                Ok(anchor) => report.placements.push(Placement {
                    marker: id,
                    anchor,
                    geometry,
                }),
                Err(error) => report.fail(id, error),
            }
        }

        report
    }

    fn plan_marker(
        &mut self,
        id: MarkerId,
        device: &Coordinate,
        heading: f64,
        camera_height: f64,
        params: &PlacementParams,
    ) -> PlacementResult<Plan> {
        let marker = self
            .slot(id)
            .and_then(|slot| self.markers.get(slot))
            .ok_or(PlacementError::UnknownMarker { marker: id })?;

        if marker.distance_group != self.current_distance_group {
            if let Some(anchor) = marker.anchor {
                if self.renderer.is_enabled(anchor) {
                    self.renderer.set_enabled(anchor, false)?;
                }
            }
            return Ok(Plan::Skip(SkipReason::OutOfGroup {
                group: marker.distance_group,
            }));
        }
        if let Some(anchor) = marker.anchor {
            if !self.renderer.is_enabled(anchor) {
                self.renderer.set_enabled(anchor, true)?;
            }
        }

        if !marker.coordinate.is_valid() {
            return Err(PlacementError::InvalidCoordinate {
                coordinate: marker.coordinate,
            });
        }

        let geometry = compute_geometry(device, heading, &marker.coordinate, marker.height, camera_height, params);
        if !marker.within_render_range(geometry.true_distance_m) {
            return Ok(Plan::Skip(SkipReason::BeyondRenderRange {
                distance_m: geometry.true_distance_m,
                limit_m: marker.only_render_within_m.unwrap_or(f64::INFINITY),
            }));
        }
        Ok(Plan::Place(geometry))
    }

    fn hide_marker(&mut self, id: MarkerId) -> PlacementResult<()> {
        let marker = self
            .slot(id)
            .and_then(|slot| self.markers.get(slot))
            .ok_or(PlacementError::UnknownMarker { marker: id })?;
        if let Some(anchor) = marker.anchor {
            if self.renderer.is_enabled(anchor) {
                self.renderer.set_enabled(anchor, false)?;
            }
        }
        Ok(())
    }

    fn anchor_marker(&mut self, id: MarkerId, geometry: &MarkerGeometry) -> PlacementResult<AnchorHandle> {
        let slot = self.slot(id).ok_or(PlacementError::UnknownMarker { marker: id })?;
        let marker = self
            .markers
            .get_mut(slot)
            .ok_or(PlacementError::UnknownMarker { marker: id })?;

        if let Some(previous) = marker.anchor.take() {
            if let Err(error) = self.renderer.detach(previous) {
                if error.recovery_strategy() != RecoveryStrategy::DropAnchor {
                    marker.anchor = Some(previous);
                    return Err(error.into());
                }
                log::debug!("anchor {} of {} was already gone", previous, id);
            }
        }

        let anchor = self.renderer.create_anchor(geometry.offset)?;
        marker.anchor = Some(anchor);
        self.renderer.set_scaling(anchor, &marker.scaling)?;
        self.renderer.set_height(anchor, geometry.rendered_height)?;
        if self.minimal_refreshing {
            self.renderer.scale_and_rotate(anchor)?;
        }

        log::debug!(
            "{} at {:.0} m bearing {:.1} (relative {:.1}) rendered at {:.1} m",
            id,
            geometry.true_distance_m,
            geometry.bearing_deg,
            geometry.relative_bearing_deg,
            geometry.render_distance_m
        );
        Ok(anchor)
    }
}
