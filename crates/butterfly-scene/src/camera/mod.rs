//! Viewpoint navigation between timepoint markers.
//!
//! The rig is a two-phase state machine (`Idle`/`Moving`) driven by an
//! external scheduling tick. It never assumes a particular scheduler:
//! callers invoke [`ViewpointRig::advance`] once per tick and read the
//! pose afterwards. A new navigation request while moving retargets the
//! in-flight motion; at most one target is authoritative at any time.

use butterfly_core::Timepoint;
use glam::Vec3;
use std::f32::consts::FRAC_PI_4;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug)]
pub struct ViewpointConfig {
    /// Exponential interpolation factor applied per tick.
    pub damping: f32,
    /// Distance below which the rig snaps to `Idle`, in scene units.
    pub arrival_epsilon: f32,
    /// Distance from the focused marker to the camera.
    pub orbit_radius: f32,
    /// Vertical lift of the orbit offset, as a fraction of the radius.
    pub orbit_lift: f32,
}

impl Default for ViewpointConfig {
    fn default() -> Self {
        Self {
            damping: 0.05,
            arrival_epsilon: 0.1,
            orbit_radius: 40.0,
            orbit_lift: 0.5,
        }
    }
}

/// Whether the viewpoint is currently in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ViewpointPhase {
    #[default]
    Idle,
    Moving,
}

/// Directional navigation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavDirection {
    Prev,
    Next,
}

/// Camera position and look-at target, plus the in-flight goal.
pub struct ViewpointRig {
    config: ViewpointConfig,
    position: Vec3,
    look_at: Vec3,
    target_position: Vec3,
    target_look_at: Vec3,
    phase: ViewpointPhase,
    current_index: usize,
}

impl Default for ViewpointRig {
    fn default() -> Self {
        Self::new(ViewpointConfig::default())
    }
}

impl ViewpointRig {
    pub fn new(config: ViewpointConfig) -> Self {
        // Matches the initial camera pose: pulled back on z, looking at origin.
        let position = Vec3::new(0.0, 0.0, 30.0);
        Self {
            config,
            position,
            look_at: Vec3::ZERO,
            target_position: position,
            target_look_at: Vec3::ZERO,
            phase: ViewpointPhase::Idle,
            current_index: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn look_at(&self) -> Vec3 {
        self.look_at
    }

    #[inline]
    #[must_use]
    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    #[inline]
    #[must_use]
    pub fn target_look_at(&self) -> Vec3 {
        self.target_look_at
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> ViewpointPhase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.phase == ViewpointPhase::Moving
    }

    /// Index of the marker the rig is at or heading toward.
    #[inline]
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    fn orbit_offset(&self) -> Vec3 {
        let radius = self.config.orbit_radius;
        Vec3::new(
            radius * FRAC_PI_4.cos(),
            radius * self.config.orbit_lift,
            radius * FRAC_PI_4.sin(),
        )
    }

    fn retarget(&mut self, index: usize, markers: &[Timepoint]) {
        let marker = &markers[index];
        self.target_look_at = marker.position;
        self.target_position = marker.position + self.orbit_offset();
        self.current_index = index;
        self.phase = ViewpointPhase::Moving;
        debug!(index, target = ?self.target_look_at, "viewpoint retargeted");
    }

    /// Navigate to the marker representing `months`. Logged no-op when the
    /// month is not a whole marker step, the index is out of range, or no
    /// markers exist yet.
    pub fn navigate_to_month(&mut self, months: u32, markers: &[Timepoint], months_per_marker: u32) {
        if markers.is_empty() {
            warn!("navigation requested before any timepoint markers exist");
            return;
        }
        if months_per_marker == 0 || !months.is_multiple_of(months_per_marker) {
            warn!(months, months_per_marker, "month is not a marker step; ignoring");
            return;
        }
        let index = (months / months_per_marker) as usize;
        if index >= markers.len() {
            warn!(months, index, markers = markers.len(), "month out of range; ignoring");
            return;
        }
        self.retarget(index, markers);
    }

    /// Move one marker forward or back, clamped to the batch bounds.
    pub fn navigate_relative(&mut self, direction: NavDirection, markers: &[Timepoint]) {
        if markers.is_empty() {
            warn!("navigation requested before any timepoint markers exist");
            return;
        }
        let next = match direction {
            NavDirection::Next if self.current_index + 1 < markers.len() => self.current_index + 1,
            NavDirection::Prev if self.current_index > 0 => self.current_index - 1,
            _ => {
                debug!(index = self.current_index, ?direction, "navigation at boundary");
                return;
            }
        };
        self.retarget(next, markers);
    }

    /// Reset to the first marker, re-triggering motion even when already
    /// parked there.
    pub fn start_at_first(&mut self, markers: &[Timepoint]) {
        if markers.is_empty() {
            warn!("cannot start timeline: no timepoint markers exist");
            return;
        }
        self.retarget(0, markers);
    }

    /// Apply one scheduling tick of exponential interpolation toward the
    /// target. Returns the phase after the tick; the flip to `Idle` is the
    /// renderer's cue to re-enable orbit interaction.
    pub fn advance(&mut self) -> ViewpointPhase {
        if self.phase == ViewpointPhase::Idle {
            return ViewpointPhase::Idle;
        }
        self.position = self.position.lerp(self.target_position, self.config.damping);
        self.look_at = self.look_at.lerp(self.target_look_at, self.config.damping);
        if self.position.distance(self.target_position) < self.config.arrival_epsilon
            && self.look_at.distance(self.target_look_at) < self.config.arrival_epsilon
        {
            self.phase = ViewpointPhase::Idle;
            debug!(index = self.current_index, "viewpoint reached target");
        }
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use butterfly_core::MarkerStats;

    fn markers(positions: &[Vec3]) -> Vec<Timepoint> {
        positions
            .iter()
            .enumerate()
            .map(|(index, &position)| Timepoint {
                index,
                month_offset: index as u32 * 3,
                position,
                stats: MarkerStats::default(),
            })
            .collect()
    }

    fn spread_markers(count: usize) -> Vec<Timepoint> {
        markers(
            &(0..count)
                .map(|i| Vec3::new(i as f32 * 10.0, 0.0, 0.0))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn prev_at_first_marker_is_a_no_op() {
        let batch = spread_markers(5);
        let mut rig = ViewpointRig::default();
        let target = rig.target_position();
        rig.navigate_relative(NavDirection::Prev, &batch);
        assert_eq!(rig.current_index(), 0);
        assert_eq!(rig.target_position(), target);
        assert!(!rig.is_moving());
    }

    #[test]
    fn next_at_last_marker_is_a_no_op() {
        let batch = spread_markers(3);
        let mut rig = ViewpointRig::default();
        rig.navigate_to_month(6, &batch, 3);
        assert_eq!(rig.current_index(), 2);
        let target = rig.target_position();
        rig.navigate_relative(NavDirection::Next, &batch);
        assert_eq!(rig.current_index(), 2);
        assert_eq!(rig.target_position(), target);
    }

    #[test]
    fn non_marker_month_is_rejected() {
        let batch = spread_markers(5);
        let mut rig = ViewpointRig::default();
        rig.navigate_to_month(7, &batch, 3);
        assert_eq!(rig.current_index(), 0);
        assert!(!rig.is_moving());
    }

    #[test]
    fn retarget_while_moving_replaces_the_goal() {
        let batch = spread_markers(5);
        let mut rig = ViewpointRig::default();
        rig.navigate_to_month(3, &batch, 3);
        for _ in 0..4 {
            rig.advance();
        }
        assert!(rig.is_moving());
        rig.navigate_to_month(12, &batch, 3);
        assert_eq!(rig.current_index(), 4);
        assert_eq!(rig.target_look_at(), batch[4].position);
    }

    #[test]
    fn start_at_first_retriggers_motion_when_already_there() {
        let batch = spread_markers(5);
        let mut rig = ViewpointRig::default();
        rig.start_at_first(&batch);
        while rig.advance() == ViewpointPhase::Moving {}
        assert!(!rig.is_moving());
        rig.start_at_first(&batch);
        assert!(rig.is_moving());
    }

    #[test]
    fn advance_converges_without_overshoot() {
        let batch = spread_markers(5);
        let mut rig = ViewpointRig::default();
        rig.navigate_to_month(12, &batch, 3);

        let mut last_pos = rig.position().distance(rig.target_position());
        let mut last_look = rig.look_at().distance(rig.target_look_at());
        let mut ticks = 0;
        while rig.advance() == ViewpointPhase::Moving {
            let pos = rig.position().distance(rig.target_position());
            let look = rig.look_at().distance(rig.target_look_at());
            assert!(pos < last_pos, "position distance must shrink every tick");
            assert!(look <= last_look, "look-at distance must not grow");
            last_pos = pos;
            last_look = look;
            ticks += 1;
            assert!(ticks < 500, "convergence must be bounded");
        }
        assert!(rig.position().distance(rig.target_position()) < 0.1);
        assert!(rig.look_at().distance(rig.target_look_at()) < 0.1);
        assert!(!rig.is_moving());
    }

    #[test]
    fn empty_marker_set_is_a_logged_no_op() {
        let mut rig = ViewpointRig::default();
        rig.start_at_first(&[]);
        rig.navigate_to_month(0, &[], 3);
        rig.navigate_relative(NavDirection::Next, &[]);
        assert!(!rig.is_moving());
    }
}
