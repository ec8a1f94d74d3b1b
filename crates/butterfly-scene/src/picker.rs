//! Pointer-ray picking against the current marker snapshot.
//!
//! Picking is a pure function over an immutable copy of the marker
//! positions for the tick, so a trajectory replacement mid-frame can
//! never be observed half-swapped.

use crate::MarkerInstance;
use glam::{Mat4, Vec2, Vec3};
use tracing::debug;

/// Unscaled radius of a marker sphere in display space.
pub const MARKER_RADIUS: f32 = 0.8;

/// Vertical field of view used by the rendering collaborator.
const FOV_Y_DEGREES: f32 = 75.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 1_000.0;

/// Camera frustum snapshot published by the renderer once per frame.
#[derive(Clone, Copy, Debug)]
pub struct CameraProjection {
    origin: Vec3,
    view_proj_inv: Mat4,
}

impl CameraProjection {
    /// Build the frustum for a viewpoint pose and viewport aspect ratio.
    #[must_use]
    pub fn perspective(position: Vec3, look_at: Vec3, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(position, look_at, Vec3::Y);
        let proj = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect.max(0.01), Z_NEAR, Z_FAR);
        Self {
            origin: position,
            view_proj_inv: (proj * view).inverse(),
        }
    }

    /// Cast a ray through a pointer position in normalized device
    /// coordinates (`[-1, 1]` on both axes, y up).
    #[must_use]
    pub fn pointer_ray(&self, ndc: Vec2) -> PointerRay {
        let near = self.view_proj_inv.project_point3(Vec3::new(ndc.x, ndc.y, 0.1));
        let far = self.view_proj_inv.project_point3(Vec3::new(ndc.x, ndc.y, 0.9));
        PointerRay {
            origin: self.origin,
            direction: (far - near).normalize_or_zero(),
        }
    }
}

/// A world-space ray originating at the camera.
#[derive(Clone, Copy, Debug)]
pub struct PointerRay {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl PointerRay {
    /// Distance along the ray to the nearest intersection with a sphere,
    /// if the sphere lies ahead of the origin.
    #[must_use]
    pub fn sphere_hit(&self, center: Vec3, radius: f32) -> Option<f32> {
        let to_center = center - self.origin;
        let projected = to_center.dot(self.direction);
        let closest_sq = to_center.length_squared() - projected * projected;
        let radius_sq = radius * radius;
        if closest_sq > radius_sq {
            return None;
        }
        let half_chord = (radius_sq - closest_sq).sqrt();
        let near = projected - half_chord;
        let far = projected + half_chord;
        if near > 0.0 {
            Some(near)
        } else if far > 0.0 {
            Some(far)
        } else {
            None
        }
    }
}

/// Return the index of the nearest marker under the pointer, if any.
#[must_use]
pub fn pick(
    pointer_ndc: Vec2,
    projection: &CameraProjection,
    markers: &[MarkerInstance],
) -> Option<usize> {
    if markers.is_empty() {
        debug!("pick requested before any timepoint markers exist");
        return None;
    }
    let ray = projection.pointer_ray(pointer_ndc);
    if ray.direction == Vec3::ZERO {
        return None;
    }
    markers
        .iter()
        .filter_map(|marker| {
            ray.sphere_hit(marker.position, MARKER_RADIUS * marker.scale)
                .map(|distance| (marker.index, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Highlight bookkeeping for the hovered marker.
///
/// The previously highlighted marker is restored to its default scale and
/// the newly hit one is scaled up; applying the same hit twice is a no-op.
#[derive(Debug, Default)]
pub struct HoverState {
    hovered: Option<usize>,
}

/// Scale applied to the hovered marker.
pub const HIGHLIGHT_SCALE: f32 = 1.2;

impl HoverState {
    /// Currently hovered marker index, if any.
    #[must_use]
    pub const fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Apply a pick result to the marker snapshot.
    pub fn apply(&mut self, markers: &mut [MarkerInstance], hit: Option<usize>) {
        if hit == self.hovered {
            return;
        }
        if let Some(previous) = self.hovered
            && let Some(marker) = markers.iter_mut().find(|m| m.index == previous)
        {
            marker.scale = 1.0;
        }
        if let Some(index) = hit
            && let Some(marker) = markers.iter_mut().find(|m| m.index == index)
        {
            marker.scale = HIGHLIGHT_SCALE;
        }
        self.hovered = hit;
    }

    /// Forget the hover without touching marker scales. Used when the
    /// whole batch is replaced (fresh instances start unhighlighted).
    pub fn reset(&mut self) {
        self.hovered = None;
    }
}
