//! Scene-facing layer for the butterfly timeline: marker lifecycle,
//! viewpoint navigation, pointer picking, and trail colors.

use butterfly_core::Timepoint;
use glam::Vec3;
use tracing::debug;

pub mod camera;
pub mod picker;

pub use camera::{NavDirection, ViewpointConfig, ViewpointPhase, ViewpointRig};
pub use picker::{CameraProjection, HIGHLIGHT_SCALE, HoverState, MARKER_RADIUS, PointerRay, pick};

/// Non-owning snapshot of one marker as the renderer and picker see it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerInstance {
    /// Timepoint index this marker represents.
    pub index: usize,
    /// Display-space center of the marker sphere.
    pub position: Vec3,
    /// Current visual scale (1.0 default, 1.2 highlighted).
    pub scale: f32,
}

/// Disposal hook owned by the rendering collaborator. Invoked for each
/// detached marker before the replacement batch is installed.
pub trait MarkerResources: Send {
    fn dispose(&mut self, index: usize);
}

/// No-op resources for headless operation and tests.
#[derive(Debug, Default)]
pub struct NullResources;

impl MarkerResources for NullResources {
    fn dispose(&mut self, _index: usize) {}
}

/// The live marker batch. Replaced wholesale whenever the trajectory is
/// recomputed; the previous batch is detached and disposed first so a
/// render tick can never observe half-disposed geometry.
#[derive(Debug, Default)]
pub struct MarkerSet {
    instances: Vec<MarkerInstance>,
}

impl MarkerSet {
    /// Borrow the current snapshot.
    #[must_use]
    pub fn instances(&self) -> &[MarkerInstance] {
        &self.instances
    }

    /// Mutable access for hover bookkeeping.
    #[must_use]
    pub fn instances_mut(&mut self) -> &mut [MarkerInstance] {
        &mut self.instances
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Replace the batch: detach old, dispose old, install new, in that
    /// order.
    pub fn replace(&mut self, timepoints: &[Timepoint], resources: &mut dyn MarkerResources) {
        let old = std::mem::take(&mut self.instances);
        for instance in &old {
            resources.dispose(instance.index);
        }
        debug!(
            disposed = old.len(),
            installed = timepoints.len(),
            "marker batch replaced"
        );
        self.instances = timepoints
            .iter()
            .map(|timepoint| MarkerInstance {
                index: timepoint.index,
                position: timepoint.position,
                scale: 1.0,
            })
            .collect();
    }
}

/// Hue-ramped colors for the trajectory particle trail: fully saturated,
/// half lightness, hue walking the full circle across the sequence.
#[must_use]
pub fn trail_colors(count: usize) -> Vec<[f32; 3]> {
    (0..count)
        .map(|i| hsl_to_rgb(i as f32 / count.max(1) as f32, 1.0, 0.5))
        .collect()
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let hue_prime = (hue.rem_euclid(1.0)) * 6.0;
    let x = chroma * (1.0 - (hue_prime % 2.0 - 1.0).abs());
    let (r, g, b) = match hue_prime as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma * 0.5;
    [r + m, g + m, b + m]
}
