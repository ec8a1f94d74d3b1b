//! One interactive scenario session: the model, the viewpoint rig, the
//! marker batch, and the hover/forecast bookkeeping that ties them
//! together. Every user-facing surface talks to the session through
//! [`SessionCommand`]s so state mutation happens in one place, in order.

use butterfly_core::{Forecast, ParameterField, ScenarioConfig, ScenarioError, ScenarioModel};
use butterfly_forecast::ForecastExchange;
use butterfly_scene::{
    CameraProjection, HoverState, MarkerResources, MarkerSet, NavDirection, ViewpointConfig,
    ViewpointPhase, ViewpointRig, pick,
};
use glam::Vec2;
use tracing::{debug, warn};

/// Commands accepted by [`ScenarioSession::apply`].
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Slider moved: set one parameter and recompute the trajectory.
    SetParameter { field: ParameterField, value: f32 },
    /// Timeline scrubber: jump to the marker representing `months`.
    NavigateToMonth { months: u32 },
    /// Arrow buttons: step one marker forward or back.
    NavigateRelative(NavDirection),
    /// Begin the timeline tour at the first marker.
    StartTimeline,
    /// Pointer moved; `ndc` is the cursor in normalized device coords.
    PointerMoved { ndc: Vec2 },
    /// A forecast response arrived for the request stamped `ticket`.
    ApplyForecast { ticket: u64, forecast: Forecast },
    /// Replace the scenario configuration wholesale.
    UpdateConfig(Box<ScenarioConfig>),
}

/// Compact state snapshot for logs and status lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub epoch: u64,
    pub phase: ViewpointPhase,
    pub current_index: usize,
    pub marker_count: usize,
    pub hovered: Option<usize>,
}

pub struct ScenarioSession {
    model: ScenarioModel,
    rig: ViewpointRig,
    markers: MarkerSet,
    hover: HoverState,
    exchange: ForecastExchange,
    projection: Option<CameraProjection>,
    resources: Box<dyn MarkerResources>,
}

impl ScenarioSession {
    pub fn new(
        config: ScenarioConfig,
        viewpoint: ViewpointConfig,
        resources: Box<dyn MarkerResources>,
    ) -> Result<Self, ScenarioError> {
        let model = ScenarioModel::new(config)?;
        let mut session = Self {
            model,
            rig: ViewpointRig::new(viewpoint),
            markers: MarkerSet::default(),
            hover: HoverState::default(),
            exchange: ForecastExchange::default(),
            projection: None,
            resources,
        };
        session.sync_markers();
        Ok(session)
    }

    #[must_use]
    pub fn model(&self) -> &ScenarioModel {
        &self.model
    }

    #[must_use]
    pub fn rig(&self) -> &ViewpointRig {
        &self.rig
    }

    #[must_use]
    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    #[must_use]
    pub fn hovered(&self) -> Option<usize> {
        self.hover.hovered()
    }

    /// Ticket source for outgoing forecast requests.
    #[must_use]
    pub fn exchange(&self) -> &ForecastExchange {
        &self.exchange
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            epoch: self.model.epoch(),
            phase: self.rig.phase(),
            current_index: self.rig.current_index(),
            marker_count: self.markers.len(),
            hovered: self.hover.hovered(),
        }
    }

    /// Install the projection the renderer used for the latest frame.
    /// Picking is undefined until the first projection arrives.
    pub fn set_projection(&mut self, projection: CameraProjection) {
        self.projection = Some(projection);
    }

    /// Apply one command. Failures are soft: the session logs and keeps
    /// its previous state, matching the last-known-good recompute rule.
    pub fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetParameter { field, value } => {
                match self.model.set_parameter(field, value) {
                    Ok(()) => self.sync_markers(),
                    Err(err) => {
                        warn!(%err, field = field.label(), value, "keeping previous trajectory");
                    }
                }
            }
            SessionCommand::NavigateToMonth { months } => {
                self.rig.navigate_to_month(
                    months,
                    self.model.timepoints(),
                    self.model.config().months_per_marker,
                );
            }
            SessionCommand::NavigateRelative(direction) => {
                self.rig.navigate_relative(direction, self.model.timepoints());
            }
            SessionCommand::StartTimeline => {
                self.rig.start_at_first(self.model.timepoints());
            }
            SessionCommand::PointerMoved { ndc } => {
                let Some(projection) = &self.projection else {
                    debug!("pointer moved before a projection was published");
                    return;
                };
                let hit = pick(ndc, projection, self.markers.instances());
                self.hover.apply(self.markers.instances_mut(), hit);
            }
            SessionCommand::ApplyForecast { ticket, forecast } => {
                if !self.exchange.accept(ticket) {
                    debug!(ticket, "dropping superseded forecast response");
                    return;
                }
                for warning in self.model.apply_forecast(&forecast) {
                    warn!(
                        month = warning.month_offset,
                        field = warning.field.label(),
                        value = warning.value,
                        "forecast value out of bounds; field ignored"
                    );
                }
                self.sync_markers();
                // A fresh forecast restarts the tour from the present.
                self.rig.start_at_first(self.model.timepoints());
            }
            SessionCommand::UpdateConfig(config) => match self.model.update_config(*config) {
                Ok(()) => self.sync_markers(),
                Err(err) => warn!(%err, "keeping previous configuration"),
            },
        }
    }

    /// Advance the viewpoint one tick. Runs after the command drain so
    /// every queued mutation is visible to this frame's motion.
    pub fn tick(&mut self) -> ViewpointPhase {
        self.rig.advance()
    }

    fn sync_markers(&mut self) {
        self.markers
            .replace(self.model.timepoints(), self.resources.as_mut());
        self.hover.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use butterfly_scene::NullResources;

    fn session() -> ScenarioSession {
        ScenarioSession::new(
            ScenarioConfig::default(),
            ViewpointConfig::default(),
            Box::new(NullResources),
        )
        .expect("session")
    }

    #[test]
    fn new_session_installs_markers_immediately() {
        let session = session();
        assert_eq!(session.markers().len(), 5);
        assert_eq!(session.summary().epoch, 1);
    }

    #[test]
    fn non_finite_parameter_is_coerced_and_recomputed() {
        let mut session = session();
        let before = session.model().epoch();
        session.apply(SessionCommand::SetParameter {
            field: ParameterField::InflationRate,
            value: f32::NAN,
        });
        assert_eq!(session.model().parameters().inflation_rate, 0.0);
        assert_eq!(session.model().epoch(), before + 1);
        assert_eq!(session.markers().len(), 5);
    }

    #[test]
    fn invalid_config_keeps_previous_state() {
        let mut session = session();
        let before = session.model().epoch();
        let bad = ScenarioConfig {
            marker_count: 1,
            ..ScenarioConfig::default()
        };
        session.apply(SessionCommand::UpdateConfig(Box::new(bad)));
        assert_eq!(session.model().epoch(), before);
        assert_eq!(session.model().config().marker_count, 5);
        assert_eq!(session.markers().len(), 5);
    }

    #[test]
    fn pointer_before_projection_is_ignored() {
        let mut session = session();
        session.apply(SessionCommand::PointerMoved { ndc: Vec2::ZERO });
        assert_eq!(session.hovered(), None);
    }

    #[test]
    fn stale_forecast_ticket_is_dropped() {
        let mut session = session();
        let stale = session.exchange().issue();
        let _newer = session.exchange().issue();
        let epoch = session.model().epoch();

        session.apply(SessionCommand::ApplyForecast {
            ticket: stale,
            forecast: Forecast::new(),
        });
        assert_eq!(session.model().epoch(), epoch, "stale response must not touch state");
        assert!(!session.rig().is_moving());
    }

    #[test]
    fn accepted_forecast_restarts_the_tour() {
        let mut session = session();
        let ticket = session.exchange().issue();
        session.apply(SessionCommand::ApplyForecast {
            ticket,
            forecast: Forecast::new(),
        });
        assert_eq!(session.rig().current_index(), 0);
        assert!(session.rig().is_moving());
    }
}
