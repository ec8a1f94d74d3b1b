//! Core types shared across the Butterfly workspace.
//!
//! Everything here is pure and deterministic: three macroeconomic
//! parameters drive a Lorenz-type attractor, the resulting trajectory is
//! discretized into addressable timepoint markers, and a timeline of
//! per-month statistics is overlaid on those markers. Rendering, input,
//! and the remote forecast service live in sibling crates.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use thiserror::Error;
use tracing::debug;

/// The three macroeconomic scalars that drive the attractor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Parameters {
    /// Inflation rate, clamped to `[0, 100]`.
    pub inflation_rate: f32,
    /// Interest rate, clamped to `[0, 20]`.
    pub interest_rate: f32,
    /// GDP growth rate, clamped to `[0, 5]`.
    pub gdp_growth_rate: f32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            inflation_rate: 50.0,
            interest_rate: 5.0,
            gdp_growth_rate: 1.5,
        }
    }
}

impl Parameters {
    /// Write a single field, clamping the value into its declared range.
    /// Non-finite values are coerced to the range minimum.
    pub fn set(&mut self, field: ParameterField, value: f32) {
        let range = field.range();
        let clamped = if value.is_finite() {
            value.clamp(*range.start(), *range.end())
        } else {
            *range.start()
        };
        match field {
            ParameterField::InflationRate => self.inflation_rate = clamped,
            ParameterField::InterestRate => self.interest_rate = clamped,
            ParameterField::GdpGrowthRate => self.gdp_growth_rate = clamped,
        }
    }
}

/// Discriminant for addressing one parameter field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParameterField {
    InflationRate,
    InterestRate,
    GdpGrowthRate,
}

impl ParameterField {
    /// Declared slider range for this field.
    #[must_use]
    pub const fn range(self) -> RangeInclusive<f32> {
        match self {
            Self::InflationRate => 0.0..=100.0,
            Self::InterestRate => 0.0..=20.0,
            Self::GdpGrowthRate => 0.0..=5.0,
        }
    }

    /// Label shown next to the field in marker overlays.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InflationRate => "Inflation Rate",
            Self::InterestRate => "Interest Rate",
            Self::GdpGrowthRate => "GDP Growth Rate",
        }
    }

    /// Bounds a forecast value for this field must satisfy before merging.
    #[must_use]
    pub const fn forecast_bounds(self) -> RangeInclusive<f32> {
        match self {
            Self::InflationRate => 1.0..=20.0,
            Self::InterestRate => 1.0..=10.0,
            Self::GdpGrowthRate => 1.0..=5.0,
        }
    }
}

/// Errors raised while recomputing scenario state.
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The integrator produced a non-finite coordinate. The previous
    /// trajectory must be retained by the caller.
    #[error("trajectory diverged to a non-finite value at step {step}")]
    NumericDivergence { step: usize },
    /// Sampling was attempted over an empty trajectory.
    #[error("cannot sample timepoints from an empty trajectory")]
    EmptyTrajectory,
    /// Fewer than two markers were requested.
    #[error("marker count must be at least 2, got {0}")]
    BadMarkerCount(usize),
}

/// Static configuration for a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioConfig {
    /// Number of trajectory points produced per integration.
    pub trajectory_len: usize,
    /// Fixed integration step in attractor time units.
    pub time_step: f32,
    /// Number of timepoint markers sampled along the trajectory.
    pub marker_count: usize,
    /// Calendar months represented by one marker step.
    pub months_per_marker: u32,
    /// Scale factor applied to trajectory positions for display.
    pub visual_scale: f32,
    /// Last month covered by the derived timeline.
    pub horizon_months: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            trajectory_len: 1_000,
            time_step: 0.01,
            marker_count: 5,
            months_per_marker: 3,
            visual_scale: 2.0,
            horizon_months: 15,
        }
    }
}

impl ScenarioConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.trajectory_len < 2 {
            return Err(ScenarioError::InvalidConfig(
                "trajectory_len must be at least 2",
            ));
        }
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(ScenarioError::InvalidConfig(
                "time_step must be positive and finite",
            ));
        }
        if self.marker_count < 2 {
            return Err(ScenarioError::InvalidConfig(
                "marker_count must be at least 2",
            ));
        }
        if self.months_per_marker == 0 {
            return Err(ScenarioError::InvalidConfig(
                "months_per_marker must be non-zero",
            ));
        }
        if !self.visual_scale.is_finite() || self.visual_scale <= 0.0 {
            return Err(ScenarioError::InvalidConfig(
                "visual_scale must be positive and finite",
            ));
        }
        if self.horizon_months == 0 || !self.horizon_months.is_multiple_of(self.months_per_marker) {
            return Err(ScenarioError::InvalidConfig(
                "horizon_months must be a non-zero multiple of months_per_marker",
            ));
        }
        Ok(())
    }
}

/// Lorenz system coefficients derived from the parameters.
///
/// The maps are monotonic and keep every combination inside the chaotic
/// regime: sigma in `[6, 14]`, rho in `[24, 32]`, beta in `[1.5, 3.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LorenzCoefficients {
    pub sigma: f32,
    pub rho: f32,
    pub beta: f32,
}

impl LorenzCoefficients {
    /// Map the macro parameters onto attractor coefficients.
    #[must_use]
    pub fn from_parameters(params: &Parameters) -> Self {
        let inflation = params.inflation_rate.clamp(0.0, 100.0);
        let interest = params.interest_rate.clamp(0.0, 20.0);
        let gdp = params.gdp_growth_rate.clamp(0.0, 5.0);
        Self {
            sigma: 6.0 + inflation / 100.0 * 8.0,
            rho: 24.0 + interest / 20.0 * 8.0,
            beta: 1.5 + gdp / 5.0 * 1.5,
        }
    }
}

/// Fixed initial condition shared by every integration.
const INITIAL_POINT: Vec3 = Vec3::new(0.1, 0.0, 0.0);

#[inline]
fn lorenz_derivative(coeffs: &LorenzCoefficients, p: Vec3) -> Vec3 {
    Vec3::new(
        coeffs.sigma * (p.y - p.x),
        p.x * (coeffs.rho - p.z) - p.y,
        p.x * p.y - coeffs.beta * p.z,
    )
}

/// Integrate the attractor for the given parameters.
///
/// Produces exactly `config.trajectory_len` points via RK4 from a fixed
/// initial condition. Deterministic for fixed inputs. A non-finite
/// coordinate aborts the whole run with [`ScenarioError::NumericDivergence`];
/// no partial trajectory is returned.
pub fn integrate(params: &Parameters, config: &ScenarioConfig) -> Result<Vec<Vec3>, ScenarioError> {
    config.validate()?;
    let coeffs = LorenzCoefficients::from_parameters(params);
    let dt = config.time_step;
    let mut point = INITIAL_POINT;
    let mut points = Vec::with_capacity(config.trajectory_len);
    for step in 0..config.trajectory_len {
        let k1 = lorenz_derivative(&coeffs, point);
        let k2 = lorenz_derivative(&coeffs, point + k1 * (dt * 0.5));
        let k3 = lorenz_derivative(&coeffs, point + k2 * (dt * 0.5));
        let k4 = lorenz_derivative(&coeffs, point + k3 * dt);
        point += (k1 + (k2 + k3) * 2.0 + k4) * (dt / 6.0);
        if !point.is_finite() {
            return Err(ScenarioError::NumericDivergence { step });
        }
        points.push(point);
    }
    Ok(points)
}

/// Closed set of per-marker statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MarkerStats {
    pub inflation_rate: f32,
    pub interest_rate: f32,
    pub gdp_growth_rate: f32,
}

impl From<&Parameters> for MarkerStats {
    fn from(params: &Parameters) -> Self {
        Self {
            inflation_rate: params.inflation_rate,
            interest_rate: params.interest_rate,
            gdp_growth_rate: params.gdp_growth_rate,
        }
    }
}

impl MarkerStats {
    /// Read a single field by its discriminant.
    #[must_use]
    pub fn get(&self, field: ParameterField) -> f32 {
        match field {
            ParameterField::InflationRate => self.inflation_rate,
            ParameterField::InterestRate => self.interest_rate,
            ParameterField::GdpGrowthRate => self.gdp_growth_rate,
        }
    }

    fn set(&mut self, field: ParameterField, value: f32) {
        match field {
            ParameterField::InflationRate => self.inflation_rate = value,
            ParameterField::InterestRate => self.interest_rate = value,
            ParameterField::GdpGrowthRate => self.gdp_growth_rate = value,
        }
    }

    /// Label/value pairs for the hover overlay, formatted as percentages.
    #[must_use]
    pub fn display_rows(&self) -> [(&'static str, String); 3] {
        [
            ParameterField::InflationRate,
            ParameterField::InterestRate,
            ParameterField::GdpGrowthRate,
        ]
        .map(|field| (field.label(), format!("{:.1}%", self.get(field))))
    }
}

/// A discrete, addressable sample along the trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Timepoint {
    /// Position of this marker within the batch, starting at 0.
    pub index: usize,
    /// Calendar offset in months from the scenario start.
    pub month_offset: u32,
    /// Display-space position (already scaled by `visual_scale`).
    pub position: Vec3,
    /// Statistics shown when the marker is hovered.
    pub stats: MarkerStats,
}

/// Sample `marker_count` timepoints from a trajectory.
///
/// Guarantees exactly `marker_count` results with month offsets strictly
/// increasing from 0, the last of which references the final or
/// near-final trajectory sample regardless of rounding.
pub fn sample_timepoints(
    trajectory: &[Vec3],
    marker_count: usize,
    config: &ScenarioConfig,
) -> Result<Vec<Timepoint>, ScenarioError> {
    if trajectory.is_empty() {
        return Err(ScenarioError::EmptyTrajectory);
    }
    if marker_count < 2 {
        return Err(ScenarioError::BadMarkerCount(marker_count));
    }
    let step = trajectory.len() / (marker_count - 1);
    Ok((0..marker_count)
        .map(|i| {
            let sample = (i * step).min(trajectory.len() - 1);
            Timepoint {
                index: i,
                month_offset: i as u32 * config.months_per_marker,
                position: trajectory[sample] * config.visual_scale,
                stats: MarkerStats::default(),
            }
        })
        .collect())
}

/// One entry of the derived timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub month_offset: u32,
    pub stats: MarkerStats,
}

/// Ordered per-month statistics spanning the forecast horizon.
///
/// Invariant: month offsets are unique and strictly increasing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Borrow the ordered entries.
    #[must_use]
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Look up the statistics for a month offset.
    #[must_use]
    pub fn get(&self, month_offset: u32) -> Option<&MarkerStats> {
        self.entries
            .iter()
            .find(|entry| entry.month_offset == month_offset)
            .map(|entry| &entry.stats)
    }

    fn get_mut(&mut self, month_offset: u32) -> Option<&mut MarkerStats> {
        self.entries
            .iter_mut()
            .find(|entry| entry.month_offset == month_offset)
            .map(|entry| &mut entry.stats)
    }
}

/// Derive a synthetic timeline by blending baseline toward current.
///
/// Pure function of its inputs: the entry at month `m` sits `m / horizon`
/// of the way from the baseline statistics to the current ones.
#[must_use]
pub fn derive_timeline(
    baseline: &Parameters,
    current: &Parameters,
    config: &ScenarioConfig,
) -> Timeline {
    let from = MarkerStats::from(baseline);
    let to = MarkerStats::from(current);
    let horizon = config.horizon_months.max(1) as f32;
    let entries = (0..=config.horizon_months)
        .step_by(config.months_per_marker as usize)
        .map(|month| {
            let t = month as f32 / horizon;
            let mut stats = MarkerStats::default();
            for field in [
                ParameterField::InflationRate,
                ParameterField::InterestRate,
                ParameterField::GdpGrowthRate,
            ] {
                let a = from.get(field);
                let b = to.get(field);
                stats.set(field, a + (b - a) * t);
            }
            TimelineEntry {
                month_offset: month,
                stats,
            }
        })
        .collect();
    Timeline { entries }
}

/// Externally forecast statistics keyed by month offset.
pub type Forecast = BTreeMap<u32, ForecastEntry>;

/// One forecast entry as supplied by the remote collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ForecastEntry {
    pub inflation_rate: f32,
    pub interest_rate: f32,
    pub gdp_growth_rate: f32,
}

impl ForecastEntry {
    #[must_use]
    fn get(&self, field: ParameterField) -> f32 {
        match field {
            ParameterField::InflationRate => self.inflation_rate,
            ParameterField::InterestRate => self.interest_rate,
            ParameterField::GdpGrowthRate => self.gdp_growth_rate,
        }
    }
}

/// A forecast field rejected during merge. Non-fatal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastWarning {
    pub month_offset: u32,
    pub field: ParameterField,
    pub value: f32,
}

/// Overlay forecast entries onto matching timeline months.
///
/// Entries with no matching month are ignored. Each field is validated
/// against [`ParameterField::forecast_bounds`] individually: an
/// out-of-range field is dropped and reported, while valid sibling
/// fields in the same entry still merge. Never changes the number or
/// ordering of timeline entries.
pub fn merge_forecast(timeline: &mut Timeline, forecast: &Forecast) -> Vec<ForecastWarning> {
    let mut warnings = Vec::new();
    for (&month_offset, entry) in forecast {
        let Some(stats) = timeline.get_mut(month_offset) else {
            debug!(month_offset, "forecast month has no timeline entry; skipping");
            continue;
        };
        for field in [
            ParameterField::InflationRate,
            ParameterField::InterestRate,
            ParameterField::GdpGrowthRate,
        ] {
            let value = entry.get(field);
            if value.is_finite() && field.forecast_bounds().contains(&value) {
                stats.set(field, value);
            } else {
                warnings.push(ForecastWarning {
                    month_offset,
                    field,
                    value,
                });
            }
        }
    }
    warnings
}

/// Aggregate scenario state shared by the navigation and rendering layers.
///
/// Owns the current and baseline parameters, the last-known-good
/// trajectory, the timepoint batch, and the timeline. Every successful
/// recompute replaces the batch atomically and bumps the epoch; a failed
/// recompute leaves the previous state fully installed.
#[derive(Debug)]
pub struct ScenarioModel {
    config: ScenarioConfig,
    baseline: Parameters,
    current: Parameters,
    trajectory: Vec<Vec3>,
    timepoints: Vec<Timepoint>,
    timeline: Timeline,
    epoch: u64,
}

impl ScenarioModel {
    /// Build a model and run the initial recompute.
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        Self::with_parameters(config, Parameters::default())
    }

    /// Build a model with explicit starting parameters (also the baseline).
    pub fn with_parameters(
        config: ScenarioConfig,
        params: Parameters,
    ) -> Result<Self, ScenarioError> {
        config.validate()?;
        let (trajectory, timepoints, timeline) = Self::rebuild(&config, &params, &params)?;
        Ok(Self {
            config,
            baseline: params,
            current: params,
            trajectory,
            timepoints,
            timeline,
            epoch: 1,
        })
    }

    fn rebuild(
        config: &ScenarioConfig,
        baseline: &Parameters,
        current: &Parameters,
    ) -> Result<(Vec<Vec3>, Vec<Timepoint>, Timeline), ScenarioError> {
        let trajectory = integrate(current, config)?;
        let mut timepoints = sample_timepoints(&trajectory, config.marker_count, config)?;
        let timeline = derive_timeline(baseline, current, config);
        Self::overlay(&mut timepoints, &timeline);
        Ok((trajectory, timepoints, timeline))
    }

    fn overlay(timepoints: &mut [Timepoint], timeline: &Timeline) {
        for timepoint in timepoints {
            if let Some(stats) = timeline.get(timepoint.month_offset) {
                timepoint.stats = *stats;
            }
        }
    }

    /// Mutate one parameter (clamped into range) and recompute downstream
    /// state. On divergence the previous trajectory, timepoints, and
    /// timeline stay installed; only the parameter value has changed.
    pub fn set_parameter(&mut self, field: ParameterField, value: f32) -> Result<(), ScenarioError> {
        self.current.set(field, value);
        self.recompute()
    }

    /// Replace the configuration, keeping the old one if the candidate is
    /// invalid or its recompute diverges.
    pub fn update_config(&mut self, config: ScenarioConfig) -> Result<(), ScenarioError> {
        config.validate()?;
        let (trajectory, timepoints, timeline) =
            Self::rebuild(&config, &self.baseline, &self.current)?;
        self.config = config;
        self.install(trajectory, timepoints, timeline);
        Ok(())
    }

    fn recompute(&mut self) -> Result<(), ScenarioError> {
        let (trajectory, timepoints, timeline) =
            Self::rebuild(&self.config, &self.baseline, &self.current)?;
        self.install(trajectory, timepoints, timeline);
        Ok(())
    }

    fn install(&mut self, trajectory: Vec<Vec3>, timepoints: Vec<Timepoint>, timeline: Timeline) {
        self.trajectory = trajectory;
        self.timepoints = timepoints;
        self.timeline = timeline;
        self.epoch += 1;
    }

    /// Merge a forecast into the timeline and re-overlay marker statistics.
    /// Returns the per-field rejections; the merge itself never fails.
    pub fn apply_forecast(&mut self, forecast: &Forecast) -> Vec<ForecastWarning> {
        let warnings = merge_forecast(&mut self.timeline, forecast);
        Self::overlay(&mut self.timepoints, &self.timeline);
        self.epoch += 1;
        warnings
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Parameters the scenario started from.
    #[must_use]
    pub fn baseline(&self) -> &Parameters {
        &self.baseline
    }

    /// Parameters currently driving the attractor.
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.current
    }

    /// Last-known-good trajectory in attractor space (unscaled).
    #[must_use]
    pub fn trajectory(&self) -> &[Vec3] {
        &self.trajectory
    }

    /// Current timepoint batch in display space.
    #[must_use]
    pub fn timepoints(&self) -> &[Timepoint] {
        &self.timepoints
    }

    /// Derived (and possibly forecast-merged) timeline.
    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Monotonic counter bumped on every installed recompute or merge.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast_entry(inflation: f32, interest: f32, gdp: f32) -> ForecastEntry {
        ForecastEntry {
            inflation_rate: inflation,
            interest_rate: interest,
            gdp_growth_rate: gdp,
        }
    }

    #[test]
    fn integrate_is_finite_across_parameter_extremes() {
        let config = ScenarioConfig::default();
        for inflation in [0.0, 50.0, 100.0] {
            for interest in [0.0, 5.0, 20.0] {
                for gdp in [0.0, 1.5, 5.0] {
                    let params = Parameters {
                        inflation_rate: inflation,
                        interest_rate: interest,
                        gdp_growth_rate: gdp,
                    };
                    let points = integrate(&params, &config).expect("integration succeeds");
                    assert_eq!(points.len(), config.trajectory_len);
                    assert!(
                        points.iter().all(|p| p.is_finite()),
                        "non-finite point for params {params:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn integrate_is_deterministic() {
        let config = ScenarioConfig::default();
        let params = Parameters::default();
        let a = integrate(&params, &config).expect("first run");
        let b = integrate(&params, &config).expect("second run");
        assert_eq!(a, b);
    }

    #[test]
    fn integrate_reports_divergence_for_oversized_step() {
        let config = ScenarioConfig {
            time_step: 50.0,
            ..ScenarioConfig::default()
        };
        let err = integrate(&Parameters::default(), &config).expect_err("divergence");
        assert!(matches!(err, ScenarioError::NumericDivergence { .. }));
    }

    #[test]
    fn coefficient_map_is_monotonic_and_bounded() {
        let low = LorenzCoefficients::from_parameters(&Parameters {
            inflation_rate: 0.0,
            interest_rate: 0.0,
            gdp_growth_rate: 0.0,
        });
        let high = LorenzCoefficients::from_parameters(&Parameters {
            inflation_rate: 100.0,
            interest_rate: 20.0,
            gdp_growth_rate: 5.0,
        });
        assert_eq!(low.sigma, 6.0);
        assert_eq!(high.sigma, 14.0);
        assert_eq!(low.rho, 24.0);
        assert_eq!(high.rho, 32.0);
        assert_eq!(low.beta, 1.5);
        assert_eq!(high.beta, 3.0);
    }

    #[test]
    fn sampler_produces_exact_count_with_increasing_offsets() {
        let config = ScenarioConfig::default();
        let trajectory = integrate(&Parameters::default(), &config).expect("trajectory");
        for marker_count in [2, 3, 5, 8] {
            let timepoints =
                sample_timepoints(&trajectory, marker_count, &config).expect("sampling succeeds");
            assert_eq!(timepoints.len(), marker_count);
            assert_eq!(timepoints[0].month_offset, 0);
            for pair in timepoints.windows(2) {
                assert!(pair[0].month_offset < pair[1].month_offset);
            }
            let last = timepoints.last().expect("non-empty");
            let step = trajectory.len() / (marker_count - 1);
            let sample = ((marker_count - 1) * step).min(trajectory.len() - 1);
            assert_eq!(last.position, trajectory[sample] * config.visual_scale);
            assert!(
                sample + step >= trajectory.len(),
                "last marker should land on a near-final sample"
            );
        }
    }

    #[test]
    fn sampler_rejects_degenerate_inputs() {
        let config = ScenarioConfig::default();
        assert_eq!(
            sample_timepoints(&[], 5, &config),
            Err(ScenarioError::EmptyTrajectory)
        );
        let trajectory = vec![Vec3::ONE; 10];
        assert_eq!(
            sample_timepoints(&trajectory, 1, &config),
            Err(ScenarioError::BadMarkerCount(1))
        );
    }

    #[test]
    fn timeline_blends_baseline_toward_current() {
        let config = ScenarioConfig::default();
        let baseline = Parameters::default();
        let current = Parameters {
            inflation_rate: 80.0,
            interest_rate: 10.0,
            gdp_growth_rate: 3.0,
        };
        let timeline = derive_timeline(&baseline, &current, &config);
        let offsets: Vec<u32> = timeline.entries().iter().map(|e| e.month_offset).collect();
        assert_eq!(offsets, vec![0, 3, 6, 9, 12, 15]);

        let first = timeline.get(0).expect("month 0");
        assert_eq!(*first, MarkerStats::from(&baseline));
        let last = timeline.get(15).expect("month 15");
        assert_eq!(*last, MarkerStats::from(&current));
        let mid = timeline.get(6).expect("month 6");
        assert!(mid.inflation_rate > baseline.inflation_rate);
        assert!(mid.inflation_rate < current.inflation_rate);
    }

    #[test]
    fn merge_targets_only_matching_months() {
        let config = ScenarioConfig::default();
        let baseline = Parameters::default();
        let mut timeline = derive_timeline(&baseline, &baseline, &config);
        let before: Vec<TimelineEntry> = timeline.entries().to_vec();

        let mut forecast = Forecast::new();
        forecast.insert(3, forecast_entry(25.0, 4.0, 2.0));
        let warnings = merge_forecast(&mut timeline, &forecast);

        // 25 is above the inflation bound of 20; the siblings still merge.
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].month_offset, 3);
        assert_eq!(warnings[0].field, ParameterField::InflationRate);

        let merged = timeline.get(3).expect("month 3");
        assert_eq!(merged.inflation_rate, before[1].stats.inflation_rate);
        assert_eq!(merged.interest_rate, 4.0);
        assert_eq!(merged.gdp_growth_rate, 2.0);

        for (entry, original) in timeline.entries().iter().zip(&before) {
            if entry.month_offset != 3 {
                assert_eq!(entry, original);
            }
        }
    }

    #[test]
    fn merge_ignores_unknown_months_and_keeps_ordering() {
        let config = ScenarioConfig::default();
        let baseline = Parameters::default();
        let mut timeline = derive_timeline(&baseline, &baseline, &config);
        let count = timeline.entries().len();

        let mut forecast = Forecast::new();
        forecast.insert(42, forecast_entry(10.0, 4.0, 2.0));
        let warnings = merge_forecast(&mut timeline, &forecast);
        assert!(warnings.is_empty());
        assert_eq!(timeline.entries().len(), count);
    }

    #[test]
    fn merge_rejects_out_of_range_gdp_field_by_field() {
        let config = ScenarioConfig::default();
        let baseline = Parameters::default();
        let mut timeline = derive_timeline(&baseline, &baseline, &config);
        let original_gdp = timeline.get(6).expect("month 6").gdp_growth_rate;

        let mut forecast = Forecast::new();
        forecast.insert(6, forecast_entry(12.0, 3.0, 9.0));
        let warnings = merge_forecast(&mut timeline, &forecast);

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, ParameterField::GdpGrowthRate);
        assert_eq!(warnings[0].value, 9.0);

        let merged = timeline.get(6).expect("month 6");
        assert_eq!(merged.inflation_rate, 12.0);
        assert_eq!(merged.interest_rate, 3.0);
        assert_eq!(merged.gdp_growth_rate, original_gdp);
    }

    #[test]
    fn model_matches_reference_scenario() {
        let model = ScenarioModel::new(ScenarioConfig::default()).expect("model");
        let offsets: Vec<u32> = model.timepoints().iter().map(|t| t.month_offset).collect();
        assert_eq!(offsets, vec![0, 3, 6, 9, 12]);
        assert_eq!(model.parameters().inflation_rate, 50.0);
        assert_eq!(model.parameters().interest_rate, 5.0);
        assert_eq!(model.parameters().gdp_growth_rate, 1.5);
    }

    #[test]
    fn set_parameter_clamps_and_recomputes() {
        let mut model = ScenarioModel::new(ScenarioConfig::default()).expect("model");
        let epoch = model.epoch();
        let before = model.timepoints().to_vec();

        model
            .set_parameter(ParameterField::InterestRate, 500.0)
            .expect("recompute");
        assert_eq!(model.parameters().interest_rate, 20.0);
        assert_eq!(model.epoch(), epoch + 1);
        assert_ne!(model.timepoints(), &before[..]);
    }

    #[test]
    fn failed_config_update_retains_previous_state() {
        let mut model = ScenarioModel::new(ScenarioConfig::default()).expect("model");
        let epoch = model.epoch();
        let before = model.timepoints().to_vec();

        let divergent = ScenarioConfig {
            time_step: 50.0,
            ..ScenarioConfig::default()
        };
        let err = model.update_config(divergent).expect_err("divergence");
        assert!(matches!(err, ScenarioError::NumericDivergence { .. }));
        assert_eq!(model.epoch(), epoch);
        assert_eq!(model.timepoints(), &before[..]);
        assert_eq!(model.config().time_step, 0.01);
    }

    #[test]
    fn forecast_overlays_marker_statistics() {
        let mut model = ScenarioModel::new(ScenarioConfig::default()).expect("model");
        let untouched: Vec<MarkerStats> = model.timepoints().iter().map(|t| t.stats).collect();

        let mut forecast = Forecast::new();
        forecast.insert(3, forecast_entry(12.0, 4.0, 2.0));
        let warnings = model.apply_forecast(&forecast);
        assert!(warnings.is_empty());

        for timepoint in model.timepoints() {
            if timepoint.month_offset == 3 {
                assert_eq!(timepoint.stats.inflation_rate, 12.0);
                assert_eq!(timepoint.stats.interest_rate, 4.0);
                assert_eq!(timepoint.stats.gdp_growth_rate, 2.0);
            } else {
                assert_eq!(timepoint.stats, untouched[timepoint.index]);
            }
        }
    }

    #[test]
    fn timepoints_survive_json_serialization() {
        // Positions embed glam vectors; their serde support must stay wired up.
        let model = ScenarioModel::new(ScenarioConfig::default()).expect("model");
        let json = serde_json::to_value(model.timepoints()).expect("serialize");
        assert!(json[0]["position"].is_array());

        let restored: Vec<Timepoint> = serde_json::from_value(json).expect("deserialize");
        assert_eq!(restored, model.timepoints());
    }

    #[test]
    fn display_rows_format_as_percentages() {
        let stats = MarkerStats {
            inflation_rate: 12.0,
            interest_rate: 4.25,
            gdp_growth_rate: 2.0,
        };
        let rows = stats.display_rows();
        assert_eq!(rows[0], ("Inflation Rate", "12.0%".to_string()));
        assert_eq!(rows[1], ("Interest Rate", "4.2%".to_string()));
        assert_eq!(rows[2], ("GDP Growth Rate", "2.0%".to_string()));
    }
}
