use anyhow::{Context, Result};
use butterfly_app::{
    CommandSender, ScenarioSession, SessionCommand, SharedSession, create_command_bus,
    drain_pending_commands,
};
use butterfly_app::command::try_submit;
use butterfly_core::{ParameterField, ScenarioConfig};
use butterfly_forecast::{DEFAULT_TIMEOUT, ForecastClient};
use butterfly_scene::{CameraProjection, NullResources, ViewpointConfig, ViewpointPhase};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

fn main() -> Result<()> {
    init_tracing();
    let session = bootstrap_session()?;
    info!("Starting butterfly timeline shell");
    run_demo(session)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn bootstrap_session() -> Result<SharedSession> {
    let session = ScenarioSession::new(
        ScenarioConfig::default(),
        ViewpointConfig::default(),
        Box::new(NullResources),
    )?;
    Ok(Arc::new(Mutex::new(session)))
}

/// Headless demo loop: drain the command bus, advance the viewpoint, and
/// publish the projection a renderer would have used, once per tick.
fn run_demo(session: SharedSession) -> Result<()> {
    let (sender, receiver) = create_command_bus(32);

    try_submit(
        &sender,
        SessionCommand::SetParameter {
            field: ParameterField::InflationRate,
            value: 62.5,
        },
    );
    // The synthetic timeline tour starts immediately; a forecast response
    // re-enters through the bus whenever it lands.
    try_submit(&sender, SessionCommand::StartTimeline);
    let _forecast_runtime = spawn_forecast(&session, &sender)?;

    let mut last_phase = ViewpointPhase::Idle;
    for _ in 0..600 {
        let mut guard = session
            .lock()
            .map_err(|_| anyhow::anyhow!("session mutex poisoned"))?;
        drain_pending_commands(&receiver, &mut guard);
        let phase = guard.tick();
        let rig = guard.rig();
        let projection = CameraProjection::perspective(rig.position(), rig.look_at(), 16.0 / 9.0);
        guard.set_projection(projection);
        if phase == ViewpointPhase::Idle && last_phase == ViewpointPhase::Moving {
            info!(index = guard.rig().current_index(), "viewpoint settled");
        }
        last_phase = phase;
    }

    let guard = session
        .lock()
        .map_err(|_| anyhow::anyhow!("session mutex poisoned"))?;
    let summary = guard.summary();
    info!(
        epoch = summary.epoch,
        markers = summary.marker_count,
        index = summary.current_index,
        "demo loop finished"
    );
    Ok(())
}

/// Start a forecast fetch when an endpoint is configured. The request
/// runs on its own runtime and delivers its result through the command
/// bus, so the synthetic timeline stays live while it is in flight; a
/// failed fetch is a logged soft failure. The returned runtime must be
/// kept alive for the duration of the demo loop.
fn spawn_forecast(
    session: &SharedSession,
    sender: &CommandSender,
) -> Result<Option<tokio::runtime::Runtime>> {
    let Ok(endpoint) = std::env::var("BUTTERFLY_FORECAST_URL") else {
        return Ok(None);
    };

    let (ticket, params) = {
        let guard = session
            .lock()
            .map_err(|_| anyhow::anyhow!("session mutex poisoned"))?;
        (guard.exchange().issue(), *guard.model().parameters())
    };

    let client = ForecastClient::new(endpoint, DEFAULT_TIMEOUT)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("building forecast runtime")?;
    let sender = sender.clone();
    runtime.spawn(async move {
        match client.fetch(&params).await {
            Ok(forecast) => {
                let command = SessionCommand::ApplyForecast { ticket, forecast };
                if sender.send(command).await.is_err() {
                    warn!("command bus closed before the forecast arrived");
                }
            }
            Err(err) => warn!(%err, "forecast unavailable; keeping synthetic timeline"),
        }
    });
    Ok(Some(runtime))
}
