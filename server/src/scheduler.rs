use std::sync::Arc;
use std::time::Duration;

use products_deals::DealIntake;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Run an intake pass every `period`. A pass that overruns its slot delays
/// the next one instead of stacking another on top.
pub async fn run_scheduled_intake(intake: Arc<DealIntake>, folder: String, period: Duration) {
    info!(folder = %folder, every_secs = period.as_secs(), "scheduled deal intake enabled");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        match intake.process_email_folder(&folder).await {
            Ok(stats) => info!(
                created = stats.created,
                ignored = stats.ignored,
                errors = stats.errors,
                "scheduled intake pass complete"
            ),
            Err(err) => warn!(error = %err, "scheduled intake pass failed"),
        }
    }
}
