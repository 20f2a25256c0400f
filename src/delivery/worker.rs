use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::Delivery;

/// Run the submission queue every `poll_interval`. Runs never overlap, a slow
/// run delays the next tick.
pub async fn run_until_stopped(delivery: Delivery, poll_interval: Duration) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Polling the submission queue every {:?}", poll_interval);

    loop {
        interval.tick().await;

        match delivery.submit_queue().await {
            Ok(0) => {}
            Ok(count) => tracing::info!("Processed {} submissions", count),
            Err(error) => {
                tracing::error!(error.cause_chain = ?error, "Failed to process the submission queue");
            }
        }
    }
}
