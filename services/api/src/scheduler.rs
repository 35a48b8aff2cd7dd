//! services/api/src/scheduler.rs
//!
//! The periodic generation trigger. A tokio interval ticks on a configurable
//! cadence; each tick composes every active weekly template that has not yet
//! been generated for the current ISO week. The period key makes the tick
//! interval safe to set well below a week.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use newsletter_core::compose::Composer;
use newsletter_core::domain::Frequency;
use newsletter_core::ports::{NewsletterStore, PortResult, TemplateStore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Idempotency key for one scheduled period, e.g. "2026-W35".
pub fn period_key(now: DateTime<Utc>) -> String {
    let week = now.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// One scheduler pass: compose every active weekly template whose period slot
/// is still unclaimed. A failure for one template is logged and does not stop
/// the remaining templates. Returns the number of newsletters generated.
pub async fn run_scheduled_generation(
    templates: &Arc<dyn TemplateStore>,
    newsletters: &Arc<dyn NewsletterStore>,
    composer: &Composer,
    now: DateTime<Utc>,
) -> PortResult<usize> {
    let key = period_key(now);
    let candidates = templates.list_templates(true).await?;

    let mut generated = 0;
    for template in candidates
        .iter()
        .filter(|t| t.frequency == Frequency::Weekly)
    {
        match newsletters
            .try_claim_generation_run(template.id, &key)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(template = %template.name, period = %key, "already generated this period");
                continue;
            }
            Err(e) => {
                error!(template = %template.name, "failed to claim generation slot: {e}");
                continue;
            }
        }

        match composer.compose(template.id).await {
            Ok(newsletter) => {
                info!(template = %template.name, title = %newsletter.title, "scheduled newsletter generated");
                generated += 1;
            }
            Err(e) => {
                error!(template = %template.name, "scheduled composition failed: {e}");
            }
        }
    }
    Ok(generated)
}

/// Spawns the background scheduler loop.
pub fn spawn_scheduler(
    templates: Arc<dyn TemplateStore>,
    newsletters: Arc<dyn NewsletterStore>,
    composer: Arc<Composer>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so startup does not
        // race the rest of initialization.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match run_scheduled_generation(&templates, &newsletters, &composer, Utc::now()).await {
                Ok(0) => debug!("scheduler tick: nothing to generate"),
                Ok(n) => info!("scheduler tick: generated {n} newsletter(s)"),
                Err(e) => error!("scheduler tick failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_key_is_iso_week_shaped() {
        let date = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap();
        let key = period_key(date);
        assert!(key.starts_with("2026-W"));
        assert_eq!(key.len(), "2026-W35".len());
    }

    #[test]
    fn period_key_stable_within_a_week() {
        let monday = Utc.with_ymd_and_hms(2026, 8, 24, 0, 0, 0).unwrap();
        let sunday = Utc.with_ymd_and_hms(2026, 8, 30, 23, 59, 0).unwrap();
        assert_eq!(period_key(monday), period_key(sunday));

        let next_monday = Utc.with_ymd_and_hms(2026, 8, 31, 0, 0, 0).unwrap();
        assert_ne!(period_key(monday), period_key(next_monday));
    }
}
