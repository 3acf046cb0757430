//! CRM Delivery Use Case
//!
//! Leads are written to an outbox together with their result. Each one gets
//! an immediate delivery attempt right after the submission commits; the
//! drain worker retries whatever is still pending with linear backoff.

use chrono::{TimeDelta, Utc};
use std::sync::Arc;

use crate::application::config::QuizConfig;
use crate::domain::entities::CrmDelivery;
use crate::domain::ports::CrmSink;
use crate::domain::repository::CrmOutboxRepository;
use crate::error::QuizResult;

/// Counts for one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Deliver Leads Use Case
pub struct DeliverLeadsUseCase<R, C>
where
    R: CrmOutboxRepository,
    C: CrmSink,
{
    outbox: Arc<R>,
    crm: Arc<C>,
    config: Arc<QuizConfig>,
}

impl<R, C> DeliverLeadsUseCase<R, C>
where
    R: CrmOutboxRepository,
    C: CrmSink,
{
    pub fn new(outbox: Arc<R>, crm: Arc<C>, config: Arc<QuizConfig>) -> Self {
        Self {
            outbox,
            crm,
            config,
        }
    }

    /// Claim one batch of due leads and try each of them
    pub async fn drain_once(&self) -> QuizResult<DrainReport> {
        let lease = self.config.crm_backoff(1);
        let batch = self
            .outbox
            .claim_due_deliveries(
                self.config.crm_outbox_batch,
                lease,
                self.config.crm_max_attempts,
            )
            .await?;

        let mut report = DrainReport::default();
        for delivery in &batch {
            if self.attempt(delivery).await? {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        if !batch.is_empty() {
            tracing::info!(
                delivered = report.delivered,
                failed = report.failed,
                "CRM outbox drained"
            );
        }
        Ok(report)
    }

    /// One delivery attempt; true when the CRM accepted the lead
    ///
    /// Only storage errors are returned. CRM failures are recorded on the row.
    pub async fn attempt(&self, delivery: &CrmDelivery) -> QuizResult<bool> {
        match self.crm.send_lead(&delivery.lead).await {
            Ok(()) => {
                self.outbox.mark_delivered(delivery.id).await?;
                tracing::info!(delivery_id = delivery.id, "Lead delivered to CRM");
                Ok(true)
            }
            Err(e) => {
                let failed_attempts = u32::try_from(delivery.attempts.max(0))
                    .unwrap_or(u32::MAX)
                    .saturating_add(1);
                let backoff = TimeDelta::from_std(self.config.crm_backoff(failed_attempts))
                    .unwrap_or(TimeDelta::MAX);
                let retry_at = Utc::now()
                    .checked_add_signed(backoff)
                    .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);

                self.outbox
                    .mark_delivery_failed(delivery.id, &e.to_string(), retry_at)
                    .await?;

                if failed_attempts >= self.config.crm_max_attempts {
                    tracing::error!(
                        delivery_id = delivery.id,
                        attempts = failed_attempts,
                        error = %e,
                        "Lead delivery abandoned"
                    );
                } else {
                    tracing::warn!(
                        delivery_id = delivery.id,
                        attempts = failed_attempts,
                        error = %e,
                        retry_at = %retry_at,
                        "Lead delivery failed"
                    );
                }
                Ok(false)
            }
        }
    }
}
