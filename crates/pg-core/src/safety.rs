//! # Image Safety Gate
//!
//! Pre-flight check that runs before any routing decision. The external
//! classifier owns content judgment; this gate owns the block decision,
//! its audit trail, and the outage policy.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::models::{
    Confidence, FlagStatus, FlagType, ImageSafetyFlag, SafetyReport, Verdict,
};
use crate::traits::{SafetyClassifier, Store};

pub struct SafetyGate {
    store: Arc<dyn Store>,
    classifier: Arc<dyn SafetyClassifier>,
    /// Outage policy: true lets uploads through when the classifier is down
    /// (the product does not auto-ban), false blocks with `unknown`.
    fail_open: bool,
}

impl SafetyGate {
    pub fn new(store: Arc<dyn Store>, classifier: Arc<dyn SafetyClassifier>, fail_open: bool) -> Self {
        SafetyGate {
            store,
            classifier,
            fail_open,
        }
    }

    /// Evaluates the turn's images. Only the first image is sent to the
    /// classifier; the rest inherit its verdict. Every `Block` persists an
    /// `image_safety_flags` row with `status = pending` before returning.
    pub async fn evaluate(&self, user_id: Option<Uuid>, image_refs: &[String]) -> Result<Verdict> {
        let Some(first) = image_refs.first() else {
            return Ok(Verdict::Safe { product_summary: None });
        };

        let report = match self.classifier.classify(first).await {
            Ok(report) => report,
            Err(GatewayError::ExternalUnavailable(e)) | Err(GatewayError::Timeout(e)) => {
                if self.fail_open {
                    log::warn!("safety classifier unavailable, failing open: {e}");
                    return Ok(Verdict::Safe { product_summary: None });
                }
                log::warn!("safety classifier unavailable, failing closed: {e}");
                let verdict = Verdict::Block {
                    flag_type: FlagType::Unknown,
                    confidence: Confidence::Low,
                    message: "Görsel doğrulanamadı".to_string(),
                };
                self.persist_block(user_id, first, &verdict).await?;
                return Ok(verdict);
            }
            Err(other) => return Err(other),
        };

        if report.safe && report.allow_listing {
            return Ok(Verdict::Safe {
                product_summary: report.product,
            });
        }

        let verdict = block_from_report(&report);
        self.persist_block(user_id, first, &verdict).await?;
        Ok(verdict)
    }

    async fn persist_block(
        &self,
        user_id: Option<Uuid>,
        image_ref: &str,
        verdict: &Verdict,
    ) -> Result<()> {
        let Verdict::Block {
            flag_type,
            confidence,
            message,
        } = verdict
        else {
            return Ok(());
        };
        self.store
            .insert_safety_flag(&ImageSafetyFlag {
                id: Uuid::now_v7(),
                user_id,
                image_ref: Some(image_ref.to_string()),
                flag_type: *flag_type,
                confidence: *confidence,
                message: message.clone(),
                status: FlagStatus::Pending,
                created_at: Utc::now(),
                reviewed_at: None,
                reviewer: None,
                notes: None,
            })
            .await
    }
}

fn block_from_report(report: &SafetyReport) -> Verdict {
    Verdict::Block {
        flag_type: FlagType::parse(&report.flag_type),
        confidence: Confidence::parse(&report.confidence),
        message: if report.message.is_empty() {
            "Bu görsel ilana uygun değil".to_string()
        } else {
            report.message.clone()
        },
    }
}
