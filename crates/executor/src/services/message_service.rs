use anyhow::bail;
use coordination::keys;
use storage::repositories::MessagesRepository;
use tracing::{info, warn};

use crate::retry::{ErrorClass, classify_error};
use crate::services::{JobContext, JobOutcome, short};

/// Classifies one inbound alpha message, exactly once.
///
/// Same shape as signal execution but with a single message-level lock:
/// messages have no shared mutable resource analogous to a wallet nonce, so
/// there is no coarser lock to take. Lock granularity matches the actual
/// contention resource.
pub async fn classify_message(ctx: &JobContext, message_id: &str) -> anyhow::Result<JobOutcome> {
    let Some(message) = MessagesRepository::find_by_id(&ctx.pool, message_id).await? else {
        warn!(
            "Message {} not found, nothing to classify",
            short(message_id)
        );
        return Ok(JobOutcome::FailedTerminal("Message not found".to_string()));
    };

    if message.classified_at.is_some() {
        info!("Message {} already classified, skipping", short(message_id));
        return Ok(JobOutcome::AlreadyDone);
    }

    let key = keys::message_classify(message_id);
    let Some(_guard) = ctx
        .locks
        .try_acquire(&key, ctx.config.message_lock_ttl)
        .await?
    else {
        info!(
            "Message {} is being classified by another worker, skipping",
            short(message_id)
        );
        return Ok(JobOutcome::SkippedContention);
    };

    match ctx.classifier.classify(&message.content).await {
        Ok(classification) => {
            let stored =
                MessagesRepository::store_classification(&ctx.pool, message_id, &classification)
                    .await?;
            if stored {
                info!(
                    "Message {} classified: candidate={} confidence={:.2}",
                    short(message_id),
                    classification.is_signal_candidate,
                    classification.confidence
                );
                Ok(JobOutcome::Done)
            } else {
                info!(
                    "Message {} was classified by another worker",
                    short(message_id)
                );
                Ok(JobOutcome::AlreadyDone)
            }
        }
        Err(e) => {
            let message_text = e.to_string();
            match classify_error(&message_text) {
                ErrorClass::Retryable => {
                    warn!(
                        "Retryable classification failure for message {}: {}",
                        short(message_id),
                        message_text
                    );
                    bail!("Retryable classification failure: {}", message_text);
                }
                ErrorClass::Fatal => {
                    MessagesRepository::mark_failed_classification(
                        &ctx.pool,
                        message_id,
                        &message_text,
                    )
                    .await?;
                    warn!(
                        "Message {} classification failed terminally: {}",
                        short(message_id),
                        message_text
                    );
                    Ok(JobOutcome::FailedTerminal(message_text))
                }
            }
        }
    }
}
