use anyhow::bail;
use common::models::{PositionInsert, Signal};
use coordination::{LockError, keys};
use storage::repositories::{
    AgentsRepository, DeploymentsRepository, PositionsRepository, SignalsRepository,
};
use tracing::{debug, info, warn};

use crate::retry::{ErrorClass, classify_error, retry_window_exceeded};
use crate::services::{JobContext, JobOutcome, short};

/// Turns one (signal, deployment) pair into exactly one Position.
///
/// Safe to re-run after a crash at any point: an existing Position
/// short-circuits, and the Position write is an idempotent upsert keyed by
/// (deployment_id, signal_id). Lock nesting is strictly wallet before
/// signal; guards release in reverse order on every exit path.
///
/// Returns `Err` only for retryable failures — the queue's redelivery is
/// the only retry driver.
pub async fn execute_signal(
    ctx: &JobContext,
    signal_id: &str,
    deployment_id: &str,
) -> anyhow::Result<JobOutcome> {
    // Idempotency short-circuit: crash between venue call and persistence
    // leaves a redelivered job that must be a no-op.
    if PositionsRepository::find_by_deployment_and_signal(&ctx.pool, deployment_id, signal_id)
        .await?
        .is_some()
    {
        info!(
            "Position already exists for signal {} / deployment {}",
            short(signal_id),
            short(deployment_id)
        );
        return Ok(JobOutcome::AlreadyDone);
    }

    // Resolve context. "Not found" is not transient.
    let Some(signal) = SignalsRepository::find_by_id(&ctx.pool, signal_id).await? else {
        warn!("Signal {} not found, nothing to execute", short(signal_id));
        return Ok(JobOutcome::FailedTerminal(
            "Signal or deployment not found".to_string(),
        ));
    };
    let Some(deployment) = DeploymentsRepository::find_by_id(&ctx.pool, deployment_id).await?
    else {
        let reason = "Signal or deployment not found".to_string();
        SignalsRepository::mark_failed(&ctx.pool, signal_id, &reason).await?;
        warn!("Deployment {} not found for signal {}", short(deployment_id), short(signal_id));
        return Ok(JobOutcome::FailedTerminal(reason));
    };
    let Some(_agent) = AgentsRepository::find_by_id(&ctx.pool, &signal.agent_id).await? else {
        let reason = format!("Agent {} not found", short(&signal.agent_id));
        SignalsRepository::mark_failed(&ctx.pool, signal_id, &reason).await?;
        return Ok(JobOutcome::FailedTerminal(reason));
    };

    if !deployment.is_active() {
        let reason = format!("Deployment is {}", deployment.status);
        SignalsRepository::mark_failed(&ctx.pool, signal_id, &reason).await?;
        return Ok(JobOutcome::FailedTerminal(reason));
    }

    // Wallet lock first: all trades for one wallet run strictly
    // sequentially. Queue behind other trades rather than fail.
    let wallet_key = keys::wallet_trade(&deployment.wallet_address);
    let _wallet_guard = match ctx
        .locks
        .acquire_with_wait(
            &wallet_key,
            ctx.config.wallet_lock_ttl,
            ctx.config.wallet_lock_wait,
        )
        .await
    {
        Ok(guard) => guard,
        Err(LockError::WaitTimeout(_)) => {
            let reason = format!(
                "Timed out waiting for wallet lock on {}",
                short(&deployment.wallet_address)
            );
            SignalsRepository::mark_failed(&ctx.pool, signal_id, &reason).await?;
            warn!("{} (signal {})", reason, short(signal_id));
            return Ok(JobOutcome::FailedTerminal(reason));
        }
        Err(e) => return Err(e.into()),
    };
    debug!(
        "Wallet lock held for {} (signal {})",
        short(&deployment.wallet_address),
        short(signal_id)
    );

    // Signal lock nested inside: contention means another worker is already
    // doing this exact work, which is success, not failure.
    let signal_key = keys::signal_deployment(signal_id, deployment_id);
    let Some(_signal_guard) = ctx
        .locks
        .try_acquire(&signal_key, ctx.config.signal_lock_ttl)
        .await?
    else {
        info!(
            "Signal {} / deployment {} is being executed by another worker, skipping",
            short(signal_id),
            short(deployment_id)
        );
        return Ok(JobOutcome::SkippedContention);
    };

    debug!(
        "Executing signal {}: {} {} ({}% @ {}x) on {}",
        short(signal_id),
        signal.side,
        signal.token,
        signal.allocation_pct,
        signal.leverage,
        signal.venue
    );

    let result = match ctx.venue.execute_trade(&signal, &deployment).await {
        Ok(result) => result,
        Err(e) => return reconcile_failure(ctx, &signal, &e.to_string()).await,
    };

    if !result.success {
        let message = result
            .error
            .unwrap_or_else(|| "Venue rejected the trade".to_string());
        return reconcile_failure(ctx, &signal, &message).await;
    }

    let insert = PositionInsert {
        deployment_id: deployment.id.clone(),
        signal_id: signal.id.clone(),
        token: signal.token.clone(),
        side: signal.side.clone(),
        entry_price: result.entry_price.unwrap_or_default(),
        collateral: result.collateral.unwrap_or_default(),
        tx_hash: result.tx_hash,
        trade_id: result.trade_id,
    };
    match PositionsRepository::upsert(&ctx.pool, &insert).await {
        Ok(()) => {}
        // The upsert collapses races, but if the store still surfaces a
        // uniqueness conflict on the create path, another worker won the
        // row — that is success, not failure.
        Err(e) if is_unique_violation(&e) => {
            info!(
                "Position for {}/{} created by another worker",
                short(deployment_id),
                short(signal_id)
            );
        }
        Err(e) => return Err(e.into()),
    }
    SignalsRepository::clear_retry_marker(&ctx.pool, signal_id).await?;

    info!(
        "Position opened for signal {}: entry={} collateral={}",
        short(signal_id),
        insert.entry_price,
        insert.collateral
    );
    Ok(JobOutcome::Done)
}

/// Classifies a venue failure and reconciles the signal row. Retryable
/// errors are annotated and re-raised; fatal ones (and retryable errors on
/// signals past the retry window) become the terminal failure reason.
async fn reconcile_failure(
    ctx: &JobContext,
    signal: &Signal,
    message: &str,
) -> anyhow::Result<JobOutcome> {
    match classify_error(message) {
        ErrorClass::Retryable => {
            if retry_window_exceeded(signal.created_at, ctx.config.retry_window) {
                let reason = format!("Retry window exceeded: {}", message);
                SignalsRepository::mark_failed(&ctx.pool, &signal.id, &reason).await?;
                warn!(
                    "Signal {} is past the retry window, forcing terminal: {}",
                    short(&signal.id),
                    message
                );
                return Ok(JobOutcome::FailedTerminal(reason));
            }
            SignalsRepository::mark_retrying(&ctx.pool, &signal.id, message).await?;
            warn!(
                "Retryable failure for signal {} (retry #{}): {}",
                short(&signal.id),
                signal.retry_count + 1,
                message
            );
            bail!("Retryable execution failure: {}", message);
        }
        ErrorClass::Fatal => {
            SignalsRepository::mark_failed(&ctx.pool, &signal.id, message).await?;
            warn!(
                "Signal {} failed terminally: {}",
                short(&signal.id),
                message
            );
            Ok(JobOutcome::FailedTerminal(message.to_string()))
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
        }
        _ => false,
    }
}
