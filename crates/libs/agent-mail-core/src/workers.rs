//! Background worker supervisor.
//!
//! Two dedicated `tokio::task`s run alongside request handling: the
//! ACK-TTL escalation scanner (`ack_escalation`) and the reservation-expiry
//! sweep (`reservation_expiry`). Both poll on their own interval and stop
//! cleanly when the shared `tokio::sync::watch` shutdown signal fires,
//! mirroring the shutdown idiom already used for the HTTP/SSE listener
//! (`agent-mail-mcp::run_sse`'s `shutdown_signal`) rather than pulling in a
//! cancellation-token crate for one flag.

use crate::model::message::MessageBmc;
use crate::model::reservation::ReservationBmc;
use crate::model::ModelManager;
use crate::Ctx;
use tokio::sync::watch;

/// Handle to a running worker set. Dropping it does not stop the workers;
/// call [`WorkerHandle::shutdown`] (or send on the paired sender) to do
/// that, then `.join().await` to wait for clean exit.
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    ack_task: tokio::task::JoinHandle<()>,
    reservation_task: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    /// Signals both workers to stop at their next poll boundary.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for both workers to exit after [`Self::shutdown`].
    pub async fn join(self) {
        let _ = self.ack_task.await;
        let _ = self.reservation_task.await;
    }
}

/// Spawns the ACK-TTL escalation scanner and the reservation-expiry sweep,
/// each reading its own cadence/enable switch from `mm.app_config`. A
/// worker whose config disables it still spawns, but exits immediately
/// after its first no-op tick check so `WorkerHandle` stays uniform.
pub fn spawn(mm: ModelManager) -> WorkerHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ack_task = tokio::spawn(ack_escalation_loop(mm.clone(), shutdown_rx.clone()));
    let reservation_task = tokio::spawn(reservation_expiry_loop(mm, shutdown_rx));

    WorkerHandle {
        shutdown_tx,
        ack_task,
        reservation_task,
    }
}

/// Polls [`MessageBmc::list_overdue_acks`] every
/// `ack.scan_interval_seconds` and, for each overdue recipient, either logs
/// (`escalation_mode = "log"`) or places an exclusive reservation over the
/// configured holder name (`escalation_mode = "claim"`) as a blunt signal
/// that the overdue thread needs attention before further edits land.
async fn ack_escalation_loop(mm: ModelManager, mut shutdown_rx: watch::Receiver<bool>) {
    if !mm.app_config.ack.ttl_enabled {
        tracing::debug!("ack escalation worker disabled, exiting");
        return;
    }

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(
        mm.app_config.ack.scan_interval_seconds.max(1),
    ));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_ack_escalation_tick(&mm).await {
                    tracing::warn!(error = %e, "ack escalation tick failed");
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("ack escalation worker shutting down");
                    return;
                }
            }
        }
    }
}

async fn run_ack_escalation_tick(mm: &ModelManager) -> crate::Result<()> {
    let overdue = MessageBmc::list_overdue_acks(mm, mm.app_config.ack.ttl_seconds).await?;
    if overdue.is_empty() {
        return Ok(());
    }

    for item in &overdue {
        tracing::warn!(
            project = %item.project_slug,
            message_id = %item.external_id,
            recipient = %item.recipient_name,
            subject = %item.subject,
            "ack overdue"
        );

        if mm.app_config.ack.escalation_mode == "claim" {
            let ctx = Ctx::root_ctx();
            let holder = crate::model::agent::AgentBmc::get_by_name(
                &ctx,
                mm,
                item.project_id,
                &mm.app_config.ack.escalation_claim_holder_name,
            )
            .await;
            if let Ok(holder) = holder {
                let pattern = format!("**/*{}*", item.external_id);
                let _ = ReservationBmc::reserve(
                    &ctx,
                    mm,
                    item.project_id,
                    holder.id,
                    &[pattern],
                    mm.app_config.ack.escalation_claim_ttl_seconds,
                    mm.app_config.ack.escalation_claim_exclusive,
                    Some(format!("ack overdue escalation for {}", item.external_id)),
                    false,
                )
                .await;
            }
        }
    }
    Ok(())
}

/// Polls every 30s and expires stale reservation leases project by
/// project, so the `reservations` table (and the `claims/*.json` artifacts
/// the Guard Hook reads) never drift far behind wall-clock expiry.
async fn reservation_expiry_loop(mm: ModelManager, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_reservation_expiry_tick(&mm).await {
                    tracing::warn!(error = %e, "reservation expiry tick failed");
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("reservation expiry worker shutting down");
                    return;
                }
            }
        }
    }
}

async fn run_reservation_expiry_tick(mm: &ModelManager) -> crate::Result<()> {
    let ctx = Ctx::root_ctx();
    let projects = crate::model::project::ProjectBmc::list_all(&ctx, mm).await?;
    for project in projects {
        // `list_active_for_project` expires stale leases as its first step;
        // the sweep exists so that expiry happens even for quiet projects
        // nobody is actively calling into.
        ReservationBmc::list_active_for_project(&ctx, mm, project.id).await?;
    }
    Ok(())
}

/// Snapshot of the two workers' most recent activity, exposed via
/// `resource://tooling/metrics`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkerStatus {
    pub ack_escalation_enabled: bool,
    pub ack_escalation_interval_seconds: u64,
    pub reservation_expiry_interval_seconds: u64,
}

impl WorkerStatus {
    pub fn from_config(app_config: &agent_mail_common::config::AppConfig) -> Self {
        Self {
            ack_escalation_enabled: app_config.ack.ttl_enabled,
            ack_escalation_interval_seconds: app_config.ack.scan_interval_seconds,
            reservation_expiry_interval_seconds: 30,
        }
    }
}
