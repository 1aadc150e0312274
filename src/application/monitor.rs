use crate::domain::order::{Order, OrderStatus};
use crate::domain::ports::{ProvisionStatus, ProvisioningRef, SinkRef, StoreRef};
use crate::domain::user::ExternalId;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// Watches one active order until a code arrives, the provider cancels,
/// or the bounded timeout elapses.
///
/// Each order gets its own task; a monitor never blocks the orchestrator
/// or other users. Aborting the task (process shutdown) leaves the order
/// `Active` in the store, so a restarted process could resume it.
pub struct PollingMonitor {
    store: StoreRef,
    provisioning: ProvisioningRef,
    sink: SinkRef,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl PollingMonitor {
    pub fn new(store: StoreRef, provisioning: ProvisioningRef, sink: SinkRef) -> Self {
        Self {
            store,
            provisioning,
            sink,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, poll_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.poll_timeout = poll_timeout;
        self
    }

    /// Spawns `run` as an independent task.
    pub fn spawn_for(self: Arc<Self>, order: Order, notify: ExternalId) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self.run(order, notify).await {
                error!(%err, "order monitor failed");
            }
        })
    }

    /// Polls the provider until the order is finalized.
    ///
    /// No refund is issued on timeout: the number itself was delivered,
    /// so the charge stands and the order is closed with the provider to
    /// stop consuming quota.
    pub async fn run(&self, order: Order, notify: ExternalId) -> Result<()> {
        let deadline = Instant::now() + self.poll_timeout;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval's first tick fires immediately; skip it so the first
        // poll happens one interval after provisioning.
        ticker.tick().await;

        while Instant::now() < deadline {
            ticker.tick().await;
            match self.provisioning.get_status(order.provider_order_id).await {
                Ok(ProvisionStatus::CodeReceived(code)) => {
                    if let Err(err) = self
                        .provisioning
                        .acknowledge_completion(order.provider_order_id)
                        .await
                    {
                        warn!(order = %order.id, %err, "completion ack failed");
                    }
                    self.store
                        .set_order_status(order.id, OrderStatus::Completed)
                        .await?;
                    info!(order = %order.id, "code received, order completed");
                    self.sink
                        .send(notify, &format!("Code received: {code}"))
                        .await;
                    return Ok(());
                }
                Ok(ProvisionStatus::Cancelled) => {
                    self.store
                        .set_order_status(order.id, OrderStatus::Cancelled)
                        .await?;
                    info!(order = %order.id, "order cancelled by provider");
                    self.sink
                        .send(notify, "The order was cancelled by the provider.")
                        .await;
                    return Ok(());
                }
                // WaitRetry keeps polling the same order; no new charge.
                Ok(ProvisionStatus::Pending) | Ok(ProvisionStatus::WaitRetry) => {}
                Err(err) => {
                    // Transient; retried on the next tick.
                    warn!(order = %order.id, %err, "status poll failed");
                }
            }
        }

        // Timeout: close the order with the provider so it stops
        // consuming provider-side quota. The charge stands.
        if let Err(err) = self.provisioning.cancel(order.provider_order_id).await {
            warn!(order = %order.id, %err, "closing expired order with provider failed");
        }
        self.store
            .set_order_status(order.id, OrderStatus::Expired)
            .await?;
        info!(order = %order.id, "order expired without a code");
        self.sink
            .send(notify, "The wait for a code has ended without a message.")
            .await;
        Ok(())
    }
}
