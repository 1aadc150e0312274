use crate::application::catalog::CatalogCache;
use crate::application::engine::TransactionEngine;
use crate::domain::money::MinorAmount;
use crate::domain::order::{CountryCode, NewOrder, Order, OrderId, OrderKind, OrderStatus};
use crate::domain::ports::{ProvisioningRef, SinkRef};
use crate::domain::transaction::TxKind;
use crate::domain::user::{ExternalId, UserId};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Terminal outcome of one saga attempt.
///
/// Everything except `Fulfilled`/`Extended` leaves the user's net balance
/// unchanged and creates no order.
#[derive(Debug, Clone, PartialEq)]
pub enum SagaOutcome {
    Fulfilled(Order),
    Extended {
        order: OrderId,
        until: DateTime<Utc>,
    },
    Closed {
        order: OrderId,
    },
    QuoteUnavailable,
    InsufficientFunds,
    ProviderFailed {
        reason: String,
    },
    /// Request rejected before any money moved: bad rental duration, or
    /// a target order that is missing, foreign, or not an active rental.
    InvalidOrder {
        reason: String,
    },
}

/// Longest rental or extension accepted in one request.
const MAX_RENTAL_DAYS: u32 = 365;

/// Drives the reserve → provision → commit-or-compensate saga for
/// purchases, rentals and rental extensions.
///
/// Monetary effects go exclusively through the [`TransactionEngine`];
/// the orchestrator owns order lifecycle. Each invocation is a fresh
/// attempt; failed provisioning is never retried automatically.
pub struct PurchaseOrchestrator {
    engine: Arc<TransactionEngine>,
    catalog: Arc<CatalogCache>,
    provisioning: ProvisioningRef,
    sink: SinkRef,
}

impl PurchaseOrchestrator {
    pub fn new(
        engine: Arc<TransactionEngine>,
        catalog: Arc<CatalogCache>,
        provisioning: ProvisioningRef,
        sink: SinkRef,
    ) -> Self {
        Self {
            engine,
            catalog,
            provisioning,
            sink,
        }
    }

    /// Instant purchase of one activation number.
    pub async fn purchase(
        &self,
        buyer: ExternalId,
        service: &str,
        country: CountryCode,
    ) -> Result<SagaOutcome> {
        self.acquire(buyer, service, country, OrderKind::Purchase, None)
            .await
    }

    /// Time-boxed rental of a number for `days` days.
    pub async fn rent(
        &self,
        buyer: ExternalId,
        service: &str,
        country: CountryCode,
        days: u32,
    ) -> Result<SagaOutcome> {
        if let Some(rejected) = validate_days(days) {
            return Ok(rejected);
        }
        self.acquire(buyer, service, country, OrderKind::Rental, Some(days))
            .await
    }

    async fn acquire(
        &self,
        buyer: ExternalId,
        service: &str,
        country: CountryCode,
        kind: OrderKind,
        days: Option<u32>,
    ) -> Result<SagaOutcome> {
        let Some(user) = self.resolve(buyer).await? else {
            // An unknown user has an empty balance by definition.
            self.notify_insufficient(buyer).await;
            return Ok(SagaOutcome::InsufficientFunds);
        };

        // QUOTING: no side effects yet.
        let Some(price) = self.catalog.quote(service, country).await else {
            return Ok(SagaOutcome::QuoteUnavailable);
        };

        // RESERVED
        let tx_kind = match kind {
            OrderKind::Purchase => TxKind::Purchase,
            OrderKind::Rental => TxKind::Rental,
        };
        let details = match days {
            Some(d) => format!("{service} rental, country {country}, {d} days"),
            None => format!("{service} purchase, country {country}"),
        };
        if !self
            .engine
            .charge_or_deposit(user, -price, tx_kind, &details)
            .await?
        {
            self.notify_insufficient(buyer).await;
            return Ok(SagaOutcome::InsufficientFunds);
        }

        // PROVISIONING: business and transport failures compensate alike.
        let acquired = match days {
            Some(d) => self.provisioning.rent_number(service, country, d).await,
            None => self.provisioning.acquire_number(service, country).await,
        };
        let acquisition = match acquired {
            Ok(acq) => acq,
            Err(err) => {
                return self
                    .compensate(user, buyer, price, &format!("{details}: {err}"))
                    .await;
            }
        };

        // FULFILLED
        let expires_at = days.map(|d| Utc::now() + Duration::days(i64::from(d)));
        let new_order = NewOrder {
            user,
            provider_order_id: acquisition.provider_order_id,
            service: service.to_string(),
            country,
            phone_number: acquisition.phone_number.clone(),
            kind,
            expires_at,
        };
        let order = match self.engine.store().insert_order(new_order).await {
            Ok(order) => order,
            Err(err) => {
                // Charged and provisioned but nothing recorded: release
                // the number and undo the charge before propagating.
                if let Err(cancel_err) = self.provisioning.cancel(acquisition.provider_order_id).await
                {
                    warn!(%cancel_err, provider_order_id = acquisition.provider_order_id,
                        "could not release number after storage failure");
                }
                let _ = self
                    .compensate(user, buyer, price, "order could not be recorded")
                    .await?;
                return Err(err);
            }
        };

        info!(%user, order = %order.id, phone = %order.phone_number, %price, "order fulfilled");
        let text = match order.expires_at {
            Some(until) => format!(
                "Number rented: {} (until {})",
                order.phone_number,
                until.format("%Y-%m-%d %H:%M")
            ),
            None => format!("Number acquired: {}. Waiting for a code.", order.phone_number),
        };
        self.sink.send(buyer, &text).await;
        Ok(SagaOutcome::Fulfilled(order))
    }

    /// Extends an active rental by `days`, with the same
    /// reserve/provision/compensate saga as a fresh acquisition.
    pub async fn extend_rental(
        &self,
        buyer: ExternalId,
        order_id: OrderId,
        days: u32,
    ) -> Result<SagaOutcome> {
        if let Some(rejected) = validate_days(days) {
            return Ok(rejected);
        }
        let Some(user) = self.resolve(buyer).await? else {
            return Ok(SagaOutcome::InvalidOrder {
                reason: "unknown user".into(),
            });
        };

        let Some(order) = self.engine.store().get_order(order_id).await? else {
            return Ok(SagaOutcome::InvalidOrder {
                reason: format!("order {order_id} not found"),
            });
        };
        if order.user != user || order.kind != OrderKind::Rental || order.status != OrderStatus::Active
        {
            return Ok(SagaOutcome::InvalidOrder {
                reason: format!("order {order_id} is not an active rental of this user"),
            });
        }

        let Some(price) = self.catalog.quote(&order.service, order.country).await else {
            return Ok(SagaOutcome::QuoteUnavailable);
        };

        let details = format!("extend rental {order_id} by {days} days");
        if !self
            .engine
            .charge_or_deposit(user, -price, TxKind::Rental, &details)
            .await?
        {
            self.notify_insufficient(buyer).await;
            return Ok(SagaOutcome::InsufficientFunds);
        }

        if let Err(err) = self
            .provisioning
            .extend_rental(order.provider_order_id, days)
            .await
        {
            return self
                .compensate(user, buyer, price, &format!("{details}: {err}"))
                .await;
        }

        let base = order.expires_at.unwrap_or_else(Utc::now);
        let until = base + Duration::days(i64::from(days));
        self.engine.store().set_order_expiry(order_id, until).await?;

        info!(%user, order = %order_id, %until, "rental extended");
        self.sink
            .send(
                buyer,
                &format!("Rental extended until {}", until.format("%Y-%m-%d %H:%M")),
            )
            .await;
        Ok(SagaOutcome::Extended {
            order: order_id,
            until,
        })
    }

    /// User-initiated close of an active rental.
    ///
    /// The charge stands; the rental was delivered and used for however
    /// long it ran. If the provider refuses the close the order stays
    /// `Active` so the request can be repeated.
    pub async fn close_rental(&self, buyer: ExternalId, order_id: OrderId) -> Result<SagaOutcome> {
        let Some(user) = self.resolve(buyer).await? else {
            return Ok(SagaOutcome::InvalidOrder {
                reason: "unknown user".into(),
            });
        };

        let Some(order) = self.engine.store().get_order(order_id).await? else {
            return Ok(SagaOutcome::InvalidOrder {
                reason: format!("order {order_id} not found"),
            });
        };
        if order.user != user || order.kind != OrderKind::Rental || order.status != OrderStatus::Active
        {
            return Ok(SagaOutcome::InvalidOrder {
                reason: format!("order {order_id} is not an active rental of this user"),
            });
        }

        if let Err(err) = self.provisioning.cancel(order.provider_order_id).await {
            warn!(%user, order = %order_id, %err, "closing rental with provider failed");
            return Ok(SagaOutcome::ProviderFailed {
                reason: err.to_string(),
            });
        }

        self.engine
            .store()
            .set_order_status(order_id, OrderStatus::Cancelled)
            .await?;
        info!(%user, order = %order_id, "rental closed");
        self.sink.send(buyer, "Rental has been closed.").await;
        Ok(SagaOutcome::Closed { order: order_id })
    }

    async fn resolve(&self, buyer: ExternalId) -> Result<Option<UserId>> {
        Ok(self
            .engine
            .store()
            .get_user(buyer)
            .await?
            .map(|user| user.id))
    }

    /// COMPENSATING: undo a reservation whose provisioning step failed.
    ///
    /// The refund can only legitimately fail if the store is down; that
    /// is real financial exposure, logged with full context and surfaced
    /// for manual reconciliation.
    async fn compensate(
        &self,
        user: UserId,
        buyer: ExternalId,
        price: MinorAmount,
        reason: &str,
    ) -> Result<SagaOutcome> {
        let refunded = self
            .engine
            .charge_or_deposit(user, price, TxKind::Refund, &format!("refund: {reason}"))
            .await;
        match refunded {
            Ok(true) => {
                warn!(%user, %price, reason, "provisioning failed, reservation refunded");
                self.sink
                    .send(buyer, "Purchase failed, you have been refunded.")
                    .await;
                Ok(SagaOutcome::ProviderFailed {
                    reason: reason.to_string(),
                })
            }
            Ok(false) => {
                error!(%user, amount = %price, reason, "compensating refund rejected; manual reconciliation required");
                Err(LedgerError::ReconciliationRequired {
                    user,
                    amount: price,
                    reason: reason.to_string(),
                })
            }
            Err(err) => {
                error!(%user, amount = %price, reason, %err, "compensating refund failed; manual reconciliation required");
                Err(LedgerError::ReconciliationRequired {
                    user,
                    amount: price,
                    reason: format!("{reason}; refund error: {err}"),
                })
            }
        }
    }

    async fn notify_insufficient(&self, buyer: ExternalId) {
        self.sink
            .send(buyer, "Insufficient funds. Please top up your balance.")
            .await;
    }
}

// chrono's Duration::days panics far before u32::MAX; bound requests
// well inside that and reject nonsense durations outright.
fn validate_days(days: u32) -> Option<SagaOutcome> {
    if days == 0 || days > MAX_RENTAL_DAYS {
        Some(SagaOutcome::InvalidOrder {
            reason: format!("rental duration must be 1..={MAX_RENTAL_DAYS} days, got {days}"),
        })
    } else {
        None
    }
}
