//! Simulated flash sale over any [`AtomicStore`].

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use flash_sale_core::{
    AtomicStore, DecrementOutcome, EventId, EventInfo, EventInfoCache, IdempotencyGuard,
    StockService, UserId,
};
use futures::future::join_all;
use rand::Rng;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::time::Duration;

/// Knobs of one simulated sale.
#[derive(Debug, Clone)]
pub struct SaleSettings {
    /// Event under sale
    pub event_id: EventId,
    /// Units offered
    pub stock: i64,
    /// Concurrent buyers
    pub buyers: u64,
    /// Largest quantity one buyer asks for
    pub max_quantity: i64,
    /// Length of the sale window
    pub window: Duration,
}

impl SaleSettings {
    /// Load settings from `FLASH_SALE_DEMO_*` variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            event_id: EventId::new(
                env::var("FLASH_SALE_DEMO_EVENT_ID")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
            ),
            stock: env::var("FLASH_SALE_DEMO_STOCK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            buyers: env::var("FLASH_SALE_DEMO_BUYERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),
            max_quantity: env::var("FLASH_SALE_DEMO_MAX_QUANTITY")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(2)
                .max(1),
            window: Duration::from_secs(
                env::var("FLASH_SALE_DEMO_WINDOW_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(3600),
            ),
        }
    }
}

/// What happened during the sale.
#[derive(Debug, Default)]
pub struct SaleReport {
    /// Outcome counts by reason code
    pub outcomes: BTreeMap<&'static str, u64>,
    /// Units handed out to buyers
    pub units_reserved: i64,
    /// Counter after the main rush
    pub remaining_after_rush: i64,
    /// Reply to a buyer trying a second time
    pub repeat_attempt: Option<DecrementOutcome>,
    /// Counter after one cancellation was restored
    pub remaining_after_restore: Option<i64>,
    /// Order messages handled, counting redeliveries once
    pub messages_processed: u64,
    /// Redelivered messages skipped
    pub messages_skipped: u64,
}

impl fmt::Display for SaleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Outcomes:")?;
        for (reason, count) in &self.outcomes {
            writeln!(f, "  {reason:<20} {count}")?;
        }
        writeln!(f, "Units reserved:          {}", self.units_reserved)?;
        writeln!(f, "Remaining after rush:    {}", self.remaining_after_rush)?;
        if let Some(outcome) = self.repeat_attempt {
            writeln!(f, "Repeat attempt:          {}", outcome.reason())?;
        }
        if let Some(remaining) = self.remaining_after_restore {
            writeln!(f, "Remaining after restore: {remaining}")?;
        }
        write!(
            f,
            "Messages processed:      {} ({} redeliveries skipped)",
            self.messages_processed, self.messages_skipped
        )
    }
}

/// Run a complete sale: publish event info, warm up stock, let buyers race,
/// cancel one order, and drain the resulting order messages.
///
/// # Errors
///
/// Returns error on any store failure.
pub async fn run_sale<S>(service: &StockService<S>, settings: &SaleSettings) -> anyhow::Result<SaleReport>
where
    S: AtomicStore + Clone + 'static,
{
    let event = settings.event_id;
    let config = service.config();

    let cache = EventInfoCache::new(service.store().clone(), config.operation_timeout);
    let starts_at = Utc::now();
    let info = EventInfo {
        event_id: event,
        title: format!("Flash sale #{event}"),
        price_cents: 9_900,
        total_stock: settings.stock,
        starts_at,
        ends_at: starts_at
            + ChronoDuration::from_std(settings.window).context("sale window out of range")?,
    };
    cache.cache_event_info(&info, config.event_info_ttl).await?;
    let cached = cache
        .get_event_info(event)
        .await?
        .context("event info missing right after caching")?;
    tracing::info!(event_id = %event, title = %cached.title, active = cached.is_active(Utc::now()), "Event published");

    service.warmup_stock(event, settings.stock, settings.window).await?;

    let quantities: Vec<i64> = {
        let mut rng = rand::thread_rng();
        (0..settings.buyers)
            .map(|_| rng.gen_range(1..=settings.max_quantity))
            .collect()
    };

    let attempts = (0..settings.buyers).zip(quantities).map(|(user, quantity)| {
        let service = service.clone();
        tokio::spawn(async move {
            let outcome = service.decrement_stock_default(event, UserId::new(user), quantity).await;
            (UserId::new(user), quantity, outcome)
        })
    });

    let mut report = SaleReport::default();
    let mut orders = Vec::new();
    for joined in join_all(attempts).await {
        let (user, quantity, outcome) = joined.context("buyer task panicked")?;
        let outcome = outcome?;
        *report.outcomes.entry(outcome.reason()).or_insert(0) += 1;
        if outcome.is_success() {
            report.units_reserved += quantity;
            orders.push((user, quantity));
        }
    }
    report.remaining_after_rush = service.get_stock(event).await?.unwrap_or_default();

    if let Some(&(user, quantity)) = orders.first() {
        report.repeat_attempt = Some(service.decrement_stock_default(event, user, 1).await?);

        // The first order fails payment and is compensated.
        report.remaining_after_restore = Some(service.restore_stock(event, user, quantity).await?);
    }

    let guard = IdempotencyGuard::new(service.store().clone(), config);
    // At-least-once delivery: every order message arrives twice.
    for (user, quantity) in orders.iter().chain(orders.iter()) {
        let message_id = format!("order-created:{event}:{user}");
        if guard.check_and_set(&message_id).await? {
            report.messages_skipped += 1;
            continue;
        }
        guard.cache_result(&message_id, quantity, config.idempotency_ttl).await?;
        report.messages_processed += 1;
    }

    let stock = service.batch_check_stock(&[event, neighbour_event(event)]).await?;
    tracing::info!(?stock, "Final stock snapshot");

    Ok(report)
}

/// An event id next to `event`, used to show an absent counter in the snapshot.
fn neighbour_event(event: EventId) -> EventId {
    EventId::new(event.get().checked_add(1).unwrap_or(event.get() - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbour_event_differs_at_the_top_of_the_range() {
        assert_eq!(neighbour_event(EventId::new(7)), EventId::new(8));
        assert_eq!(neighbour_event(EventId::new(u64::MAX)), EventId::new(u64::MAX - 1));
    }
}
