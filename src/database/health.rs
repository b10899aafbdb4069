// ==================== HEALTH PROBER ====================

use super::{StoreContext, StoreKind};
use std::time::Duration;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Clone)]
pub struct HealthProber {
    ctx: StoreContext,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(ctx: StoreContext, timeout: Duration) -> Self {
        Self { ctx, timeout }
    }

    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    /// One ping against the store, bounded by the probe timeout. Never errors.
    pub async fn check_health(&self, kind: StoreKind) -> bool {
        let store = self.ctx.store(kind);

        match tokio::time::timeout(self.timeout, store.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                log::error!("❌ ProbeFailure on {}: {}", kind, e);
                false
            }
            Err(_) => {
                log::error!(
                    "❌ ProbeFailure on {}: no answer within {}ms",
                    kind,
                    self.timeout.as_millis()
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStore;

    fn prober(mongo: &std::sync::Arc<FakeStore>, postgres: &std::sync::Arc<FakeStore>) -> HealthProber {
        let ctx = StoreContext::new(StoreKind::Mongo, mongo.clone(), postgres.clone()).unwrap();
        HealthProber::new(ctx, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_healthy_store_reports_true() {
        let mongo = FakeStore::shared(StoreKind::Mongo);
        let postgres = FakeStore::shared(StoreKind::Postgres);
        let prober = prober(&mongo, &postgres);

        assert!(prober.check_health(StoreKind::Mongo).await);
        assert_eq!(mongo.ping_count(), 1);
        assert_eq!(postgres.ping_count(), 0);
    }

    #[tokio::test]
    async fn test_ping_error_reports_false() {
        let mongo = FakeStore::shared(StoreKind::Mongo);
        let postgres = FakeStore::shared(StoreKind::Postgres);
        postgres.set_ping_healthy(false);

        assert!(!prober(&mongo, &postgres).check_health(StoreKind::Postgres).await);
    }

    #[tokio::test]
    async fn test_slow_ping_times_out() {
        let mongo = FakeStore::shared(StoreKind::Mongo);
        let postgres = FakeStore::shared(StoreKind::Postgres);
        mongo.set_ping_delay(Duration::from_millis(500));

        assert!(!prober(&mongo, &postgres).check_health(StoreKind::Mongo).await);
    }
}
