// ==================== ACTIVE-STORE SELECTOR ====================
// Decides, per operation, which store executes it. Nothing is cached: every
// call probes again.

use super::health::HealthProber;
use super::StoreKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailoverPolicy {
    /// Probe only the primary; fall to the secondary without checking it
    #[default]
    PrimaryOnly,
    /// Probe the secondary before switching; stay on the primary if both are down
    ProbeBoth,
}

impl FailoverPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverPolicy::PrimaryOnly => "primary-only",
            FailoverPolicy::ProbeBoth => "probe-both",
        }
    }
}

impl fmt::Display for FailoverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailoverPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "primary-only" | "optimistic" => Ok(FailoverPolicy::PrimaryOnly),
            "probe-both" => Ok(FailoverPolicy::ProbeBoth),
            other => Err(format!("unknown failover policy '{}'", other)),
        }
    }
}

#[derive(Clone)]
pub struct ActiveStoreSelector {
    prober: HealthProber,
    policy: FailoverPolicy,
}

impl ActiveStoreSelector {
    pub fn new(prober: HealthProber, policy: FailoverPolicy) -> Self {
        Self { prober, policy }
    }

    pub fn prober(&self) -> &HealthProber {
        &self.prober
    }

    pub fn policy(&self) -> FailoverPolicy {
        self.policy
    }

    pub async fn select_active_store(&self) -> StoreKind {
        let primary = self.prober.context().primary();

        if self.prober.check_health(primary).await {
            return primary;
        }

        let secondary_ok = match self.policy {
            FailoverPolicy::PrimaryOnly => None,
            FailoverPolicy::ProbeBoth => Some(self.prober.check_health(primary.other()).await),
        };
        self.fall_back(primary, secondary_ok)
    }

    /// Same decision as `select_active_store`, from health results already in hand
    pub fn choose(&self, primary_ok: bool, secondary_ok: bool) -> StoreKind {
        let primary = self.prober.context().primary();

        if primary_ok {
            return primary;
        }

        let secondary_ok = match self.policy {
            FailoverPolicy::PrimaryOnly => None,
            FailoverPolicy::ProbeBoth => Some(secondary_ok),
        };
        self.fall_back(primary, secondary_ok)
    }

    /// `secondary_ok` is `None` when the policy does not consult the secondary
    fn fall_back(&self, primary: StoreKind, secondary_ok: Option<bool>) -> StoreKind {
        let secondary = primary.other();

        if secondary_ok == Some(false) {
            log::error!(
                "❌ Both {} and {} are unhealthy, staying on {}",
                primary,
                secondary,
                primary
            );
            return primary;
        }

        log::warn!("⚠️  {} unhealthy, routing to {}", primary, secondary);
        secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StoreContext;
    use crate::testing::FakeStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn selector(
        primary: StoreKind,
        policy: FailoverPolicy,
    ) -> (ActiveStoreSelector, Arc<FakeStore>, Arc<FakeStore>) {
        let mongo = FakeStore::shared(StoreKind::Mongo);
        let postgres = FakeStore::shared(StoreKind::Postgres);
        let ctx = StoreContext::new(primary, mongo.clone(), postgres.clone()).unwrap();
        let prober = HealthProber::new(ctx, Duration::from_millis(50));
        (ActiveStoreSelector::new(prober, policy), mongo, postgres)
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "primary-only".parse::<FailoverPolicy>().unwrap(),
            FailoverPolicy::PrimaryOnly
        );
        assert_eq!(
            "PROBE_BOTH".parse::<FailoverPolicy>().unwrap(),
            FailoverPolicy::ProbeBoth
        );
        assert!("round-robin".parse::<FailoverPolicy>().is_err());
        assert_eq!(FailoverPolicy::default(), FailoverPolicy::PrimaryOnly);
    }

    #[tokio::test]
    async fn test_healthy_primary_is_selected() {
        let (selector, mongo, postgres) = selector(StoreKind::Mongo, FailoverPolicy::PrimaryOnly);
        assert_eq!(selector.select_active_store().await, StoreKind::Mongo);
        assert_eq!(mongo.ping_count(), 1);
        assert_eq!(postgres.ping_count(), 0);
    }

    #[tokio::test]
    async fn test_primary_only_never_probes_secondary() {
        let (selector, mongo, postgres) = selector(StoreKind::Mongo, FailoverPolicy::PrimaryOnly);
        mongo.set_ping_healthy(false);
        postgres.set_ping_healthy(false);

        assert_eq!(selector.select_active_store().await, StoreKind::Postgres);
        assert_eq!(postgres.ping_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_both_switches_to_healthy_secondary() {
        let (selector, _mongo, postgres) = selector(StoreKind::Postgres, FailoverPolicy::ProbeBoth);
        postgres.set_ping_healthy(false);

        assert_eq!(selector.select_active_store().await, StoreKind::Mongo);
    }

    #[tokio::test]
    async fn test_probe_both_stays_on_primary_when_everything_is_down() {
        let (selector, mongo, postgres) = selector(StoreKind::Mongo, FailoverPolicy::ProbeBoth);
        mongo.set_ping_healthy(false);
        postgres.set_ping_healthy(false);

        assert_eq!(selector.select_active_store().await, StoreKind::Mongo);
        assert_eq!(postgres.ping_count(), 1);
    }

    #[tokio::test]
    async fn test_selection_is_not_cached() {
        let (selector, mongo, _postgres) = selector(StoreKind::Mongo, FailoverPolicy::PrimaryOnly);
        mongo.set_ping_healthy(false);
        assert_eq!(selector.select_active_store().await, StoreKind::Postgres);

        mongo.set_ping_healthy(true);
        assert_eq!(selector.select_active_store().await, StoreKind::Mongo);
        assert_eq!(mongo.ping_count(), 2);
    }

    #[test]
    fn test_choose_uses_known_results_without_pinging() {
        let (primary_only, mongo, postgres) = selector(StoreKind::Mongo, FailoverPolicy::PrimaryOnly);
        assert_eq!(primary_only.choose(true, false), StoreKind::Mongo);
        assert_eq!(primary_only.choose(false, false), StoreKind::Postgres);

        let (probe_both, _, _) = selector(StoreKind::Postgres, FailoverPolicy::ProbeBoth);
        assert_eq!(probe_both.choose(false, true), StoreKind::Mongo);
        assert_eq!(probe_both.choose(false, false), StoreKind::Postgres);

        assert_eq!(mongo.ping_count(), 0);
        assert_eq!(postgres.ping_count(), 0);
    }
}
