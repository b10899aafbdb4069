// ==================== MIRROR WRITER ====================
// Best-effort replication of successful writes to the inactive store.
// Fire-and-forget: failures are logged and dropped, never retried.

use crate::database::{Store, StoreContext, StoreKind, StoreResult};
use crate::models::{Appointment, Payment, User};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Full-record replication; upserts keep the origin id and timestamps
#[derive(Debug, Clone)]
pub enum MirrorOp {
    UpsertUser(User),
    UpsertAppointment(Appointment),
    UpsertPayment(Payment),
    DeleteUser(String),
    DeleteAppointment(String),
    DeletePayment(String),
}

impl MirrorOp {
    pub fn describe(&self) -> String {
        match self {
            MirrorOp::UpsertUser(u) => format!("upsert user {}", u.id),
            MirrorOp::UpsertAppointment(a) => format!("upsert appointment {}", a.id),
            MirrorOp::UpsertPayment(p) => format!("upsert payment {}", p.id),
            MirrorOp::DeleteUser(id) => format!("delete user {}", id),
            MirrorOp::DeleteAppointment(id) => format!("delete appointment {}", id),
            MirrorOp::DeletePayment(id) => format!("delete payment {}", id),
        }
    }

    async fn apply(&self, store: &dyn Store) -> StoreResult<()> {
        match self {
            MirrorOp::UpsertUser(u) => store.upsert_user(u).await,
            MirrorOp::UpsertAppointment(a) => store.upsert_appointment(a).await,
            MirrorOp::UpsertPayment(p) => store.upsert_payment(p).await,
            MirrorOp::DeleteUser(id) => store.delete_user(id).await.map(|_| ()),
            MirrorOp::DeleteAppointment(id) => store.delete_appointment(id).await.map(|_| ()),
            MirrorOp::DeletePayment(id) => store.delete_payment(id).await.map(|_| ()),
        }
    }
}

#[derive(Clone)]
pub struct MirrorWriter {
    ctx: StoreContext,
}

impl MirrorWriter {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    /// Spawns the replication and returns immediately. The handle is only
    /// useful to tests; production callers drop it.
    pub fn mirror(&self, op: MirrorOp, target: StoreKind) -> JoinHandle<()> {
        let store: Arc<dyn Store> = self.ctx.store(target).clone();

        tokio::spawn(async move {
            let label = op.describe();
            let outcome = AssertUnwindSafe(async { op.apply(store.as_ref()).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => log::debug!("🪞 Mirrored {} to {}", label, target),
                Ok(Err(e)) => log::warn!("⚠️  MirrorFailure: {} on {}: {}", label, target, e),
                Err(_) => log::warn!("⚠️  MirrorFailure: {} on {} panicked", label, target),
            }
        })
    }
}
