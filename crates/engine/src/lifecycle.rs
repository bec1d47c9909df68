//! Grant/extend/remove lifecycle, keeping the gateway in step with the
//! store.
//!
//! A revoked subscriber stays banned from the channel until re-granted,
//! so both grant and extend lift the ban first. Removal deletes the rows
//! and then bans the subscriber.

use std::sync::Arc;

use tracing::{info, warn};

use tollgate_core::{GrantDuration, SubscriberId};
use tollgate_notify::AccessGateway;
use tollgate_store::{GrantRequest, Store};

pub struct Lifecycle {
    store: Arc<Store>,
    gateway: Arc<dyn AccessGateway>,
}

impl Lifecycle {
    pub fn new(store: Arc<Store>, gateway: Arc<dyn AccessGateway>) -> Self {
        Self { store, gateway }
    }

    /// Create or fully replace a subscriber's window.
    ///
    /// The ban is lifted first so a previously expired subscriber can use
    /// a new invite; a gateway failure there is logged but does not block
    /// the grant itself.
    pub async fn grant(&self, req: &GrantRequest) -> bool {
        if let Err(e) = self.gateway.restore(req.id).await {
            warn!(subscriber = %req.id, error = %e, "Failed to lift ban before grant");
        }
        let granted = self.store.grant(req).await;
        if granted {
            info!(subscriber = %req.id, duration = %req.duration, "Subscription granted");
        }
        granted
    }

    /// Push an existing subscriber's window forward.
    pub async fn extend(
        &self,
        id: SubscriberId,
        duration: GrantDuration,
        actor: Option<SubscriberId>,
    ) -> bool {
        if let Err(e) = self.gateway.restore(id).await {
            warn!(subscriber = %id, error = %e, "Failed to lift ban before extension");
        }
        let extended = self.store.extend(id, duration, actor).await;
        if extended {
            info!(subscriber = %id, duration = %duration, "Subscription extended");
        }
        extended
    }

    /// Delete the subscriber and ban them from the channel.
    pub async fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.store.remove(id).await;
        if removed {
            if let Err(e) = self.gateway.revoke(id).await {
                warn!(subscriber = %id, error = %e, "Failed to revoke access after removal");
            }
            info!(subscriber = %id, "Subscriber removed");
        }
        removed
    }
}
