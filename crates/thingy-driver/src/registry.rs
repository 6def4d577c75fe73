/*!
 * Session registry.
 *
 * Keeps at most one live session per device id so that two sessions never
 * contend for the same peripheral. A registered session is removed again
 * once it reports that it disconnected.
 */
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use futures::future::join_all;
use thingy_core::error::{Error, Result};
use thingy_core::event::EventReceiver;
use thingy_core::types::Id;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::event::SessionEvent;
use crate::session::DeviceSession;

type SessionMap = RwLock<HashMap<Id, Arc<DeviceSession>>>;

/// Live sessions by device id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
}

/// Remove `session` from `sessions` once it disconnects
async fn unregister_on_disconnect(
    sessions: Weak<SessionMap>,
    session: Weak<DeviceSession>,
    mut events: EventReceiver<SessionEvent>,
) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Disconnected) | Err(RecvError::Closed) => break,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
        }
    }

    let (Some(sessions), Some(session)) = (sessions.upgrade(), session.upgrade()) else {
        return;
    };
    let Ok(mut map) = sessions.write() else {
        return;
    };
    let id = session.id();
    if map
        .get(id)
        .map_or(false, |current| Arc::ptr_eq(current, &session))
    {
        map.remove(id);
        debug!("Unregistered disconnected session for device {}", id);
    }
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session.
    ///
    /// A disconnected session with the same id is replaced; a connected one
    /// makes this fail.
    pub fn register(&self, session: Arc<DeviceSession>) -> Result<()> {
        let id = session.id().clone();
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| Error::other("Failed to acquire write lock on session registry"))?;

        if let Some(existing) = sessions.get(&id) {
            if existing.is_connected() {
                return Err(Error::already_exists(format!(
                    "A session for device {} is already open",
                    id
                )));
            }
            debug!("Replacing closed session for device {}", id);
        }

        if session.is_connected() {
            match Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(unregister_on_disconnect(
                        Arc::downgrade(&self.sessions),
                        Arc::downgrade(&session),
                        session.subscribe(),
                    ));
                }
                Err(_) => warn!("No runtime to watch session {}; use prune()", id),
            }
        }
        sessions.insert(id.clone(), session);
        debug!("Registered session for device {}", id);
        Ok(())
    }

    /// Remove a session
    pub fn unregister(&self, id: &Id) -> Result<Arc<DeviceSession>> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| Error::other("Failed to acquire write lock on session registry"))?;

        sessions
            .remove(id)
            .ok_or_else(|| Error::not_found(format!("No session for device {}", id)))
    }

    /// Get a session by device id
    pub fn get(&self, id: &Id) -> Result<Arc<DeviceSession>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| Error::other("Failed to acquire read lock on session registry"))?;

        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("No session for device {}", id)))
    }

    /// Device ids of every registered session
    pub fn ids(&self) -> Result<Vec<Id>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| Error::other("Failed to acquire read lock on session registry"))?;

        Ok(sessions.keys().cloned().collect())
    }

    /// Drop sessions that are no longer connected, returning how many went
    pub fn prune(&self) -> Result<usize> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| Error::other("Failed to acquire write lock on session registry"))?;

        let before = sessions.len();
        sessions.retain(|_, session| session.is_connected());
        Ok(before - sessions.len())
    }

    /// Disconnect every session and empty the registry
    pub async fn disconnect_all(&self) -> Result<()> {
        let sessions: Vec<Arc<DeviceSession>> = {
            let mut sessions = self
                .sessions
                .write()
                .map_err(|_| Error::other("Failed to acquire write lock on session registry"))?;
            sessions.drain().map(|(_, session)| session).collect()
        };

        let results = join_all(sessions.iter().map(|session| {
            debug!("Disconnecting session for device {}", session.id());
            session.disconnect()
        }))
        .await;
        for (session, result) in sessions.iter().zip(results) {
            if let Err(e) = result {
                // Other sessions are still closed
                warn!("Failed to disconnect device {}: {}", session.id(), e);
            }
        }

        info!("Disconnected {} sessions", sessions.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use thingy_core::config::SharedConfig;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::mock::MockTransport;
    use crate::transport::Transport;

    async fn session(transport: &MockTransport) -> Arc<DeviceSession> {
        let transport: Arc<dyn Transport> = Arc::new(transport.clone());
        Arc::new(
            DeviceSession::connect(transport, SharedConfig::default())
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_one_live_session_per_device() {
        let registry = SessionRegistry::new();
        let first = session(&MockTransport::thingy().with_device_id("thingy-1")).await;
        assert_ok!(registry.register(Arc::clone(&first)));

        let second = session(&MockTransport::thingy().with_device_id("thingy-1")).await;
        let result = registry.register(Arc::clone(&second));
        assert!(matches!(result, Err(Error::AlreadyExists(_))));

        assert_ok!(first.disconnect().await);
        assert_ok!(registry.register(Arc::clone(&second)));
        assert!(Arc::ptr_eq(&assert_ok!(registry.get(second.id())), &second));
    }

    #[tokio::test]
    async fn test_disconnected_session_is_unregistered() {
        let registry = SessionRegistry::new();
        let transport = MockTransport::thingy().with_device_id("thingy-2");
        let session = session(&transport).await;
        assert_ok!(registry.register(Arc::clone(&session)));

        transport.drop_connection();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while registry.get(session.id()).is_ok() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_unregister_and_prune() {
        let registry = SessionRegistry::new();
        let a = session(&MockTransport::thingy().with_device_id("a")).await;
        let b = session(&MockTransport::thingy().with_device_id("b")).await;
        assert_ok!(registry.register(Arc::clone(&a)));
        assert_ok!(registry.register(Arc::clone(&b)));
        assert_eq!(assert_ok!(registry.ids()).len(), 2);

        assert_ok!(b.disconnect().await);
        assert_ok!(registry.prune());
        assert_err!(registry.get(b.id()));
        assert_eq!(assert_ok!(registry.ids()), vec![a.id().clone()]);

        assert_ok!(registry.unregister(a.id()));
        assert!(matches!(registry.unregister(a.id()), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_disconnect_all() {
        let registry = SessionRegistry::new();
        let a = session(&MockTransport::thingy().with_device_id("a")).await;
        assert_ok!(registry.register(Arc::clone(&a)));

        assert_ok!(registry.disconnect_all().await);
        assert!(!a.is_connected());
        assert!(assert_ok!(registry.ids()).is_empty());
    }
}
