//! Blocking hand-off between an uploader and the downloader that claims it.

use std::sync::Arc;
use std::time::Duration;

use crate::common::TransferError;
use crate::session::{SessionStore, TransferStatus};

/// Orchestrates upload registration, download claims, and completion.
pub struct TransferCoordinator<S> {
    store: Arc<SessionStore<S>>,
    upload_timeout: Duration,
}

impl<S: Send + 'static> TransferCoordinator<S> {
    pub fn new(store: Arc<SessionStore<S>>, upload_timeout: Duration) -> Self {
        Self {
            store,
            upload_timeout,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore<S>> {
        &self.store
    }

    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    /// Registers `source` under `key` and waits until the transfer resolves.
    ///
    /// Returns `Ok` once a downloader has claimed the session and finished
    /// streaming, or `TransferTimedOut` if nobody claimed it in time. If the
    /// returned future is dropped while the session is still `Waiting`, the
    /// session is timed out so the reaper can reclaim it.
    pub async fn begin_upload(&self, key: &str, source: S) -> Result<(), TransferError> {
        let mut status_rx = self.store.create(key, source)?;
        let _guard = AbandonGuard {
            store: &self.store,
            key,
        };
        tracing::info!(key = %key, timeout_secs = self.upload_timeout.as_secs(), "upload waiting for receiver");

        let claimed = tokio::time::timeout(
            self.upload_timeout,
            status_rx.wait_for(|status| *status != TransferStatus::Waiting),
        )
        .await
        .map(|changed| changed.map(|status| *status));

        match claimed {
            Err(_elapsed) => {
                if self
                    .store
                    .update_status(key, TransferStatus::Waiting, TransferStatus::TimedOut)
                {
                    tracing::info!(key = %key, "no receiver found");
                    return Err(TransferError::TransferTimedOut);
                }
                // A claim won the race against the timer
            }
            Ok(Err(_closed)) => return Err(TransferError::NoSuchTransfer),
            Ok(Ok(_)) => {}
        }

        let finished = status_rx
            .wait_for(|status| status.is_terminal())
            .await
            .map(|status| *status);

        match finished {
            Ok(TransferStatus::Done) => {
                tracing::info!(key = %key, "upload delivered");
                Ok(())
            }
            Ok(_) => Err(TransferError::TransferTimedOut),
            Err(_closed) => Err(TransferError::NoSuchTransfer),
        }
    }

    /// Claims a `Waiting` session for download, waking its uploader.
    ///
    /// Fails immediately with `NoSuchTransfer` for unknown keys and for
    /// sessions that were already claimed, timed out, or finished.
    pub fn claim_download(&self, key: &str) -> Result<S, TransferError> {
        let source = self.store.claim(key)?;
        tracing::info!(key = %key, "download claimed");
        Ok(source)
    }

    /// Marks a claimed session `Done`, releasing the uploader.
    pub fn complete_download(&self, key: &str) -> bool {
        let completed = self
            .store
            .update_status(key, TransferStatus::InProgress, TransferStatus::Done);
        if completed {
            tracing::info!(key = %key, "download complete");
        } else {
            tracing::warn!(key = %key, "complete_download on a session that was not in progress");
        }
        completed
    }
}

/// Times out a still-`Waiting` session when its uploader goes away.
struct AbandonGuard<'a, S> {
    store: &'a SessionStore<S>,
    key: &'a str,
}

impl<S> Drop for AbandonGuard<'_, S> {
    fn drop(&mut self) {
        // No-op once the session left Waiting
        if self
            .store
            .update_status(self.key, TransferStatus::Waiting, TransferStatus::TimedOut)
        {
            tracing::info!(key = %self.key, "uploader disconnected before a receiver arrived");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(180);

    fn coordinator() -> Arc<TransferCoordinator<&'static str>> {
        Arc::new(TransferCoordinator::new(
            Arc::new(SessionStore::new()),
            TIMEOUT,
        ))
    }

    async fn wait_until_registered(coordinator: &TransferCoordinator<&'static str>, key: &str) {
        while !coordinator.store().contains(key) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn upload_without_receiver_times_out() {
        let coordinator = coordinator();

        let result = coordinator.begin_upload("k1", "payload").await;

        assert_eq!(result, Err(TransferError::TransferTimedOut));
        assert_eq!(coordinator.store().get("k1"), Some(TransferStatus::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn claim_then_complete_releases_uploader() {
        let coordinator = coordinator();
        let uploader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.begin_upload("k1", "payload").await })
        };
        wait_until_registered(&coordinator, "k1").await;

        let source = coordinator.claim_download("k1").expect("claim");
        assert_eq!(source, "payload");
        assert_eq!(coordinator.store().get("k1"), Some(TransferStatus::InProgress));

        // Claimed uploads stay open past the wait timeout until completion
        tokio::time::sleep(TIMEOUT * 2).await;
        assert!(!uploader.is_finished());

        assert!(coordinator.complete_download("k1"));
        assert_eq!(uploader.await.unwrap(), Ok(()));
        assert_eq!(coordinator.store().get("k1"), Some(TransferStatus::Done));
    }

    #[tokio::test(start_paused = true)]
    async fn second_claim_fails() {
        let coordinator = coordinator();
        let _uploader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.begin_upload("k1", "payload").await })
        };
        wait_until_registered(&coordinator, "k1").await;

        assert!(coordinator.claim_download("k1").is_ok());
        assert_eq!(
            coordinator.claim_download("k1"),
            Err(TransferError::NoSuchTransfer)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn claim_after_timeout_fails() {
        let coordinator = coordinator();
        let _ = coordinator.begin_upload("k1", "payload").await;

        assert_eq!(
            coordinator.claim_download("k1"),
            Err(TransferError::NoSuchTransfer)
        );
    }

    #[tokio::test]
    async fn duplicate_upload_key_rejected() {
        let coordinator = coordinator();
        let _uploader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.begin_upload("k1", "first").await })
        };
        wait_until_registered(&coordinator, "k1").await;

        assert_eq!(
            coordinator.begin_upload("k1", "second").await,
            Err(TransferError::KeyAlreadyExists)
        );
    }

    #[tokio::test]
    async fn dropped_uploader_times_out_session() {
        let coordinator = coordinator();
        let uploader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.begin_upload("k1", "payload").await })
        };
        wait_until_registered(&coordinator, "k1").await;

        uploader.abort();
        let _ = uploader.await;

        assert_eq!(coordinator.store().get("k1"), Some(TransferStatus::TimedOut));
    }

    #[tokio::test]
    async fn complete_without_claim_is_rejected() {
        let coordinator = coordinator();
        assert!(!coordinator.complete_download("missing"));
    }
}
