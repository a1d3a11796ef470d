//! Scoped use of a management server session.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::vcenter::ComplianceApi;

/// Upper bound on releasing the session, so a stalled server cannot hold
/// the process after the work is done or abandoned.
const LOGOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `f` against `api`, then release the session.
///
/// Returns `None` when `cancel` fires before `f` completes; `f` is dropped at
/// whatever remote call it was waiting on. The logout happens exactly once
/// either way. A failed or stalled logout is logged and never replaces the
/// result of `f`.
pub async fn scoped<'a, A, F, Fut, T>(api: &'a A, cancel: &CancellationToken, f: F) -> Option<T>
where
    A: ComplianceApi,
    F: FnOnce(&'a A) -> Fut,
    Fut: Future<Output = T>,
{
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!("Interrupted, abandoning the current remote call");
            None
        }
        value = f(api) => Some(value),
    };

    match tokio::time::timeout(LOGOUT_TIMEOUT, api.logout()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Failed to release session: {}", e),
        Err(_) => tracing::warn!("Session release timed out after {:?}", LOGOUT_TIMEOUT),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use crate::vcenter::ApiError;

    #[tokio::test]
    async fn test_logout_after_success() {
        let api = FakeApi::default();
        let cancel = CancellationToken::new();

        let value = scoped(&api, &cancel, |api| async move {
            api.list_clusters().await.map(|c| c.len())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(value, 0);
        assert_eq!(api.calls(), vec!["list_clusters", "logout"]);
    }

    #[tokio::test]
    async fn test_logout_after_error() {
        let api = FakeApi {
            unreachable: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();

        let result: Option<Result<usize, ApiError>> = scoped(&api, &cancel, |api| async move {
            let clusters = api.list_clusters().await?;
            Ok(clusters.len())
        })
        .await;

        assert!(result.unwrap().is_err());
        assert_eq!(api.count("logout"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_stalled_call() {
        let api = FakeApi {
            stalled: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let result = scoped(&api, &cancel, |api| async move {
            api.list_clusters().await.map(|c| c.len())
        })
        .await;

        assert!(result.is_none());
        assert_eq!(api.calls(), vec!["list_clusters", "logout"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_skips_work() {
        let api = FakeApi::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = scoped(&api, &cancel, |api| async move { api.list_clusters().await }).await;

        assert!(result.is_none());
        assert_eq!(api.calls(), vec!["logout"]);
    }
}
