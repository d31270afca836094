//! Rate-limit backoff around a [`ModelClient`].

use tracing::{error, warn};

use crate::core::backoff::BackoffPolicy;
use crate::core::types::Message;
use crate::io::model::{ModelClient, ModelError, ModelRequest};
use crate::io::wait::Waiter;

/// Retries rate-limited calls on the [`BackoffPolicy`] schedule.
///
/// Every rate limit is followed by its wait, including the last one; after
/// the final wait the rate-limit error is returned. Any other error is
/// returned immediately. A provider `retry-after` hint is logged but never
/// changes the schedule.
#[derive(Debug)]
pub struct RetryingModel<M, W> {
    inner: M,
    policy: BackoffPolicy,
    waiter: W,
}

impl<M: ModelClient, W: Waiter> RetryingModel<M, W> {
    pub fn new(inner: M, policy: BackoffPolicy, waiter: W) -> Self {
        Self {
            inner,
            policy,
            waiter,
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: ModelClient, W: Waiter> ModelClient for RetryingModel<M, W> {
    fn complete(&self, request: &ModelRequest<'_>) -> Result<Message, ModelError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.complete(request) {
                Err(err) if err.is_rate_limited() => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        delay_secs = delay.as_secs(),
                        "rate limited, backing off"
                    );
                    self.waiter.wait(delay)?;
                    if self.policy.is_last(attempt) {
                        error!(
                            attempts = attempt + 1,
                            "still rate limited after final backoff"
                        );
                        return Err(err);
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingWaiter, ScriptedModel};
    use std::time::Duration;

    fn request(messages: &[Message]) -> ModelRequest<'_> {
        ModelRequest {
            model: "test",
            messages,
            tools: &[],
            max_tokens: 16,
        }
    }

    fn rate_limited() -> ModelError {
        ModelError::RateLimited { retry_after: None }
    }

    #[test]
    fn recovers_after_transient_rate_limits() {
        let model = ScriptedModel::new(vec![
            Err(rate_limited()),
            Err(rate_limited()),
            Ok(Message::assistant(Some("hi".to_string()), Vec::new())),
        ]);
        let waiter = RecordingWaiter::default();
        let retrying = RetryingModel::new(&model, BackoffPolicy::default(), &waiter);

        let messages = [Message::user("go")];
        let reply = retrying.complete(&request(&messages)).expect("reply");
        assert_eq!(reply.content.as_deref(), Some("hi"));
        assert_eq!(
            waiter.waits(),
            vec![Duration::from_secs(10), Duration::from_secs(20)]
        );
        assert_eq!(model.calls(), 3);
    }

    #[test]
    fn fifth_rate_limit_is_raised_after_full_schedule() {
        let model = ScriptedModel::new((0..6).map(|_| Err(rate_limited())).collect());
        let waiter = RecordingWaiter::default();
        let retrying = RetryingModel::new(&model, BackoffPolicy::default(), &waiter);

        let messages = [Message::user("go")];
        let err = retrying.complete(&request(&messages)).unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(
            waiter.waits(),
            [10, 20, 40, 80, 160]
                .into_iter()
                .map(Duration::from_secs)
                .collect::<Vec<_>>()
        );
        assert_eq!(model.calls(), 5);
    }

    #[test]
    fn retry_after_hint_does_not_change_the_schedule() {
        let model = ScriptedModel::new(vec![
            Err(ModelError::RateLimited {
                retry_after: Some(1),
            }),
            Err(ModelError::RateLimited {
                retry_after: Some(600),
            }),
            Ok(Message::assistant(Some("hi".to_string()), Vec::new())),
        ]);
        let waiter = RecordingWaiter::default();
        let retrying = RetryingModel::new(&model, BackoffPolicy::default(), &waiter);

        let messages = [Message::user("go")];
        retrying.complete(&request(&messages)).expect("reply");
        assert_eq!(
            waiter.waits(),
            vec![Duration::from_secs(10), Duration::from_secs(20)]
        );
    }

    #[test]
    fn other_errors_are_not_retried() {
        let model = ScriptedModel::new(vec![Err(ModelError::Api {
            status: 500,
            message: "boom".into(),
        })]);
        let waiter = RecordingWaiter::default();
        let retrying = RetryingModel::new(&model, BackoffPolicy::default(), &waiter);

        let messages = [Message::user("go")];
        let err = retrying.complete(&request(&messages)).unwrap_err();
        assert!(matches!(err, ModelError::Api { status: 500, .. }));
        assert!(waiter.waits().is_empty());
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn interrupted_wait_stops_retrying() {
        let model = ScriptedModel::new(vec![Err(rate_limited()), Err(rate_limited())]);
        let waiter = RecordingWaiter::interrupting_after(1);
        let retrying = RetryingModel::new(&model, BackoffPolicy::default(), &waiter);

        let messages = [Message::user("go")];
        let err = retrying.complete(&request(&messages)).unwrap_err();
        assert!(matches!(err, ModelError::Interrupted(_)));
        assert_eq!(model.calls(), 2);
    }
}
