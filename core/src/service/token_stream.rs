use crate::service::AiService;
use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::task::JoinHandle;

type NextHandler = Box<dyn FnMut(String) + Send>;
type CompleteHandler = Box<dyn FnOnce(String) + Send>;
type ErrorHandler = Box<dyn FnOnce(anyhow::Error) + Send>;

/// Handle for a response that has not been requested yet.
///
/// Register callbacks, then call [`TokenStream::start`]. Tokens reach
/// `on_next` in arrival order; afterwards exactly one of `on_complete`
/// (with the full answer) or `on_error` runs.
#[must_use = "a TokenStream does nothing until started"]
pub struct TokenStream {
    service: AiService,
    user_message: String,
    on_next: Option<NextHandler>,
    on_complete: Option<CompleteHandler>,
    on_error: Option<ErrorHandler>,
}

impl TokenStream {
    pub(crate) fn new(service: AiService, user_message: String) -> Self {
        Self {
            service,
            user_message,
            on_next: None,
            on_complete: None,
            on_error: None,
        }
    }

    pub fn on_next(mut self, handler: impl FnMut(String) + Send + 'static) -> Self {
        self.on_next = Some(Box::new(handler));
        self
    }

    pub fn on_complete(mut self, handler: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl FnOnce(anyhow::Error) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Sends the request on a background task.
    pub fn start(self) -> JoinHandle<()> {
        let TokenStream {
            service,
            user_message,
            on_next,
            on_complete,
            on_error,
        } = self;

        tokio::spawn(async move {
            let Some(mut on_next) = on_next else {
                report(on_error, anyhow!("on_next must be registered before start"));
                return;
            };

            match service.stream_turn(user_message, &mut on_next).await {
                Ok(answer) => {
                    if let Some(on_complete) = on_complete {
                        on_complete(answer);
                    }
                }
                Err(e) => report(on_error, e),
            }
        })
    }

    /// Runs the request on the current task and returns the full answer.
    /// Registered callbacks still fire.
    pub async fn collect(self) -> Result<String> {
        self.finish(None).await
    }

    /// Like [`TokenStream::collect`], but gives up after `timeout`. Running
    /// out of time counts as a failure and reaches `on_error`.
    pub async fn collect_with_timeout(self, timeout: Duration) -> Result<String> {
        self.finish(Some(timeout)).await
    }

    async fn finish(self, timeout: Option<Duration>) -> Result<String> {
        let TokenStream {
            service,
            user_message,
            on_next,
            on_complete,
            on_error,
        } = self;
        let mut on_next = on_next.unwrap_or_else(|| Box::new(|_: String| {}));

        let turn = service.stream_turn(user_message, &mut on_next);
        let outcome = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, turn)
                .await
                .unwrap_or_else(|_| Err(anyhow!("No complete answer within {:?}", timeout))),
            None => turn.await,
        };

        match outcome {
            Ok(answer) => {
                if let Some(on_complete) = on_complete {
                    on_complete(answer.clone());
                }
                Ok(answer)
            }
            Err(e) => {
                if let Some(on_error) = on_error {
                    on_error(anyhow!("{e:#}"));
                }
                Err(e)
            }
        }
    }
}

fn report(on_error: Option<ErrorHandler>, error: anyhow::Error) {
    match on_error {
        Some(on_error) => on_error(error),
        None => tracing::error!(error = %format!("{error:#}"), "Token stream failed"),
    }
}
