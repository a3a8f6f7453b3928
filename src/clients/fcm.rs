use futures::future::join_all;
use futures::stream::{self, StreamExt};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::RuntimeFlavor;
use tracing::debug;

use super::dispatcher::{Authorization, Dispatcher};
use super::legacy::{LegacyApi, MAX_RECIPIENTS};
use super::traits::{HttpTransport, PushApi};
use super::transport::ReqwestTransport;
use super::v1::V1Api;
use crate::auth::{CredentialResolver, Credentials, TokenManager};
use crate::config::FcmClientConfig;
use crate::errors::{FcmError, FcmResult};
use crate::message::{Message, Target};
use crate::response::SendResponse;

/// Async push notification client
///
/// Cheap to clone; clones share the token cache and the connection pool.
///
/// ```rust,no_run
/// use fcm_push::{FcmClientConfig, FcmNotification, Message};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), fcm_push::FcmError> {
/// let config = FcmClientConfig::service_account("service-account.json");
/// let client = FcmNotification::new(config)?;
///
/// let message = Message::new().title("Hello").body("World");
/// let result = client.notify_single_device("registration-token", message).await?;
/// println!("sent {:?}", result.message_id());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FcmNotification {
    api: Arc<dyn PushApi>,
    token_manager: Option<Arc<TokenManager>>,
    max_concurrent_requests: Option<usize>,
}

impl FcmNotification {
    /// Client whose credential comes from the config (key file or legacy key)
    pub fn new(config: FcmClientConfig) -> FcmResult<Self> {
        Self::build(config, None, None)
    }

    /// Client using a caller-built credential
    pub fn with_credentials(
        config: FcmClientConfig,
        credentials: Arc<dyn Credentials>,
    ) -> FcmResult<Self> {
        Self::build(config, Some(credentials), None)
    }

    /// Client with an explicit HTTP transport
    pub fn from_parts(
        config: FcmClientConfig,
        credentials: Option<Arc<dyn Credentials>>,
        transport: Arc<dyn HttpTransport>,
    ) -> FcmResult<Self> {
        Self::build(config, credentials, Some(transport))
    }

    fn build(
        config: FcmClientConfig,
        credentials: Option<Arc<dyn Credentials>>,
        transport: Option<Arc<dyn HttpTransport>>,
    ) -> FcmResult<Self> {
        config.validate()?;

        let reqwest_transport = ReqwestTransport::new(&config)?;
        let http_client = reqwest_transport.client().clone();
        let transport =
            transport.unwrap_or_else(|| Arc::new(reqwest_transport) as Arc<dyn HttpTransport>);
        let timeout = config.timeout();

        if let Some(api_key) = config.legacy_api_key {
            debug!(endpoint = %config.legacy_endpoint, "Using legacy key-based API");
            let dispatcher = Dispatcher::new(transport, Authorization::ApiKey(api_key), timeout);
            return Ok(Self {
                api: Arc::new(LegacyApi::new(dispatcher, config.legacy_endpoint)),
                token_manager: None,
                max_concurrent_requests: config.max_concurrent_requests,
            });
        }

        let resolver = Arc::new(CredentialResolver::new(
            credentials,
            config.service_account_file,
            config.project_id,
            http_client,
        )?);
        let token_manager = Arc::new(TokenManager::new(Arc::clone(&resolver)));
        let dispatcher = Dispatcher::new(
            transport,
            Authorization::Bearer(Arc::clone(&token_manager)),
            timeout,
        );

        Ok(Self {
            api: Arc::new(V1Api::new(resolver, dispatcher, config.endpoint_base)),
            token_manager: Some(token_manager),
            max_concurrent_requests: config.max_concurrent_requests,
        })
    }

    /// Protocol implementation selected at construction
    pub fn api(&self) -> &dyn PushApi {
        self.api.as_ref()
    }

    /// Shared bearer token cache; `None` for the legacy API
    pub fn token_manager(&self) -> Option<&TokenManager> {
        self.token_manager.as_deref()
    }

    /// Target project of the v1 API, resolved on first use
    pub fn project_id(&self) -> FcmResult<&str> {
        match &self.token_manager {
            Some(tokens) => tokens.resolver().project_id(),
            None => Err(FcmError::configuration(
                "The legacy API is not bound to a project",
            )),
        }
    }

    pub fn endpoint(&self) -> FcmResult<String> {
        self.api.endpoint()
    }

    /// Build, send and decode one message
    pub async fn notify(&self, message: &Message) -> FcmResult<SendResponse> {
        let payload = self.api.build_payload(message)?;
        let response = self.api.send(&payload).await?;
        self.api.parse_response(&response)
    }

    /// Send to one device registration token
    pub async fn notify_single_device(
        &self,
        token: impl Into<String>,
        message: Message,
    ) -> FcmResult<SendResponse> {
        self.notify(&message.with_target(Target::Token(token.into())))
            .await
    }

    /// Send to a topic, or to a topic condition, which wins when both are given
    pub async fn notify_topic(
        &self,
        topic_name: Option<&str>,
        topic_condition: Option<&str>,
        message: Message,
    ) -> FcmResult<SendResponse> {
        let target = match (topic_condition, topic_name) {
            (Some(condition), _) => Target::Condition(condition.to_string()),
            (None, Some(topic)) => Target::Topic(topic.to_string()),
            (None, None) => {
                return Err(FcmError::invalid_data(
                    "Please provide a topic_name or topic_condition",
                ))
            }
        };
        self.notify(&message.with_target(target)).await
    }

    /// Send the same message to many devices
    ///
    /// Tokens are split into chunks of 1000. The legacy API sends one request
    /// per chunk; the v1 API sends one request per token, a chunk at a time.
    /// Results come back in order: one per chunk (legacy) or per token (v1).
    pub async fn notify_multiple_devices(
        &self,
        tokens: &[String],
        message: &Message,
    ) -> FcmResult<Vec<FcmResult<SendResponse>>> {
        if tokens.is_empty() {
            return Err(FcmError::invalid_data("No registration tokens provided"));
        }

        let mut results = Vec::with_capacity(tokens.len());
        for (index, chunk) in tokens.chunks(MAX_RECIPIENTS).enumerate() {
            debug!(chunk = index, recipients = chunk.len(), "Sending chunk");
            if self.api.max_recipients() > 1 {
                let chunk_message = message.clone().with_target(Target::Tokens(chunk.to_vec()));
                results.push(self.notify(&chunk_message).await);
            } else {
                let messages: Vec<Message> = chunk
                    .iter()
                    .map(|token| message.clone().with_target(Target::Token(token.clone())))
                    .collect();
                results.extend(self.async_notify_multiple_devices(&messages).await);
            }
        }
        Ok(results)
    }

    /// Send many independent messages concurrently
    ///
    /// At most `max_concurrent_requests` are in flight when configured. Each
    /// message runs its own retry loop; results keep the input order.
    pub async fn async_notify_multiple_devices(
        &self,
        messages: &[Message],
    ) -> Vec<FcmResult<SendResponse>> {
        let sends = messages.iter().map(|message| self.notify(message));
        match self.max_concurrent_requests {
            Some(limit) => stream::iter(sends).buffered(limit).collect::<Vec<_>>().await,
            None => join_all(sends).await,
        }
    }
}

/// Blocking wrapper around [`FcmNotification`] for thread-per-request callers
///
/// Calls made inside a multi-threaded Tokio runtime run on it through
/// `block_in_place`; elsewhere the client drives its own runtime, created on
/// first use. Rate-limit waits block only the calling thread.
///
/// Calling from inside a current-thread runtime fails with
/// [`FcmError::Configuration`]; use [`FcmNotification`] there.
pub struct BlockingFcmNotification {
    inner: FcmNotification,
    runtime: OnceCell<tokio::runtime::Runtime>,
}

impl BlockingFcmNotification {
    pub fn new(inner: FcmNotification) -> Self {
        Self {
            inner,
            runtime: OnceCell::new(),
        }
    }

    pub fn with_config(config: FcmClientConfig) -> FcmResult<Self> {
        Ok(Self::new(FcmNotification::new(config)?))
    }

    pub fn inner(&self) -> &FcmNotification {
        &self.inner
    }

    fn block_on<F: Future>(&self, future: F) -> FcmResult<F::Output> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                Err(FcmError::configuration(
                    "The blocking client cannot run inside a current-thread runtime",
                ))
            }
            Ok(handle) => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
            Err(_) => {
                let runtime = self.runtime.get_or_try_init(|| {
                    tokio::runtime::Builder::new_multi_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| {
                            FcmError::configuration_with_source("Failed to create runtime", e)
                        })
                })?;
                Ok(runtime.block_on(future))
            }
        }
    }

    pub fn notify(&self, message: &Message) -> FcmResult<SendResponse> {
        self.block_on(self.inner.notify(message))?
    }

    pub fn notify_single_device(
        &self,
        token: impl Into<String>,
        message: Message,
    ) -> FcmResult<SendResponse> {
        self.block_on(self.inner.notify_single_device(token, message))?
    }

    pub fn notify_topic(
        &self,
        topic_name: Option<&str>,
        topic_condition: Option<&str>,
        message: Message,
    ) -> FcmResult<SendResponse> {
        self.block_on(self.inner.notify_topic(topic_name, topic_condition, message))?
    }

    pub fn notify_multiple_devices(
        &self,
        tokens: &[String],
        message: &Message,
    ) -> FcmResult<Vec<FcmResult<SendResponse>>> {
        self.block_on(self.inner.notify_multiple_devices(tokens, message))?
    }

    pub fn async_notify_multiple_devices(
        &self,
        messages: &[Message],
    ) -> FcmResult<Vec<FcmResult<SendResponse>>> {
        self.block_on(self.inner.async_notify_multiple_devices(messages))
    }
}

impl From<FcmNotification> for BlockingFcmNotification {
    fn from(inner: FcmNotification) -> Self {
        Self::new(inner)
    }
}
