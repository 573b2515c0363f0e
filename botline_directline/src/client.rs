use async_trait::async_trait;
use botline_core::{
    ActivitySet, CallContext, ConversationGrant, Error, OutgoingActivity, Result, Transport, wire,
};
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://directline.botframework.com/v3/directline";

/// HTTP transport for a Direct Line style conversation service.
///
/// Every call carries the shared secret as a bearer token, the local user id
/// as a `UserId` cookie and the conversation token in a `token` header.
#[derive(Clone)]
pub struct DirectLineClient {
    client: Client,
    base_url: String,
    secret: String,
}

impl DirectLineClient {
    pub fn new(secret: String) -> Self {
        info!("Creating DirectLineClient");
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            secret,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(Error::transport)?;
        url.path_segments_mut()
            .map_err(|()| {
                Error::transport(anyhow::anyhow!(
                    "base URL cannot take a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, ctx: &CallContext) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.secret)
            .header(COOKIE, format!("UserId={}", ctx.user_id))
            .header("token", ctx.token_header())
    }

    fn start_conversation_request(&self, ctx: &CallContext) -> Result<RequestBuilder> {
        let url = self.url(&["conversations"])?;
        Ok(self.request(Method::POST, url, ctx))
    }

    fn post_activity_request(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
        activity: &OutgoingActivity,
    ) -> Result<RequestBuilder> {
        let url = self.url(&["conversations", conversation_id, "activities"])?;
        Ok(self.request(Method::POST, url, ctx).json(activity))
    }

    fn get_activities_request(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<RequestBuilder> {
        let mut url = self.url(&["conversations", conversation_id, "activities"])?;
        url.query_pairs_mut()
            .append_pair("watermark", watermark.unwrap_or(""));
        Ok(self.request(Method::GET, url, ctx))
    }

    /// Send a request and decode its body.
    ///
    /// An `error` field wins over the status code. A non-success status
    /// without one is reported with the raw body.
    async fn execute<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(Error::transport)?;
        let status = response.status();
        let body = response.text().await.map_err(Error::transport)?;

        if status.is_success() {
            return wire::decode(&body);
        }

        match wire::decode::<Value>(&body) {
            Err(Error::Service(message)) => Err(Error::Service(message)),
            _ => Err(Error::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl Transport for DirectLineClient {
    async fn start_conversation(&self, ctx: &CallContext) -> Result<ConversationGrant> {
        debug!("POST conversations");
        let request = self.start_conversation_request(ctx)?;
        self.execute(request).await
    }

    async fn post_activity(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
        activity: &OutgoingActivity,
    ) -> Result<()> {
        debug!("POST conversations/{conversation_id}/activities");
        let request = self.post_activity_request(ctx, conversation_id, activity)?;
        let _: Value = self.execute(request).await?;
        Ok(())
    }

    async fn get_activities(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
        watermark: Option<&str>,
    ) -> Result<ActivitySet> {
        debug!("GET conversations/{conversation_id}/activities?watermark={watermark:?}");
        let request = self.get_activities_request(ctx, conversation_id, watermark)?;
        self.execute(request).await
    }
}
