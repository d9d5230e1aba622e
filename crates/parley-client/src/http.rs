//! HTTP+JSON implementation of [`ChatBackend`].

use async_trait::async_trait;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use parley_core::{
    AgentRun, AgentTask, BackendConfig, Chat, ChatHistory, Message, NewChat, NewMessage, User,
};

use crate::backend::{ChatBackend, Operation};
use crate::endpoint::BackendUrl;
use crate::error::ClientError;

/// Client for the chat service's REST endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base: BackendUrl,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let base = BackendUrl::parse(&config.base_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(agent) = config.user_agent.as_deref() {
            let value = HeaderValue::from_str(agent)
                .map_err(|_| ClientError::InvalidUserAgent(agent.to_string()))?;
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(USER_AGENT, value);
            builder = builder.default_headers(headers);
        }
        let http = builder.build().map_err(ClientError::Setup)?;

        tracing::debug!(base_url = %base.as_str(), "HTTP backend ready");
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        self.base.endpoint(segments)
    }

    async fn execute<T>(&self, operation: Operation, request: RequestBuilder) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => {
                tracing::warn!(%operation, error = %source, "Backend request failed");
                return Err(ClientError::Transport { operation, source });
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%operation, status = status.as_u16(), "Backend returned an error status");
            return Err(ClientError::Status {
                operation,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|source| {
            tracing::warn!(%operation, error = %source, "Backend response did not decode");
            ClientError::Decode { operation, source }
        })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn resolve_user(&self, email: &str) -> Result<User, ClientError> {
        let url = self.endpoint(&["users", email])?;
        self.execute(Operation::ResolveUser, self.http.get(url)).await
    }

    async fn list_chats(&self, email: &str) -> Result<Vec<Chat>, ClientError> {
        let url = self.endpoint(&["users", email, "chats"])?;
        self.execute(Operation::ListChats, self.http.get(url)).await
    }

    async fn search_chats(&self, user_id: &str, query: &str) -> Result<Vec<Chat>, ClientError> {
        let url = self.endpoint(&["users", user_id, "chats", "search"])?;
        let request = self.http.get(url).query(&[("query", query)]);
        self.execute(Operation::SearchChats, request).await
    }

    async fn create_chat(&self, request: &NewChat) -> Result<Chat, ClientError> {
        let url = self.endpoint(&["chats", ""])?;
        self.execute(Operation::CreateChat, self.http.post(url).json(request))
            .await
    }

    async fn fetch_messages(&self, chat_id: &str) -> Result<Vec<Message>, ClientError> {
        let url = self.endpoint(&["chats", chat_id])?;
        let operation = Operation::FetchMessages {
            chat_id: chat_id.to_string(),
        };
        let history: ChatHistory = self.execute(operation, self.http.get(url)).await?;
        Ok(history.into_messages())
    }

    async fn post_message(
        &self,
        chat_id: &str,
        message: &NewMessage,
    ) -> Result<Message, ClientError> {
        let url = self.endpoint(&["chats", chat_id, "messages"])?;
        let operation = Operation::PostMessage {
            sender: message.sender,
        };
        self.execute(operation, self.http.post(url).json(message))
            .await
    }

    async fn run_agent(&self, task: &AgentTask) -> Result<AgentRun, ClientError> {
        let url = self.endpoint(&["run-agent", ""])?;
        self.execute(Operation::RunAgent, self.http.post(url).json(task))
            .await
    }
}
