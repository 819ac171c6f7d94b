use super::api::{GenerateContentRequest, GenerateContentResponse, refine_error};
use crate::client::Client;
use crate::error::BackendError;
use crate::traffic_log;
use crate::{ChatMessage, ChatModel, ChatRequest};
use async_trait::async_trait;

pub struct GeminiChatModel {
    client: Client,
    base_url: String,
    model_name: String,
}

impl GeminiChatModel {
    pub(crate) fn new(client: Client, base_url: String, model_name: String) -> Self {
        GeminiChatModel {
            client,
            base_url,
            model_name,
        }
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatMessage, BackendError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model_name);

        let api_request = GenerateContentRequest::from(request);
        traffic_log::log_request(&self.model_name, &api_request);

        match self
            .client
            .post::<_, _, GenerateContentResponse>(url, &api_request)
            .await
        {
            Ok(response) => {
                traffic_log::log_response(&self.model_name, &response);
                response.try_into()
            }
            Err(e) => {
                let e = refine_error(e);
                traffic_log::log_error(&self.model_name, &e.to_string());
                Err(e)
            }
        }
    }
}
