//! WhatsApp Business Cloud API adapter.
//!
//! Sends `POST {base}/{version}/{phone_number_id}/messages` with the
//! tenant's bearer token and reads `messages[0].id` back as the provider
//! message id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::{ChannelAdapter, MessagePayload, OutboundRequest, SendReceipt};
use crate::config::ChannelConfig;
use crate::credentials::CredentialsProvider;
use crate::error::ChannelSendError;

pub struct WhatsAppCloudAdapter {
    client: reqwest::Client,
    config: ChannelConfig,
    credentials: Arc<dyn CredentialsProvider>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: String,
    code: Option<i64>,
}

impl WhatsAppCloudAdapter {
    pub fn new(
        config: ChannelConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config, credentials))
    }

    /// Create an adapter reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        config: ChannelConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            client,
            config,
            credentials,
        }
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.api_base_url, self.config.api_version, phone_number_id
        )
    }

    /// Provider wire body for one request.
    fn request_body(&self, request: &OutboundRequest) -> serde_json::Value {
        let mut body = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": request.phone,
        });

        match &request.payload {
            MessagePayload::Text { body: text } => {
                body["type"] = json!("text");
                body["text"] = json!({ "preview_url": false, "body": text });
            }
            MessagePayload::Template { name } => {
                body["type"] = json!("template");
                body["template"] = json!({
                    "name": name,
                    "language": { "code": self.config.template_language },
                });
            }
            MessagePayload::Media {
                url,
                kind,
                caption,
                filename,
            } => {
                let kind_name = kind.name();
                let mut media = json!({ "link": url });
                if let Some(caption) = caption {
                    if *kind != relay_core::media::MediaKind::Audio {
                        media["caption"] = json!(caption);
                    }
                }
                if let Some(filename) = filename {
                    if *kind == relay_core::media::MediaKind::Document {
                        media["filename"] = json!(filename);
                    }
                }
                body["type"] = json!(kind_name);
                body[kind_name] = media;
            }
        }

        if let Some(department) = &request.department_code {
            body["biz_opaque_callback_data"] = json!(department);
        }
        body
    }

    async fn classify_failure(response: reqwest::Response) -> ChannelSendError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => {
                let message = if envelope.error.message.is_empty() {
                    format!("provider returned {status}")
                } else {
                    envelope.error.message
                };
                ChannelSendError::from_response(status, envelope.error.code, message)
            }
            Err(_) => ChannelSendError::from_response(
                status,
                None,
                format!("provider returned {status}: {text}"),
            ),
        }
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppCloudAdapter {
    async fn send(&self, request: &OutboundRequest) -> Result<SendReceipt, ChannelSendError> {
        let credentials = self.credentials.credentials(request.tenant_id).await?;

        let response = self
            .client
            .post(self.messages_url(&credentials.phone_number_id))
            .bearer_auth(&credentials.access_token)
            .json(&self.request_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::classify_failure(response).await;
            tracing::debug!(
                tenant_id = request.tenant_id,
                transient = err.is_transient(),
                error = %err,
                "Channel send rejected",
            );
            return Err(err);
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| ChannelSendError::transient(format!("unreadable provider response: {e}")))?;

        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| SendReceipt {
                provider_message_id: m.id,
            })
            .ok_or_else(|| ChannelSendError::permanent("provider response carried no message id"))
    }
}

#[cfg(test)]
mod tests {
    use relay_core::media::MediaKind;

    use super::*;
    use crate::credentials::StaticCredentials;

    fn adapter() -> WhatsAppCloudAdapter {
        WhatsAppCloudAdapter::with_client(
            reqwest::Client::new(),
            ChannelConfig::for_base_url("http://provider.test/"),
            Arc::new(StaticCredentials::new()),
        )
    }

    #[test]
    fn url_includes_version_and_phone_number_id() {
        assert_eq!(
            adapter().messages_url("1234"),
            "http://provider.test/v19.0/1234/messages"
        );
    }

    #[test]
    fn template_body_carries_language() {
        let request = OutboundRequest::new(
            1,
            "5215550001",
            MessagePayload::Template {
                name: "launch_v2".into(),
            },
        );
        let body = adapter().request_body(&request);
        assert_eq!(body["type"], "template");
        assert_eq!(body["template"]["name"], "launch_v2");
        assert_eq!(body["template"]["language"]["code"], "es_MX");
        assert_eq!(body["to"], "5215550001");
    }

    #[test]
    fn media_body_respects_kind_specific_fields() {
        let doc = OutboundRequest::new(
            1,
            "5215550001",
            MessagePayload::Media {
                url: "https://cdn.test/a.pdf".into(),
                kind: MediaKind::Document,
                caption: Some("Planos".into()),
                filename: Some("planos.pdf".into()),
            },
        )
        .with_department(Some("MTY".into()));
        let body = adapter().request_body(&doc);
        assert_eq!(body["type"], "document");
        assert_eq!(body["document"]["filename"], "planos.pdf");
        assert_eq!(body["document"]["caption"], "Planos");
        assert_eq!(body["biz_opaque_callback_data"], "MTY");

        let audio = OutboundRequest::new(
            1,
            "5215550001",
            MessagePayload::Media {
                url: "https://cdn.test/a.ogg".into(),
                kind: MediaKind::Audio,
                caption: Some("ignored".into()),
                filename: Some("ignored.ogg".into()),
            },
        );
        let body = adapter().request_body(&audio);
        assert_eq!(body["audio"]["link"], "https://cdn.test/a.ogg");
        assert!(body["audio"].get("caption").is_none());
        assert!(body["audio"].get("filename").is_none());
    }
}
