use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::llm::provider::{http_error, BackendReply, CompletionBackend, GenerationParams, SYSTEM_PROMPT};
use crate::llm::registry::ProviderConfig;

const SERVICE: &str = "hunyuan";
const ACTION: &str = "ChatCompletions";
const VERSION: &str = "2023-09-01";
const CONTENT_TYPE: &str = "application/json; charset=utf-8";

type HmacSha256 = Hmac<Sha256>;

/// Tencent Cloud API 3.0 `ChatCompletions`, signed with TC3-HMAC-SHA256.
pub struct HunyuanBackend {
    client: Client,
    secret_id: String,
    secret_key: String,
    endpoint: String,
    host: String,
    region: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    response: ChatResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

impl HunyuanBackend {
    pub fn new(client: Client, config: &ProviderConfig) -> Result<Self> {
        let missing = config.missing_credentials();
        if !missing.is_empty() {
            return Err(Error::provider_call(
                config.name,
                format!("{} not set", missing.join(", ")),
            ));
        }

        let endpoint = config.base_url.clone();
        let host = url::Url::parse(&endpoint)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| Error::Config(format!("invalid Hunyuan endpoint: {}", endpoint)))?;

        Ok(Self {
            client,
            secret_id: config.credential("TENCENT_SECRET_ID").unwrap_or_default().to_string(),
            secret_key: config.credential("TENCENT_SECRET_KEY").unwrap_or_default().to_string(),
            endpoint,
            host,
            region: config.region.clone().unwrap_or_else(|| "ap-beijing".to_string()),
        })
    }

    fn authorization(&self, payload: &str, now: DateTime<Utc>) -> Result<String> {
        sign_tc3(&self.secret_id, &self.secret_key, &self.host, payload, now)
    }
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::provider_call(SERVICE, format!("signing failed: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Builds the `Authorization` header value for one request.
pub(crate) fn sign_tc3(
    secret_id: &str,
    secret_key: &str,
    host: &str,
    payload: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let timestamp = now.timestamp();
    let date = now.format("%Y-%m-%d").to_string();
    let signed_headers = "content-type;host;x-tc-action";

    let canonical_request = format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\nx-tc-action:{}\n\n{}\n{}",
        CONTENT_TYPE,
        host,
        ACTION.to_lowercase(),
        signed_headers,
        sha256_hex(payload)
    );

    let scope = format!("{}/{}/tc3_request", date, SERVICE);
    let string_to_sign = format!(
        "TC3-HMAC-SHA256\n{}\n{}\n{}",
        timestamp,
        scope,
        sha256_hex(&canonical_request)
    );

    let secret_date = hmac_sha256(format!("TC3{}", secret_key).as_bytes(), &date)?;
    let secret_service = hmac_sha256(&secret_date, SERVICE)?;
    let secret_signing = hmac_sha256(&secret_service, "tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, &string_to_sign)?);

    Ok(format!(
        "TC3-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        secret_id, scope, signed_headers, signature
    ))
}

#[async_trait]
impl CompletionBackend for HunyuanBackend {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<BackendReply> {
        let request = ChatRequest {
            model: &params.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: params.temperature,
            stream: false,
        };
        let payload = serde_json::to_string(&request)?;

        let now = Utc::now();
        let authorization = self.authorization(&payload, now)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", authorization)
            .header("Content-Type", CONTENT_TYPE)
            .header("Host", &self.host)
            .header("X-TC-Action", ACTION)
            .header("X-TC-Timestamp", now.timestamp().to_string())
            .header("X-TC-Version", VERSION)
            .header("X-TC-Region", &self.region)
            .body(payload)
            .send()
            .await
            .map_err(|e| Error::provider_call(self.name(), format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(self.name(), Some("TENCENT_SECRET_ID"), status, &body));
        }

        let envelope: Envelope = response.json().await.map_err(|e| {
            Error::provider_call(self.name(), format!("Failed to parse response: {}", e))
        })?;

        if let Some(error) = envelope.response.error {
            return Err(Error::provider_call(
                self.name(),
                format!("{}: {}", error.code, error.message),
            ));
        }

        let choice = envelope
            .response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider_call(self.name(), "no choices in response"))?;

        Ok(BackendReply {
            text: choice
                .message
                .and_then(|m| m.content)
                .unwrap_or_default()
                .trim()
                .to_string(),
            finish_reason: choice.finish_reason,
        })
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_authorization_layout() {
        let header = sign_tc3("AKIDexample", "secret", "hunyuan.tencentcloudapi.com", "{}", fixed_time()).unwrap();
        assert!(header.starts_with(
            "TC3-HMAC-SHA256 Credential=AKIDexample/2024-03-01/hunyuan/tc3_request, SignedHeaders=content-type;host;x-tc-action, Signature="
        ));
        let signature = header.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_depends_on_payload_and_key() {
        let host = "hunyuan.tencentcloudapi.com";
        let a = sign_tc3("id", "secret", host, r#"{"Model":"a"}"#, fixed_time()).unwrap();
        let b = sign_tc3("id", "secret", host, r#"{"Model":"b"}"#, fixed_time()).unwrap();
        let c = sign_tc3("id", "other", host, r#"{"Model":"a"}"#, fixed_time()).unwrap();
        let again = sign_tc3("id", "secret", host, r#"{"Model":"a"}"#, fixed_time()).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, again);
    }

    #[test]
    fn test_response_envelope() {
        let body = r#"{"Response":{"Choices":[{"Message":{"Role":"assistant","Content":" hi "},"FinishReason":"stop"}],"RequestId":"r1"}}"#;
        let envelope: Envelope = serde_json::from_str(body).unwrap();
        let choice = envelope.response.choices.into_iter().next().unwrap();
        assert_eq!(choice.message.unwrap().content.as_deref(), Some(" hi "));
        assert_eq!(choice.finish_reason.as_deref(), Some("stop"));
    }
}
