//! CRM lead sink over HTTP

use reqwest::Url;
use std::time::Duration;

use crate::domain::entities::CrmLead;
use crate::domain::ports::{CrmError, CrmSink};
use crate::error::{QuizError, QuizResult};

pub const DEFAULT_CRM_BASE_URL: &str = "https://wdg.biz-crm.ru/inserv/in.php";

/// Longest CRM error body kept in logs and on the outbox row
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct CrmConfig {
    pub base_url: String,
    /// Appended as the `token` query parameter
    pub token: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CRM_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Endpoint with the token query parameter, unless the base URL already has one
pub fn crm_endpoint(base_url: &str, token: &str) -> QuizResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| QuizError::Configuration(format!("invalid CRM URL {base_url:?}: {e}")))?;
    if !url.query_pairs().any(|(key, _)| key == "token") {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct HttpCrmClient {
    client: reqwest::Client,
    /// None when no token is configured
    endpoint: Option<Url>,
}

impl HttpCrmClient {
    pub fn new(config: CrmConfig) -> QuizResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QuizError::Configuration(format!("CRM client: {e}")))?;

        let endpoint = match config.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Some(crm_endpoint(&config.base_url, token)?),
            _ => {
                tracing::warn!("CRM token not configured; leads will stay in the outbox");
                None
            }
        };

        Ok(Self { client, endpoint })
    }
}

impl CrmSink for HttpCrmClient {
    async fn send_lead(&self, lead: &CrmLead) -> Result<(), CrmError> {
        let endpoint = self.endpoint.clone().ok_or(CrmError::NotConfigured)?;

        let response = self
            .client
            .post(endpoint)
            .json(lead)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrmError::Timeout
                } else {
                    CrmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        tracing::warn!(status = status.as_u16(), body = %body, "CRM rejected lead");

        Err(CrmError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
