use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Outcome of a mobile-money request-to-pay.
#[derive(Debug, Clone)]
pub struct RequestToPay {
    pub reference_id: String,
    pub status: String,
}

/// Outcome of a card checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// Thin client for the external payment provider.
///
/// Without provider credentials it runs in sandbox mode and returns canned
/// success responses, matching the provider's own developer sandbox. Live
/// calls are bounded by a timeout so a hung provider can't block the
/// initiating request indefinitely.
pub struct PaymentGateway {
    http: reqwest::Client,
    base_url: Option<String>,
    subscription_key: Option<String>,
    frontend_url: String,
    timeout: Duration,
}

impl PaymentGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.momo_base_url.clone(),
            subscription_key: config.momo_subscription_key.clone(),
            frontend_url: config.frontend_url.clone(),
            timeout: Duration::from_secs(config.gateway_timeout_seconds),
        }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.base_url, &self.subscription_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }

    pub async fn request_to_pay(
        &self,
        amount: i64,
        phone: &str,
        external_id: &Uuid,
    ) -> Result<RequestToPay> {
        let Some((base_url, key)) = self.credentials() else {
            tracing::info!(
                "[sandbox] momo request-to-pay: {} RWF from {} (external_id {})",
                amount,
                phone,
                external_id
            );
            return Ok(RequestToPay {
                reference_id: format!("momo_dev_{}", external_id),
                status: "SUCCESS".to_string(),
            });
        };

        let request = self
            .http
            .post(format!("{}/collection/v1_0/requesttopay", base_url))
            .header("Ocp-Apim-Subscription-Key", key)
            .header("X-Reference-Id", external_id.to_string())
            .json(&json!({
                "amount": amount.to_string(),
                "currency": "RWF",
                "externalId": external_id.to_string(),
                "payer": { "partyIdType": "MSISDN", "partyId": phone },
                "payerMessage": "Back a job-creating project",
                "payeeNote": "Thank you for backing youth jobs",
            }))
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| AppError::Gateway("Provider request timed out".to_string()))?
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "Provider rejected request-to-pay: HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid provider response: {}", e)))?;

        Ok(RequestToPay {
            reference_id: body
                .get("financialTransactionId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            status: body
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("PENDING")
                .to_string(),
        })
    }

    pub async fn create_checkout_session(
        &self,
        project_id: i32,
        amount: i64,
        project_title: &str,
        external_id: &Uuid,
    ) -> Result<CheckoutSession> {
        let Some((base_url, key)) = self.credentials() else {
            tracing::info!(
                "[sandbox] card checkout: {} RWF for project {} ({})",
                amount,
                project_id,
                project_title
            );
            return Ok(CheckoutSession {
                session_id: format!("card_dev_{}", external_id),
                url: format!(
                    "{}/payment-success?project={}&amount={}",
                    self.frontend_url, project_id, amount
                ),
            });
        };

        let request = self
            .http
            .post(format!("{}/checkout/sessions", base_url))
            .header("Ocp-Apim-Subscription-Key", key)
            .json(&json!({
                "amount": amount,
                "currency": "RWF",
                "externalId": external_id.to_string(),
                "description": project_title,
                "successUrl": format!("{}/payment-success?project={}", self.frontend_url, project_id),
            }))
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| AppError::Gateway("Provider request timed out".to_string()))?
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "Provider rejected checkout session: HTTP {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid provider response: {}", e)))?;

        let url = body
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Gateway("Checkout session missing url".to_string()))?
            .to_string();

        Ok(CheckoutSession {
            session_id: body
                .get("sessionId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_gateway() -> PaymentGateway {
        PaymentGateway {
            http: reqwest::Client::new(),
            base_url: None,
            subscription_key: None,
            frontend_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn sandbox_request_to_pay_succeeds() {
        let gateway = sandbox_gateway();
        let external_id = Uuid::new_v4();

        let outcome = gateway
            .request_to_pay(20_000, "+250788123456", &external_id)
            .await
            .unwrap();

        assert_eq!(outcome.status, "SUCCESS");
        assert!(outcome.reference_id.contains(&external_id.to_string()));
    }

    #[tokio::test]
    async fn sandbox_checkout_points_at_frontend() {
        let gateway = sandbox_gateway();
        let external_id = Uuid::new_v4();

        let session = gateway
            .create_checkout_session(3, 50_000, "Eco Coffee", &external_id)
            .await
            .unwrap();

        assert!(session.url.starts_with("http://localhost:3000/payment-success"));
        assert!(session.url.contains("project=3"));
        assert!(session.session_id.contains(&external_id.to_string()));
    }
}
