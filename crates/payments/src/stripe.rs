//! Stripe-backed gateway client.

use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use serde::Deserialize;

use crate::gateway::{Authorization, NotificationKind, PaymentGateway, PaymentNotification, RefundReceipt};
use crate::signature::WebhookVerifier;
use crate::{GatewayError, Result};

/// Immutable Stripe client configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// API secret key (`sk_...`).
    pub secret_key: String,
    /// Webhook signing secret (`whsec_...`).
    pub webhook_secret: String,
    /// API base URL. Overridable for tests.
    pub base_url: String,
    /// Bound on every outbound call. A timeout leaves the order `pending`
    /// with no reference, which is recoverable, not fatal.
    pub timeout: Duration,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            base_url: "https://api.stripe.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

#[derive(Deserialize)]
struct EventBody {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Deserialize)]
struct EventObject {
    id: String,
}

/// Gateway client for the Stripe payment-intents API.
#[derive(Clone)]
pub struct StripeGateway {
    http: reqwest::Client,
    config: StripeConfig,
    verifier: WebhookVerifier,
}

impl StripeGateway {
    /// Builds a client from immutable configuration.
    pub fn new(config: StripeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;
        let verifier = WebhookVerifier::new(config.webhook_secret.clone());
        Ok(Self {
            http,
            config,
            verifier,
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{path}", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(GatewayError::Rejected(message));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self), fields(amount = %amount))]
    async fn create_authorization(&self, amount: Money, currency: &str) -> Result<Authorization> {
        let form = [
            ("amount", amount.cents().to_string()),
            ("currency", currency.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        let intent: PaymentIntentResponse = self.post_form("/v1/payment_intents", &form).await?;

        let client_secret = intent.client_secret.ok_or_else(|| {
            GatewayError::Protocol("payment intent without client_secret".to_string())
        })?;

        tracing::debug!(reference = %intent.id, "payment authorization created");
        Ok(Authorization {
            reference: intent.id,
            client_secret,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn refund(&self, reference: &str) -> Result<RefundReceipt> {
        let form = [("payment_intent", reference.to_string())];
        let refund: RefundResponse = self.post_form("/v1/refunds", &form).await?;

        tracing::debug!(refund_reference = %refund.id, "refund created");
        Ok(RefundReceipt {
            refund_reference: refund.id,
        })
    }

    fn verify_notification(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<PaymentNotification> {
        self.verifier.verify(raw_body, signature_header)?;

        let event: EventBody = serde_json::from_slice(raw_body)
            .map_err(|e| GatewayError::Protocol(format!("unparseable event body: {e}")))?;

        Ok(PaymentNotification {
            kind: NotificationKind::from_event_type(&event.event_type),
            payment_reference: event.data.object.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn gateway() -> StripeGateway {
        StripeGateway::new(StripeConfig::new("sk_test", "whsec_test")).unwrap()
    }

    fn event_json(event_type: &str, reference: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": event_type,
            "data": { "object": { "id": reference } }
        }))
        .unwrap()
    }

    #[test]
    fn verifies_and_parses_a_succeeded_event() {
        let gw = gateway();
        let body = event_json("payment_intent.succeeded", "pi_123");
        let header = WebhookVerifier::new("whsec_test").sign(&body, Utc::now().timestamp());

        let parsed = gw.verify_notification(&body, &header).unwrap();
        assert_eq!(parsed.kind, NotificationKind::AuthorizationSucceeded);
        assert_eq!(parsed.payment_reference, "pi_123");
    }

    #[test]
    fn maps_unknown_event_types_to_unrecognized() {
        let gw = gateway();
        let body = event_json("charge.updated", "pi_123");
        let header = WebhookVerifier::new("whsec_test").sign(&body, Utc::now().timestamp());

        let parsed = gw.verify_notification(&body, &header).unwrap();
        assert_eq!(
            parsed.kind,
            NotificationKind::Unrecognized("charge.updated".to_string())
        );
    }

    #[test]
    fn rejects_a_bad_signature_before_parsing() {
        let gw = gateway();
        let body = event_json("payment_intent.succeeded", "pi_123");
        let header = WebhookVerifier::new("whsec_wrong").sign(&body, Utc::now().timestamp());

        let err = gw.verify_notification(&body, &header).unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated(_)));
    }

    #[test]
    fn rejects_a_verified_but_malformed_body() {
        let gw = gateway();
        let body = b"not json";
        let header = WebhookVerifier::new("whsec_test").sign(body, Utc::now().timestamp());

        let err = gw.verify_notification(body, &header).unwrap_err();
        assert!(matches!(err, GatewayError::Protocol(_)));
    }
}
