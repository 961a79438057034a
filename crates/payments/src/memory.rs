//! In-memory payment gateway for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use domain::Money;

use crate::gateway::{Authorization, NotificationKind, PaymentGateway, PaymentNotification, RefundReceipt};
use crate::signature::WebhookVerifier;
use crate::{GatewayError, Result};

const TEST_WEBHOOK_SECRET: &str = "whsec_test";

#[derive(Debug, Default)]
struct GatewayState {
    authorizations: HashMap<String, Money>,
    refunds: Vec<String>,
    next_id: u32,
    fail_on_authorize: bool,
    fail_on_refund: bool,
}

/// In-memory gateway with deterministic references and failure injection.
#[derive(Clone)]
pub struct InMemoryGateway {
    state: Arc<RwLock<GatewayState>>,
    verifier: WebhookVerifier,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(GatewayState::default())),
            verifier: WebhookVerifier::new(TEST_WEBHOOK_SECRET),
        }
    }
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next authorization call fail as if the processor were down.
    pub fn set_fail_on_authorize(&self, fail: bool) {
        self.state.write().unwrap().fail_on_authorize = fail;
    }

    /// Makes the next refund call fail.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Returns the number of authorizations granted so far.
    pub fn authorization_count(&self) -> usize {
        self.state.read().unwrap().authorizations.len()
    }

    /// Returns the amount authorized under `reference`, if any.
    pub fn authorized_amount(&self, reference: &str) -> Option<Money> {
        self.state.read().unwrap().authorizations.get(reference).copied()
    }

    /// Returns the references refunded so far.
    pub fn refunded_references(&self) -> Vec<String> {
        self.state.read().unwrap().refunds.clone()
    }

    /// Fabricates a signed notification delivery for `reference`, as the
    /// processor would send it. Returns the raw body and signature header.
    pub fn notification(&self, event_type: &str, reference: &str) -> (Vec<u8>, String) {
        let body = serde_json::to_vec(&serde_json::json!({
            "type": event_type,
            "data": { "object": { "id": reference } }
        }))
        .expect("static notification shape serializes");
        let header = self.verifier.sign(&body, Utc::now().timestamp());
        (body, header)
    }

    /// Fabricates a notification carrying an invalid signature.
    pub fn forged_notification(&self, event_type: &str, reference: &str) -> (Vec<u8>, String) {
        let (body, _) = self.notification(event_type, reference);
        let header = WebhookVerifier::new("whsec_forged").sign(&body, Utc::now().timestamp());
        (body, header)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_authorization(&self, amount: Money, _currency: &str) -> Result<Authorization> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_authorize {
            return Err(GatewayError::Unreachable(
                "injected authorization failure".to_string(),
            ));
        }

        state.next_id += 1;
        let reference = format!("pi_{:04}", state.next_id);
        let client_secret = format!("{reference}_secret_test");
        state.authorizations.insert(reference.clone(), amount);

        Ok(Authorization {
            reference,
            client_secret,
        })
    }

    async fn refund(&self, reference: &str) -> Result<RefundReceipt> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(GatewayError::Unreachable(
                "injected refund failure".to_string(),
            ));
        }

        if !state.authorizations.contains_key(reference) {
            return Err(GatewayError::Rejected(format!(
                "no such payment intent: {reference}"
            )));
        }

        state.refunds.push(reference.to_string());
        Ok(RefundReceipt {
            refund_reference: format!("re_{:04}", state.refunds.len()),
        })
    }

    fn verify_notification(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> Result<PaymentNotification> {
        self.verifier.verify(raw_body, signature_header)?;

        let event: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| GatewayError::Protocol(format!("unparseable event body: {e}")))?;

        let event_type = event["type"]
            .as_str()
            .ok_or_else(|| GatewayError::Protocol("event missing type".to_string()))?;
        let reference = event["data"]["object"]["id"]
            .as_str()
            .ok_or_else(|| GatewayError::Protocol("event missing object id".to_string()))?;

        Ok(PaymentNotification {
            kind: NotificationKind::from_event_type(event_type),
            payment_reference: reference.to_string(),
        })
    }
}
