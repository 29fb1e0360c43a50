//! Payment session registration with the hosted card gateway.

use crate::config::Config;
use crate::models::Order;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("payment gateway rejected the session ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    reference: Uuid,
    amount_cents: u64,
    currency: &'a str,
    description: String,
    customer_email: Option<&'a str>,
    success_url: String,
    cancel_url: String,
}

pub enum PaymentGateway {
    /// Registers sessions with a remote hosted-checkout API.
    Hosted {
        client: reqwest::Client,
        endpoint: String,
        public_base_url: String,
        currency: String,
    },
    /// No gateway configured: sessions are minted locally and settled through
    /// the webhook endpoint.
    Offline { public_base_url: String },
}

impl PaymentGateway {
    pub fn from_config(config: &Config) -> Self {
        match &config.payment_gateway_url {
            Some(endpoint) => {
                info!(endpoint, "using hosted payment gateway");
                PaymentGateway::Hosted {
                    client: reqwest::Client::new(),
                    endpoint: endpoint.clone(),
                    public_base_url: config.public_base_url.clone(),
                    currency: config.currency.clone(),
                }
            }
            None => {
                info!("no payment gateway configured, using offline sessions");
                PaymentGateway::Offline {
                    public_base_url: config.public_base_url.clone(),
                }
            }
        }
    }

    pub async fn create_session(&self, order: &Order) -> Result<PaymentSession, GatewayError> {
        match self {
            PaymentGateway::Hosted {
                client,
                endpoint,
                public_base_url,
                currency,
            } => {
                let confirmation = confirmation_url(public_base_url, order.id);
                let request = SessionRequest {
                    reference: order.id,
                    amount_cents: order.totals.total_cents,
                    currency,
                    description: format!("MESO order #{}", order.number),
                    customer_email: order.contact.email.as_deref(),
                    success_url: confirmation.clone(),
                    cancel_url: format!("{confirmation}?cancelled=1"),
                };
                let response = client.post(endpoint).json(&request).send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }
                let session: PaymentSession = response.json().await?;
                debug!(order_id = %order.id, session_id = %session.id, "payment session registered");
                Ok(session)
            }
            PaymentGateway::Offline { public_base_url } => Ok(PaymentSession {
                id: format!("offline_{}", Uuid::new_v4().simple()),
                redirect_url: confirmation_url(public_base_url, order.id),
            }),
        }
    }
}

pub fn confirmation_url(public_base_url: &str, order_id: Uuid) -> String {
    format!("{public_base_url}/orders/{order_id}")
}

/// Constant-time comparison for the webhook shared secret.
pub fn secret_matches(expected: &str, provided: &str) -> bool {
    let (expected, provided) = (expected.as_bytes(), provided.as_bytes());
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .iter()
        .zip(provided)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
