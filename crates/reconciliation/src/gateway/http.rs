use std::time::Duration;

use async_trait::async_trait;
use common::CorrelationRef;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{GatewayPayload, PaymentGateway, PaymentRequest, RawTransaction, Verification};
use crate::error::GatewayError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct InitiateBody<'a> {
    tx_ref: &'a str,
    amount: String,
    currency: &'a str,
    redirect_url: Option<&'a str>,
    customer: CustomerBody<'a>,
    meta: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct CustomerBody<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    #[serde(default)]
    data: Option<InitiateData>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitiateData {
    link: String,
}

/// Payment gateway client speaking the hosted-checkout REST API.
///
/// `POST {base}/payments` opens a checkout; `GET {base}/verify/{reference}`
/// verifies one. Both authenticate with the secret key as a bearer token.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    secret_key: String,
    redirect_url: Option<String>,
}

impl HttpPaymentGateway {
    /// Creates a client for the gateway at `base_url`.
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            redirect_url: None,
        }
    }

    /// Sets where the gateway sends the customer after checkout.
    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    /// Replaces the HTTP client (e.g. to change timeouts).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    async fn fetch_verification(&self, reference: &CorrelationRef) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        // Gateways answer 4xx with a JSON body for declined or unknown references
        if status.is_server_error() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(transaction_ref = %request.reference))]
    async fn initiate(&self, request: &PaymentRequest) -> Result<String, GatewayError> {
        let meta = match request.target {
            domain::PaymentTarget::Order(id) => serde_json::json!({ "order_id": id }),
            domain::PaymentTarget::Booking(id) => serde_json::json!({ "booking_id": id }),
        };
        let body = InitiateBody {
            tx_ref: request.reference.as_str(),
            amount: request.amount.to_decimal_string(),
            currency: request.currency.as_str(),
            redirect_url: self.redirect_url.as_deref(),
            customer: CustomerBody {
                email: &request.customer.email,
                name: &request.customer.name,
            },
            meta,
        };

        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let parsed: InitiateResponse = response
                    .json()
                    .await
                    .map_err(|e| GatewayError::Malformed(e.to_string()))?;
                parsed
                    .data
                    .map(|d| d.link)
                    .or(parsed.link)
                    .ok_or_else(|| GatewayError::Malformed("response has no checkout link".into()))
            }
            StatusCode::UNAUTHORIZED => Err(GatewayError::Rejected {
                status: 401,
                message: "invalid gateway secret key".to_string(),
            }),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    #[tracing::instrument(skip(self), fields(transaction_ref = %reference))]
    async fn verify(&self, reference: &CorrelationRef) -> Verification {
        let body = match self.fetch_verification(reference).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "gateway verification unavailable, reporting pending");
                return Verification::pending();
            }
        };

        let payload = GatewayPayload::parse(&body);
        if let GatewayPayload::Transaction(RawTransaction {
            tx_ref: Some(tx_ref),
            ..
        }) = &payload
        {
            if tx_ref != reference.as_str() {
                tracing::warn!(returned = %tx_ref, "gateway returned a different reference");
                return Verification::pending();
            }
        }
        payload.into_verification()
    }
}
