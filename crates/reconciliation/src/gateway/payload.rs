use domain::{Currency, Money};
use serde::Deserialize;
use serde_json::Value;

use super::{Verification, VerificationStatus};

/// Transaction fields as the gateway sends them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTransaction {
    pub status: String,

    #[serde(default)]
    pub amount: Option<Value>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default, alias = "payment_type")]
    pub channel: Option<String>,

    /// Gateway-side transaction id; numeric or string depending on the gateway.
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(default, alias = "txRef")]
    pub tx_ref: Option<String>,

    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    /// `{"status": "success", "message": "...", "data": {...}}`
    Wrapped {
        status: String,
        #[serde(default)]
        message: Option<String>,
        data: Value,
    },

    /// The transaction object at the top level.
    Flat(RawTransaction),
}

/// A verification response body, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayPayload {
    Transaction(RawTransaction),

    /// Anything that does not carry a readable transaction.
    Malformed(String),
}

impl GatewayPayload {
    /// Classifies a response body.
    pub fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice::<Envelope>(body) {
            Ok(Envelope::Flat(tx)) => GatewayPayload::Transaction(tx),
            Ok(Envelope::Wrapped {
                status,
                message,
                data,
            }) => {
                if !data.is_object() {
                    return GatewayPayload::Malformed(format!(
                        "envelope status {status} without transaction data: {}",
                        message.unwrap_or_default()
                    ));
                }
                match serde_json::from_value::<RawTransaction>(data) {
                    Ok(tx) => GatewayPayload::Transaction(tx),
                    Err(e) => GatewayPayload::Malformed(format!("unreadable transaction: {e}")),
                }
            }
            Err(e) => GatewayPayload::Malformed(format!("unreadable body: {e}")),
        }
    }

    /// Normalizes the payload into a verification result.
    ///
    /// Malformed payloads, unknown statuses and successes that lack an amount
    /// or currency all come out as pending.
    pub fn into_verification(self) -> Verification {
        let tx = match self {
            GatewayPayload::Transaction(tx) => tx,
            GatewayPayload::Malformed(reason) => {
                tracing::warn!(%reason, "malformed gateway payload treated as pending");
                return Verification::pending();
            }
        };

        let status = match tx.status.to_ascii_lowercase().as_str() {
            "success" | "successful" | "succeeded" | "completed" => VerificationStatus::Success,
            "failed" | "failure" | "declined" | "cancelled" | "canceled" | "abandoned" => {
                VerificationStatus::Failed
            }
            "pending" | "processing" | "initiated" | "ongoing" => VerificationStatus::Pending,
            other => {
                tracing::warn!(status = other, "unknown gateway status treated as pending");
                VerificationStatus::Pending
            }
        };

        let amount = tx.amount.as_ref().and_then(Money::from_json);
        let currency = tx.currency.as_deref().and_then(Currency::parse);
        if status == VerificationStatus::Success && (amount.is_none() || currency.is_none()) {
            tracing::warn!("successful gateway payload lacks amount or currency; treated as pending");
            return Verification::pending();
        }

        let external_transaction_id = match tx.id {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Verification {
            status,
            amount,
            currency,
            method: tx.channel,
            external_transaction_id,
            metadata: tx.meta,
        }
    }
}
