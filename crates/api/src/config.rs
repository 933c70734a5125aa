//! Application configuration loaded from environment variables.

use domain::Money;
use reconciliation::{LedgerSettings, PricingRules, ReconcileSettings};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`, `RUST_LOG`: bind address, listen port, tracing filter
/// - `DATABASE_URL`: PostgreSQL store when set, in-memory store otherwise
/// - `GATEWAY_BASE_URL`, `GATEWAY_SECRET_KEY`: HTTP payment gateway when both are set
/// - `WEBHOOK_SECRET_HASH`: expected `verif-hash` header on webhook deliveries
/// - `PAYMENT_REDIRECT_URL`: where the gateway sends the customer afterwards
/// - `LEDGER_ENABLED`, `LEDGER_MANUAL_GENERATION`, `WEBHOOKS_ENABLED`: runtime switches
/// - `MAIL_API_URL`, `MAIL_API_KEY`, `MAIL_FROM`: HTTP mailer when all are set
/// - `TAX_RATE_BPS`, `ORDER_SHIPPING`: checkout tax rate and flat order shipping fee
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub gateway: Option<GatewayConfig>,
    pub webhook_secret_hash: Option<String>,
    pub ledger_enabled: bool,
    pub ledger_manual_generation: bool,
    pub webhooks_enabled: bool,
    pub mail: Option<MailConfig>,
    pub pricing: PricingRules,
}

/// Credentials for the hosted payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    pub redirect_url: Option<String>,
}

/// Credentials for the transactional mail API.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str, default: bool| {
            non_empty(key)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(default)
        };

        let gateway = match (non_empty("GATEWAY_BASE_URL"), non_empty("GATEWAY_SECRET_KEY")) {
            (Some(base_url), Some(secret_key)) => Some(GatewayConfig {
                base_url,
                secret_key,
                redirect_url: non_empty("PAYMENT_REDIRECT_URL"),
            }),
            _ => None,
        };
        let mail = match (
            non_empty("MAIL_API_URL"),
            non_empty("MAIL_API_KEY"),
            non_empty("MAIL_FROM"),
        ) {
            (Some(api_url), Some(api_key), Some(from)) => Some(MailConfig {
                api_url,
                api_key,
                from,
            }),
            _ => None,
        };

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            gateway,
            webhook_secret_hash: non_empty("WEBHOOK_SECRET_HASH"),
            ledger_enabled: flag("LEDGER_ENABLED", defaults.ledger_enabled),
            ledger_manual_generation: flag(
                "LEDGER_MANUAL_GENERATION",
                defaults.ledger_manual_generation,
            ),
            webhooks_enabled: flag("WEBHOOKS_ENABLED", defaults.webhooks_enabled),
            mail,
            pricing: PricingRules {
                tax_rate_bps: non_empty("TAX_RATE_BPS")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(defaults.pricing.tax_rate_bps),
                order_shipping: non_empty("ORDER_SHIPPING")
                    .and_then(|v| Money::parse_decimal(&v))
                    .filter(|m| !m.is_negative())
                    .unwrap_or(defaults.pricing.order_shipping),
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Snapshot of the runtime switches handed to every reconciliation.
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            ledger: LedgerSettings {
                enabled: self.ledger_enabled,
                manual_generation: self.ledger_manual_generation,
            },
            webhooks_enabled: self.webhooks_enabled,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            gateway: None,
            webhook_secret_hash: None,
            ledger_enabled: true,
            ledger_manual_generation: false,
            webhooks_enabled: true,
            mail: None,
            pricing: PricingRules::default(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.ledger_enabled);
        assert!(!config.ledger_manual_generation);
        assert!(config.webhooks_enabled);
        assert!(config.gateway.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.reconcile_settings(), ReconcileSettings::default());
    }

    #[test]
    fn test_switches_are_read() {
        let config = config_from(&[
            ("LEDGER_ENABLED", "false"),
            ("LEDGER_MANUAL_GENERATION", "1"),
            ("WEBHOOKS_ENABLED", "off"),
            ("PORT", "not-a-port"),
        ]);
        let settings = config.reconcile_settings();
        assert!(!settings.ledger.enabled);
        assert!(settings.ledger.manual_generation);
        assert!(!settings.webhooks_enabled);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_unparseable_flag_keeps_default() {
        let config = config_from(&[("LEDGER_ENABLED", "maybe")]);
        assert!(config.ledger_enabled);
    }

    #[test]
    fn test_gateway_requires_url_and_key() {
        let config = config_from(&[("GATEWAY_BASE_URL", "https://pay.example.com")]);
        assert!(config.gateway.is_none());

        let config = config_from(&[
            ("GATEWAY_BASE_URL", "https://pay.example.com"),
            ("GATEWAY_SECRET_KEY", "sk_test"),
            ("PAYMENT_REDIRECT_URL", "https://shop.example.com/paid"),
        ]);
        let gateway = config.gateway.unwrap();
        assert_eq!(gateway.secret_key, "sk_test");
        assert_eq!(
            gateway.redirect_url.as_deref(),
            Some("https://shop.example.com/paid")
        );
    }

    #[test]
    fn test_pricing_rules_are_read() {
        let config = config_from(&[("TAX_RATE_BPS", "750"), ("ORDER_SHIPPING", "12.50")]);
        assert_eq!(config.pricing.tax_rate_bps, 750);
        assert_eq!(config.pricing.order_shipping, Money::from_cents(1250));

        let config = config_from(&[("TAX_RATE_BPS", "-3"), ("ORDER_SHIPPING", "-1")]);
        assert_eq!(config.pricing, PricingRules::default());
    }

    #[test]
    fn test_mail_requires_all_fields() {
        let config = config_from(&[("MAIL_API_URL", "https://mail"), ("MAIL_API_KEY", "k")]);
        assert!(config.mail.is_none());
    }
}
