//! Environment configuration (`.env` is loaded by `main` through dotenvy).

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::pricing::{PricingConfig, ShippingConfig};
use crate::domain::value_objects::Percentage;
use crate::error::{EcommerceError, Result};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub catalog_seed: Option<String>,
    pub pricing: PricingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> { Self::from_lookup(|key| std::env::var(key).ok()) }

    /// Builds the config from any key lookup; unset or blank keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let iva_rate = Percentage::new(parse_or(&get, "IVA_RATE", Decimal::from(15))?)
            .map_err(|e| EcommerceError::Config(format!("IVA_RATE: {}", e)))?;
        let shipping = ShippingConfig {
            free_shipping_enabled: parse_bool(&get, "FREE_SHIPPING_ENABLED", true)?,
            free_shipping_threshold: non_negative("FREE_SHIPPING_THRESHOLD", parse_or(&get, "FREE_SHIPPING_THRESHOLD", Decimal::new(5000, 2))?)?,
            flat_rate: non_negative("SHIPPING_FLAT_RATE", parse_or(&get, "SHIPPING_FLAT_RATE", Decimal::new(500, 2))?)?,
        };
        let currency = get("CURRENCY").unwrap_or_else(|| "USD".to_string()).to_uppercase();

        Ok(Self {
            port: parse_or(&get, "PORT", 8083)?,
            database_url: get("DATABASE_URL"),
            max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: get("NATS_URL"),
            catalog_seed: get("CATALOG_SEED"),
            pricing: PricingConfig { iva_rate, shipping, currency },
        })
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where T::Err: std::fmt::Display {
    match get(key) {
        Some(raw) => raw.parse().map_err(|e| EcommerceError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match get(key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(EcommerceError::Config(format!("{}={:?}: expected a boolean", key, v))),
    }
}

fn non_negative(key: &str, v: Decimal) -> Result<Decimal> {
    if v < Decimal::ZERO { return Err(EcommerceError::Config(format!("{} must not be negative", key))); }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8083);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.pricing.iva_rate.value(), dec!(15));
        assert_eq!(cfg.pricing.shipping.free_shipping_threshold, dec!(50.00));
        assert_eq!(cfg.pricing.shipping.flat_rate, dec!(5.00));
        assert!(cfg.pricing.shipping.free_shipping_enabled);
        assert_eq!(cfg.pricing.currency, "USD");
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[("IVA_RATE", "12"), ("FREE_SHIPPING_ENABLED", "off"), ("SHIPPING_FLAT_RATE", "3.50"), ("PORT", "9000"), ("DATABASE_URL", " ")]).unwrap();
        assert_eq!(cfg.pricing.iva_rate.value(), dec!(12));
        assert!(!cfg.pricing.shipping.free_shipping_enabled);
        assert_eq!(cfg.pricing.shipping.flat_rate, dec!(3.50));
        assert_eq!(cfg.port, 9000);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("IVA_RATE", "150")]), Err(EcommerceError::Config(_))));
        assert!(matches!(config(&[("SHIPPING_FLAT_RATE", "-1")]), Err(EcommerceError::Config(_))));
        assert!(matches!(config(&[("FREE_SHIPPING_ENABLED", "maybe")]), Err(EcommerceError::Config(_))));
        assert!(matches!(config(&[("PORT", "http")]), Err(EcommerceError::Config(_))));
    }
}
