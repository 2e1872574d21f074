//! Environment configuration

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::value_objects::DEFAULT_CURRENCY;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub currency: String,
    pub shipping: ShippingPolicy,
}

/// Flat shipping fee, waived at or above the free-shipping threshold.
#[derive(Clone, Debug, PartialEq)]
pub struct ShippingPolicy {
    pub fee: Decimal,
    pub free_threshold: Option<Decimal>,
}

impl ShippingPolicy {
    pub fn fee_for(&self, subtotal: Decimal) -> Decimal {
        match self.free_threshold {
            Some(threshold) if subtotal >= threshold => Decimal::ZERO,
            _ => self.fee,
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self { fee: Decimal::new(30_000, 0), free_threshold: Some(Decimal::new(500_000, 0)) }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { port: 8083, database_url: None, nats_url: None, currency: DEFAULT_CURRENCY.to_string(), shipping: ShippingPolicy::default() }
    }
}

impl Config {
    /// Reads `PORT`, `DATABASE_URL`, `NATS_URL`, `DEFAULT_CURRENCY`,
    /// `SHIPPING_FEE` and `FREE_SHIPPING_THRESHOLD` (`0` disables it).
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let port = match std::env::var("PORT") {
            Ok(p) => p.parse()?,
            Err(_) => defaults.port,
        };
        let fee = decimal_var("SHIPPING_FEE")?.unwrap_or(defaults.shipping.fee);
        let free_threshold = match decimal_var("FREE_SHIPPING_THRESHOLD")? {
            Some(t) if t.is_zero() => None,
            Some(t) => Some(t),
            None => defaults.shipping.free_threshold,
        };
        Ok(Self {
            port,
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            nats_url: std::env::var("NATS_URL").ok().filter(|s| !s.is_empty()),
            currency: std::env::var("DEFAULT_CURRENCY").unwrap_or(defaults.currency),
            shipping: ShippingPolicy { fee, free_threshold },
        })
    }
}

fn decimal_var(name: &str) -> anyhow::Result<Option<Decimal>> {
    match std::env::var(name) {
        Ok(v) => Ok(Some(Decimal::from_str(v.trim()).map_err(|e| anyhow::anyhow!("{name}: {e}"))?)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_free_shipping_threshold() {
        let policy = ShippingPolicy::default();
        assert_eq!(policy.fee_for(Decimal::new(499_999, 0)), Decimal::new(30_000, 0));
        assert_eq!(policy.fee_for(Decimal::new(500_000, 0)), Decimal::ZERO);
        let always = ShippingPolicy { fee: Decimal::new(15_000, 0), free_threshold: None };
        assert_eq!(always.fee_for(Decimal::new(10_000_000, 0)), Decimal::new(15_000, 0));
    }
}
