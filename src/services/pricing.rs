use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::errors::ServiceError;

/// The single promotional code currently honored at checkout.
const SAVE10_CODE: &str = "SAVE10";
const SAVE10_RATE: Decimal = dec!(0.10);

/// Price breakdown for a cart. All amounts are rounded to cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    pub subtotal: Decimal,
    pub discount_rate: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Evaluates discount codes and computes checkout totals.
///
/// Tax is assessed on the pre-discount subtotal, so applying a code
/// lowers the total by exactly `subtotal * rate` and never shrinks the
/// tax line.
#[derive(Debug, Clone)]
pub struct PricingService {
    tax_rate: Decimal,
}

impl PricingService {
    pub fn new(tax_rate: f64) -> Result<Self, ServiceError> {
        let tax_rate = Decimal::from_f64(tax_rate)
            .filter(|r| *r >= Decimal::ZERO && *r <= Decimal::ONE)
            .ok_or_else(|| {
                ServiceError::InternalError(format!("invalid tax rate: {}", tax_rate))
            })?;
        Ok(Self { tax_rate })
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// Returns the discount rate for a recognized code. Matching is
    /// exact, including case.
    pub fn discount_rate(code: &str) -> Option<Decimal> {
        if code == SAVE10_CODE {
            Some(SAVE10_RATE)
        } else {
            None
        }
    }

    /// Validates a discount code, yielding its rate.
    pub fn validate_code(code: &str) -> Result<Decimal, ServiceError> {
        Self::discount_rate(code)
            .ok_or_else(|| ServiceError::ValidationError("Invalid discount code".to_string()))
    }

    /// Computes the full price breakdown for a subtotal and optional
    /// discount code.
    pub fn quote(&self, subtotal: Decimal, code: Option<&str>) -> Result<PriceQuote, ServiceError> {
        if subtotal < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Subtotal cannot be negative".to_string(),
            ));
        }

        let discount_rate = match code {
            Some(c) => Self::validate_code(c)?,
            None => Decimal::ZERO,
        };

        let subtotal = subtotal.round_dp(2);
        let discount_amount = (subtotal * discount_rate).round_dp(2);
        let tax_amount = (subtotal * self.tax_rate).round_dp(2);
        let total = subtotal - discount_amount + tax_amount;

        Ok(PriceQuote {
            subtotal,
            discount_rate,
            discount_amount,
            tax_amount,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PricingService {
        PricingService::new(0.05).expect("valid tax rate")
    }

    #[test]
    fn quote_without_code() {
        let q = service().quote(dec!(100.00), None).expect("quote");
        assert_eq!(q.subtotal, dec!(100.00));
        assert_eq!(q.discount_amount, dec!(0.00));
        assert_eq!(q.tax_amount, dec!(5.00));
        assert_eq!(q.total, dec!(105.00));
    }

    #[test]
    fn save10_discounts_but_tax_stays_on_full_subtotal() {
        let q = service().quote(dec!(100.00), Some("SAVE10")).expect("quote");
        assert_eq!(q.discount_rate, dec!(0.10));
        assert_eq!(q.discount_amount, dec!(10.00));
        // Tax on the pre-discount subtotal, not on 90.00.
        assert_eq!(q.tax_amount, dec!(5.00));
        assert_eq!(q.total, dec!(95.00));
    }

    #[test]
    fn code_matching_is_exact() {
        assert!(PricingService::discount_rate("SAVE10").is_some());
        assert!(PricingService::discount_rate("save10").is_none());
        assert!(PricingService::discount_rate("SAVE10 ").is_none());
        assert!(PricingService::discount_rate("SAVE20").is_none());
    }

    #[test]
    fn invalid_code_is_a_validation_error() {
        let err = service()
            .quote(dec!(50.00), Some("NOTREAL"))
            .expect_err("must reject");
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn amounts_round_to_cents() {
        let q = service().quote(dec!(19.99), Some("SAVE10")).expect("quote");
        assert_eq!(q.discount_amount, dec!(2.00)); // 1.999 rounds up
        assert_eq!(q.tax_amount, dec!(1.00)); // 0.9995 rounds up
        assert_eq!(q.total, dec!(18.99));
    }

    #[test]
    fn zero_subtotal_quotes_zero() {
        let q = service().quote(Decimal::ZERO, Some("SAVE10")).expect("quote");
        assert_eq!(q.total, Decimal::ZERO);
    }

    #[test]
    fn negative_subtotal_rejected() {
        assert!(service().quote(dec!(-1.00), None).is_err());
    }

    #[test]
    fn tax_rate_must_be_a_sane_fraction() {
        assert!(PricingService::new(0.0).is_ok());
        assert!(PricingService::new(1.0).is_ok());
        assert!(PricingService::new(-0.1).is_err());
        assert!(PricingService::new(1.5).is_err());
        assert!(PricingService::new(f64::NAN).is_err());
    }
}
