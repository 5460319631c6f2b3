//! Sale-price computation.
//!
//! Pure and deterministic: the same inputs always produce the same quote.
//! The rounding contract matters at the cent level and is frozen by tests:
//! round half-up to 2 decimals, applied exactly twice — once to the USD
//! conversion, once to the final sale price — never to intermediate ratios.

use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::customer_margin;
use crate::errors::ServiceError;

pub const USD: &str = "USD";

/// Result of a price computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub cost_price_usd: Decimal,
    pub sale_price: Decimal,
}

pub(crate) fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes the USD cost and sale price for an order line.
///
/// When the source currency is already USD the cost is carried over exactly,
/// without rounding. A missing margin means zero margin.
pub fn compute_sale_price(
    cost_price: Decimal,
    currency: &str,
    usd_conversion_rate: Decimal,
    margin_percent: Option<Decimal>,
) -> Result<PriceQuote, ServiceError> {
    let margin = margin_percent.unwrap_or(Decimal::ZERO);
    if margin < Decimal::ZERO {
        return Err(ServiceError::InvalidMargin(margin));
    }

    let cost_price_usd = if currency == USD {
        cost_price
    } else {
        if usd_conversion_rate <= Decimal::ZERO {
            return Err(ServiceError::InvalidRate {
                rate: usd_conversion_rate,
                currency: currency.to_string(),
            });
        }
        round_money(cost_price * usd_conversion_rate)
    };

    let factor = Decimal::ONE + margin / Decimal::new(100, 0);
    let sale_price = round_money(cost_price_usd * factor);

    Ok(PriceQuote {
        cost_price_usd,
        sale_price,
    })
}

/// Looks up the default margin configured for a (customer, product) pair.
/// Used by the façade when the caller supplies no margin; no row still means
/// margin 0 downstream.
pub async fn default_margin<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    product_id: Uuid,
) -> Result<Option<Decimal>, ServiceError> {
    let row = customer_margin::Entity::find()
        .filter(customer_margin::Column::CustomerId.eq(customer_id))
        .filter(customer_margin::Column::ProductId.eq(product_id))
        .one(conn)
        .await?;
    Ok(row.map(|m| m.margin_percent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn usd_cost_with_no_margin_is_identity() {
        let quote = compute_sale_price(dec!(100), USD, dec!(1), None).unwrap();
        assert_eq!(quote.cost_price_usd, dec!(100));
        assert_eq!(quote.sale_price, dec!(100.00));
    }

    #[test]
    fn usd_cost_with_margin() {
        let quote = compute_sale_price(dec!(100), USD, dec!(1), Some(dec!(20))).unwrap();
        assert_eq!(quote.sale_price, dec!(120.00));
    }

    #[test]
    fn foreign_currency_converts_then_applies_margin() {
        let quote = compute_sale_price(dec!(100), "RMB", dec!(6.5), Some(dec!(20))).unwrap();
        assert_eq!(quote.cost_price_usd, dec!(650.00));
        assert_eq!(quote.sale_price, dec!(780.00));
    }

    #[test]
    fn rounds_half_up_at_the_cent() {
        // 0.67 * 1.5 = 1.005, half-up → 1.01
        let quote = compute_sale_price(dec!(0.67), USD, dec!(1), Some(dec!(50))).unwrap();
        assert_eq!(quote.sale_price, dec!(1.01));
    }

    #[test]
    fn conversion_rounds_before_margin_is_applied() {
        // 1.234 * 3 = 3.702 → 3.70 first, then margin on the rounded cost.
        let quote = compute_sale_price(dec!(1.234), "RMB", dec!(3), Some(dec!(10))).unwrap();
        assert_eq!(quote.cost_price_usd, dec!(3.70));
        assert_eq!(quote.sale_price, dec!(4.07));
    }

    #[test]
    fn negative_margin_is_rejected() {
        let err = compute_sale_price(dec!(100), USD, dec!(1), Some(dec!(-5))).unwrap_err();
        assert_matches!(err, ServiceError::InvalidMargin(_));
    }

    #[test]
    fn non_positive_rate_is_rejected_for_foreign_currency() {
        let err = compute_sale_price(dec!(100), "RMB", dec!(0), None).unwrap_err();
        assert_matches!(err, ServiceError::InvalidRate { .. });
        // USD never consults the rate
        assert!(compute_sale_price(dec!(100), USD, dec!(0), None).is_ok());
    }

    proptest! {
        #[test]
        fn deterministic(cost in 0i64..1_000_000, rate in 1i64..10_000, margin in 0i64..500) {
            let cost = Decimal::new(cost, 2);
            let rate = Decimal::new(rate, 3);
            let margin = Some(Decimal::new(margin, 1));
            let a = compute_sale_price(cost, "RMB", rate, margin).unwrap();
            let b = compute_sale_price(cost, "RMB", rate, margin).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn usd_cost_passes_through(cost in 0i64..1_000_000) {
            let cost = Decimal::new(cost, 2);
            let quote = compute_sale_price(cost, USD, Decimal::ZERO, None).unwrap();
            prop_assert_eq!(quote.cost_price_usd, cost);
        }
    }
}
