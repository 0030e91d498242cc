use crate::BatchUpdate;
use thiserror::Error;
use tracing::debug;

/// Malformed or missing caller input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("estimated delivery date precedes estimated ship date")]
    DeliveryBeforeShip,
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(())
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value <= 0.0 || value.is_infinite() {
        return Err(ValidationError::NotPositive { field, value });
    }
    Ok(())
}

pub fn validate_product_id(product_id: &str) -> Result<(), ValidationError> {
    require_non_empty("product_id", product_id)
}

pub fn validate_new_batch(
    product_id: &str,
    price: f64,
    buyers_required: u32,
) -> Result<(), ValidationError> {
    validate_product_id(product_id)?;
    require_positive("price", price)?;
    require_positive("buyers_required", f64::from(buyers_required))?;
    Ok(())
}

pub fn validate_join(
    user_id: &str,
    quantity: u32,
    shipping_address: &str,
) -> Result<(), ValidationError> {
    debug!("Validating join request for user {}", user_id);
    require_non_empty("user_id", user_id)?;
    require_positive("quantity", f64::from(quantity))?;
    require_non_empty("shipping_address", shipping_address)?;
    Ok(())
}

pub fn validate_cancel(user_id: &str) -> Result<(), ValidationError> {
    require_non_empty("user_id", user_id)
}

pub fn validate_update(update: &BatchUpdate) -> Result<(), ValidationError> {
    if let Some(price) = update.price {
        require_positive("price", price)?;
    }
    if let Some(discount) = update.discount {
        if discount < 0.0 || !discount.is_finite() {
            return Err(ValidationError::Negative {
                field: "discount",
                value: discount,
            });
        }
    }
    if let Some(required) = update.buyers_required {
        require_positive("buyers_required", f64::from(required))?;
    }
    if let (Some(ship), Some(delivery)) = (update.estimated_ship_date, update.estimated_delivery_date) {
        if delivery < ship {
            return Err(ValidationError::DeliveryBeforeShip);
        }
    }
    Ok(())
}
