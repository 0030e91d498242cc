//! Input Validation Module
//!
//! Rejects missing or malformed input before any batch state is read.

mod validator;
pub use validator::{
    ValidationError, validate_cancel, validate_join, validate_new_batch, validate_product_id,
    validate_update,
};
