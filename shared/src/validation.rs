//! Validation utilities for AgriStock inputs

use rust_decimal::Decimal;

// ============================================================================
// Stock & Money Validations
// ============================================================================

/// Validate a stock quantity moved by a ledger entry or order line
pub fn validate_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be a positive whole number");
    }
    Ok(())
}

/// Validate a currency amount or rate that may be zero but never negative
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Validate a re-order level
pub fn validate_re_order_level(level: i64) -> Result<(), &'static str> {
    if level < 0 {
        return Err("Re-order level cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Catalogue Validations
// ============================================================================

/// Validate a product name (non-blank, at most 120 characters)
pub fn validate_product_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Product name is required");
    }
    if trimmed.chars().count() > 120 {
        return Err("Product name must be at most 120 characters");
    }
    Ok(())
}

/// Validate a stock keeping unit code
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.trim().is_empty() {
        return Err("Stock keeping unit is required");
    }
    if sku.len() > 40 {
        return Err("Stock keeping unit must be at most 40 characters");
    }
    Ok(())
}

// ============================================================================
// Account Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && email.len() >= 5 => {
            Ok(())
        }
        _ => Err("Invalid email format"),
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Validate a telephone number
/// Accepts: 0244123456, 024-412-3456, +233244123456
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
    {
        return Err("Phone number contains invalid characters");
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(9..=15).contains(&digits) {
        return Err("Phone number must have between 9 and 15 digits");
    }
    Ok(())
}
