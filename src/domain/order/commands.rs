use serde::Deserialize;
use uuid::Uuid;

use super::errors::{OrderError, OrderResult};
use super::value_objects::{DeliveryAddress, OrderStatus};

// ============================================================================
// Order Commands - Validated user intent
// ============================================================================
//
// Requests arrive loosely typed from the presentation layer. Each one is
// turned into a command struct by `validate`, and only commands reach the
// lifecycle manager.
//
// ============================================================================

const MAX_FIELD_LEN: usize = 200;

/// Raw delivery address as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryAddressInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub post_id: String,
    pub delivery_address: DeliveryAddressInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    pub post_id: Uuid,
    pub delivery_address: DeliveryAddress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusRequest {
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeStatus {
    pub order_id: Uuid,
    pub target: OrderStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmPayment {
    pub payment_intent_ref: String,
}

/// Business policy applied to delivery addresses.
#[derive(Debug, Clone)]
pub struct AddressPolicy {
    allowed_country: String,
}

impl AddressPolicy {
    pub fn new(allowed_country: impl Into<String>) -> Self {
        Self {
            allowed_country: allowed_country.into().trim().to_string(),
        }
    }

    pub fn validate(&self, input: &DeliveryAddressInput) -> OrderResult<DeliveryAddress> {
        let full_name = required("full_name", &input.full_name)?;
        let email = required("email", &input.email)?;
        let phone = required("phone", &input.phone)?;
        let address = required("address", &input.address)?;
        let city = required("city", &input.city)?;
        let state = required("state", &input.state)?;
        let zip = required("zip", &input.zip)?;
        let country = required("country", &input.country)?;

        validate_email(&email)?;
        validate_phone(&phone)?;

        if !country.eq_ignore_ascii_case(&self.allowed_country) {
            return Err(OrderError::InvalidInput(format!(
                "delivery is only available in {}, got '{}'",
                self.allowed_country, country
            )));
        }

        Ok(DeliveryAddress {
            full_name,
            email: email.to_ascii_lowercase(),
            phone,
            address,
            city,
            state,
            zip,
            country: self.allowed_country.clone(),
        })
    }
}

impl PlaceOrderRequest {
    pub fn validate(&self, policy: &AddressPolicy) -> OrderResult<PlaceOrder> {
        Ok(PlaceOrder {
            post_id: parse_id("post_id", &self.post_id)?,
            delivery_address: policy.validate(&self.delivery_address)?,
        })
    }
}

impl ChangeStatusRequest {
    pub fn validate(&self) -> OrderResult<ChangeStatus> {
        Ok(ChangeStatus {
            order_id: parse_id("order_id", &self.order_id)?,
            target: self.status.parse()?,
        })
    }
}

impl ConfirmPaymentRequest {
    pub fn validate(&self) -> OrderResult<ConfirmPayment> {
        let payment_intent_ref = self.payment_intent_id.trim();
        if payment_intent_ref.is_empty() {
            return Err(OrderError::InvalidInput("payment_intent_id is required".to_string()));
        }
        if payment_intent_ref.len() > MAX_FIELD_LEN || payment_intent_ref.chars().any(char::is_whitespace) {
            return Err(OrderError::InvalidInput("payment_intent_id is malformed".to_string()));
        }
        Ok(ConfirmPayment {
            payment_intent_ref: payment_intent_ref.to_string(),
        })
    }
}

pub fn parse_id(field: &str, raw: &str) -> OrderResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| OrderError::InvalidInput(format!("{} is not a valid id", field)))
}

fn required(field: &str, value: &Option<String>) -> OrderResult<String> {
    let value = value.as_deref().map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(OrderError::InvalidInput(format!("{} is required", field)));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(OrderError::InvalidInput(format!("{} is too long", field)));
    }
    Ok(value.to_string())
}

fn validate_email(email: &str) -> OrderResult<()> {
    let invalid = || OrderError::InvalidInput(format!("invalid email address '{}'", email));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

fn validate_phone(phone: &str) -> OrderResult<()> {
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')');
    let digits = phone.chars().filter(char::is_ascii_digit).count();

    if !phone.chars().all(allowed) || !(7..=15).contains(&digits) {
        return Err(OrderError::InvalidInput(format!("invalid phone number '{}'", phone)));
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
