use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Quantity value - uses Decimal for precision
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Account identifier as it appears on the wire
pub type AccountId = String;

/// Caller-supplied (or generated) order reference
pub type OrderRef = String;

/// Fixed-shape feature vector handed to anomaly models
pub type FeatureVector = [f64; 7];
