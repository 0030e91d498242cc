use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type BatchId = Uuid;
pub type MembershipId = Uuid;

/// Delivery tier of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    Fast,
    Standard,
    Economy,
    Ultimate,
}

impl BatchType {
    /// Parse a batch type, falling back to `Standard` for unknown names
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Self::Standard)
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Standard => write!(f, "standard"),
            Self::Economy => write!(f, "economy"),
            Self::Ultimate => write!(f, "ultimate"),
        }
    }
}

impl FromStr for BatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "standard" => Ok(Self::Standard),
            "economy" => Ok(Self::Economy),
            "ultimate" => Ok(Self::Ultimate),
            _ => Err(format!("Invalid batch type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverySpeed {
    Fast,
    Medium,
    Slow,
}

impl fmt::Display for DeliverySpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Medium => write!(f, "medium"),
            Self::Slow => write!(f, "slow"),
        }
    }
}

impl FromStr for DeliverySpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "medium" => Ok(Self::Medium),
            "slow" => Ok(Self::Slow),
            _ => Err(format!("Invalid delivery speed: {s}")),
        }
    }
}

/// Batch lifecycle state. Legal moves live in `lifecycle::transitions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Collecting buyers, below the activation threshold
    Forming,
    /// Threshold reached, waiting for an operator to process
    Ready,
    Processing,
    Shipped,
    /// Terminal
    Delivered,
}

impl BatchStatus {
    /// Whether new memberships may be created in this state
    pub fn accepts_joins(&self) -> bool {
        matches!(self, Self::Forming | Self::Ready)
    }

    /// Whether the batch counts as fulfilled for analytics
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forming => write!(f, "forming"),
            Self::Ready => write!(f, "ready"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
        }
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forming" => Ok(Self::Forming),
            "ready" => Ok(Self::Ready),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            _ => Err(format!("Invalid batch status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl MembershipStatus {
    /// Active memberships count towards `current_buyers`
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid membership status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Failed => write!(f, "failed"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("Invalid payment status: {s}")),
        }
    }
}

/// One pooled offer for one product at one price/delivery tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: BatchId,
    pub product_id: String,
    pub batch_type: BatchType,
    pub price: f64,
    pub discount: f64,
    /// Human readable, e.g. "3 days"
    pub delivery_time: String,
    pub delivery_speed: DeliverySpeed,
    /// Activation threshold, not an admission cap
    pub buyers_required: u32,
    /// Cached count of non-cancelled memberships
    pub current_buyers: u32,
    pub status: BatchStatus,
    pub estimated_ship_date: DateTime<Utc>,
    pub estimated_delivery_date: DateTime<Utc>,
    pub actual_ship_date: Option<DateTime<Utc>>,
    pub actual_delivery_date: Option<DateTime<Utc>>,
    /// Soft-delete flag, orthogonal to `status`
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single buyer's commitment to one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub id: MembershipId,
    pub batch_id: BatchId,
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
    /// `batch.price * quantity`, fixed at join time
    pub total_price: f64,
    pub status: MembershipStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: String,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-product, per-tier formation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationRule {
    pub id: Uuid,
    pub product_id: String,
    pub batch_type: BatchType,
    pub min_buyers: u32,
    pub max_buyers: u32,
    pub price_multiplier: f64,
    pub delivery_time_days: u32,
    pub priority: i32,
    pub is_active: bool,
}

/// A membership paired with a snapshot of its batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipWithBatch {
    pub membership: Membership,
    pub batch: Batch,
}

/// Operator patch for a batch. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchUpdate {
    pub price: Option<f64>,
    pub discount: Option<f64>,
    pub buyers_required: Option<u32>,
    pub estimated_ship_date: Option<DateTime<Utc>>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
}

/// Aggregate metrics over every batch of a product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalytics {
    pub total_batches: usize,
    pub active_batches: usize,
    pub total_orders: usize,
    pub average_batch_size: f64,
    pub completion_rate: f64,
    /// Mean days from creation to actual ship date over completed batches
    pub average_delivery_time: f64,
    /// Committed exposure: sums non-cancelled memberships of every batch,
    /// including batches that are still forming. Not realized revenue.
    pub revenue_generated: f64,
}
