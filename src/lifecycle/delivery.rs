use crate::{BatchType, DeliverySpeed};

/// Days between estimated ship date and estimated delivery date
pub const DELIVERY_GRACE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTier {
    pub days: u32,
    pub speed: DeliverySpeed,
}

impl DeliveryTier {
    /// Display form stored on the batch, e.g. "3 days"
    pub fn label(&self) -> String {
        format!("{} days", self.days)
    }
}

impl BatchType {
    pub fn delivery_tier(&self) -> DeliveryTier {
        match self {
            BatchType::Fast => DeliveryTier { days: 3, speed: DeliverySpeed::Fast },
            BatchType::Standard => DeliveryTier { days: 7, speed: DeliverySpeed::Medium },
            BatchType::Economy => DeliveryTier { days: 14, speed: DeliverySpeed::Slow },
            BatchType::Ultimate => DeliveryTier { days: 21, speed: DeliverySpeed::Slow },
        }
    }
}
