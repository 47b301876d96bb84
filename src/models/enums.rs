use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Role {
    Patient => "patient",
    Neurologist => "neurologist",
    Supplier => "supplier",
    Admin => "admin",
});

str_enum!(AppointmentStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Rejected => "rejected",
    Completed => "completed",
});

/// Medicine-order status. Canonical variants cover the neurologist-gated
/// stages; once an order is forwarded, the bound supplier writes free-form
/// statuses, carried as `Custom`. The state machines enforce *who* may
/// write at that stage, not *which* string is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Uploaded,
    DoctorApproved,
    ForwardedToSupplier,
    Rejected,
    Processing,
    Shipped,
    Delivered,
    Custom(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Uploaded => "uploaded",
            Self::DoctorApproved => "doctor_approved",
            Self::ForwardedToSupplier => "forwarded_to_supplier",
            Self::Rejected => "rejected",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Custom(s) => s,
        }
    }

    /// Parse a status string; unknown strings become `Custom`.
    pub fn parse(s: &str) -> Self {
        match s {
            "uploaded" => Self::Uploaded,
            "doctor_approved" => Self::DoctorApproved,
            "forwarded_to_supplier" => Self::ForwardedToSupplier,
            "rejected" => Self::Rejected,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Statuses a neurologist review may still act on.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, Self::Uploaded | Self::DoctorApproved)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_roundtrip() {
        assert_eq!(Role::from_str("neurologist").unwrap(), Role::Neurologist);
        assert_eq!(Role::Supplier.as_str(), "supplier");
    }

    #[test]
    fn role_rejects_unknown() {
        assert!(Role::from_str("doctor").is_err());
    }

    #[test]
    fn appointment_status_roundtrip() {
        assert_eq!(
            AppointmentStatus::from_str("confirmed").unwrap(),
            AppointmentStatus::Confirmed
        );
        assert_eq!(AppointmentStatus::Pending.as_str(), "pending");
    }

    #[test]
    fn order_status_canonical_parse() {
        assert_eq!(OrderStatus::parse("uploaded"), OrderStatus::Uploaded);
        assert_eq!(
            OrderStatus::parse("forwarded_to_supplier"),
            OrderStatus::ForwardedToSupplier
        );
    }

    #[test]
    fn order_status_open_vocabulary() {
        let custom = OrderStatus::parse("out for delivery");
        assert_eq!(custom, OrderStatus::Custom("out for delivery".into()));
        assert_eq!(custom.as_str(), "out for delivery");
    }

    #[test]
    fn order_status_serializes_as_plain_string() {
        let json = serde_json::to_string(&OrderStatus::DoctorApproved).unwrap();
        assert_eq!(json, "\"doctor_approved\"");
        let back: OrderStatus = serde_json::from_str("\"shipped\"").unwrap();
        assert_eq!(back, OrderStatus::Shipped);
        let custom: OrderStatus = serde_json::from_str("\"handed to courier\"").unwrap();
        assert_eq!(custom, OrderStatus::Custom("handed to courier".into()));
    }

    #[test]
    fn reviewable_statuses() {
        assert!(OrderStatus::Uploaded.is_reviewable());
        assert!(OrderStatus::DoctorApproved.is_reviewable());
        assert!(!OrderStatus::ForwardedToSupplier.is_reviewable());
        assert!(!OrderStatus::Rejected.is_reviewable());
    }
}
