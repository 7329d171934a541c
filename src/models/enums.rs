use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
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

// Stored review outcome on a doctor profile. Absence (NULL) is meaningful
// and is modelled as `Option<VerificationStatus>`.
str_enum!(VerificationStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

str_enum!(PatientSource {
    SelfRegistered => "self_registered",
    DoctorEntered => "doctor_entered",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn verification_status_round_trips_through_str() {
        for status in [
            VerificationStatus::Pending,
            VerificationStatus::Approved,
            VerificationStatus::Rejected,
        ] {
            assert_eq!(VerificationStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_invalid_enum() {
        let err = VerificationStatus::from_str("suspended").unwrap_err();
        match err {
            DatabaseError::InvalidEnum { field, value } => {
                assert_eq!(field, "VerificationStatus");
                assert_eq!(value, "suspended");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn serializes_as_lowercase_wire_value() {
        let json = serde_json::to_string(&VerificationStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
        let source: PatientSource = serde_json::from_str("\"self_registered\"").unwrap();
        assert_eq!(source, PatientSource::SelfRegistered);
    }
}
