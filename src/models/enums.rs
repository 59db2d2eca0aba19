use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// The stored string is also the JSON representation, so persisted values
/// and API payloads never drift apart.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(MedicationFrequency {
    OnceDaily => "1x sehari",
    TwiceDaily => "2x sehari",
    ThreeTimesDaily => "3x sehari",
    AsNeeded => "sesuai kebutuhan",
});

str_enum!(MedicationStatus {
    Active => "aktif",
    Completed => "selesai",
    Cancelled => "dibatalkan",
});

str_enum!(NotificationStatus {
    Pending => "pending",
    Sent => "sent",
    Read => "read",
    Dismissed => "dismissed",
});

str_enum!(NotificationType {
    Reminder => "reminder",
    Warning => "warning",
    Info => "info",
});

str_enum!(AdherenceOutcome {
    Pending => "pending",
    Taken => "taken",
    Missed => "missed",
    Skipped => "skipped",
});

str_enum!(FamilyRelation {
    Parent => "parent",
    Spouse => "spouse",
    Child => "child",
    Sibling => "sibling",
    Caregiver => "caregiver",
    Other => "other",
});

/// Which family notification toggle a recipient lookup honours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientToggle {
    DoseAlerts,
    WeeklySummary,
}
