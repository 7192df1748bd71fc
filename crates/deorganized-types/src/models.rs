use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a stored or submitted enum value is not one we know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a string-backed enum with `as_str`, `Display`, and `FromStr`.
/// The strings are what the database stores and what JSON carries.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $label, value: other.to_string() }),
                }
            }
        }
    };
}

string_enum!(
    /// Account role. Only creators may publish shows or ask to guest on one.
    Role, "role" {
        User => "user",
        Creator => "creator",
    }
);

string_enum!(
    /// Entity types a Like, Comment, or Notification can point at.
    TargetKind, "target type" {
        Show => "show",
        Post => "post",
        Event => "event",
        Comment => "comment",
    }
);

string_enum!(
    NotificationType, "notification type" {
        Follow => "follow",
        Like => "like",
        Comment => "comment",
        ShowCancelled => "show_cancelled",
        GuestRequest => "guest_request",
        GuestAccepted => "guest_accepted",
        GuestDeclined => "guest_declined",
    }
);

string_enum!(
    GuestRequestStatus, "guest request status" {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
    }
);

string_enum!(
    ShowStatus, "show status" {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
);

string_enum!(
    LinkPlatform, "link platform" {
        Youtube => "youtube",
        Twitter => "twitter",
        Twitch => "twitch",
        Rumble => "rumble",
        Kick => "kick",
        Other => "other",
    }
);

string_enum!(
    RecurrenceType, "recurrence type" {
        SpecificDay => "SPECIFIC_DAY",
        Daily => "DAILY",
        Weekdays => "WEEKDAYS",
        Weekends => "WEEKENDS",
    }
);

string_enum!(
    FeedbackCategory, "feedback category" {
        Bug => "bug",
        Feature => "feature",
        General => "general",
    }
);

string_enum!(
    EventStatus, "event status" {
        Upcoming => "upcoming",
        Ongoing => "ongoing",
        Past => "past",
    }
);

/// A `(type, id)` pair standing in for a foreign key to one of several tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    #[serde(rename = "target_type")]
    pub kind: TargetKind,
    #[serde(rename = "target_id")]
    pub id: Uuid,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_round_trip_through_from_str() {
        for kind in TargetKind::ALL {
            assert_eq!(kind.as_str().parse::<TargetKind>().unwrap(), *kind);
        }
        assert_eq!("WEEKENDS".parse::<RecurrenceType>().unwrap(), RecurrenceType::Weekends);
    }

    #[test]
    fn unknown_value_names_the_kind() {
        let err = "news".parse::<TargetKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown target type 'news'");
    }

    #[test]
    fn target_ref_uses_wire_field_names() {
        let id = Uuid::nil();
        let json = serde_json::to_value(TargetRef::new(TargetKind::Post, id)).unwrap();
        assert_eq!(json["target_type"], "post");
        assert_eq!(json["target_id"], id.to_string());
    }
}
