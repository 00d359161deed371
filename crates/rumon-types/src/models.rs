use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a stored or submitted string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} value '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a string-backed enum. The first literal is the canonical wire and
/// storage form; the rest are accepted on input only (the Portuguese spellings
/// older clients still send).
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $variant:ident => $wire:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire $(| $alias)* => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// -- Events --

wire_enum! {
    /// Approval state of an event.
    EventStatus {
        Pending => "pending" | "pendente",
        Approved => "approved" | "aprovado",
        Rejected => "rejected" | "rejeitado",
    }
}

wire_enum! {
    /// Open events are listed to everyone; closed ones only to accepted invitees.
    EventVisibility {
        Open => "open" | "aberto",
        Closed => "closed" | "fechado",
    }
}

wire_enum! {
    InviteStatus {
        Pending => "pending" | "pendente",
        Accepted => "accepted" | "aceito" | "confirmado",
        Declined => "declined" | "recusado",
    }
}

impl Default for EventVisibility {
    fn default() -> Self {
        Self::Open
    }
}

impl EventStatus {
    /// Only a pending event may move, and only to approved or rejected.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Pending, EventStatus::Approved) | (EventStatus::Pending, EventStatus::Rejected)
        )
    }
}

// -- Feed --

wire_enum! {
    PostType {
        Text => "text",
        Image => "image",
        Video => "video",
    }
}

wire_enum! {
    PostVisibility {
        All => "all",
        Republics => "republics",
        Users => "users",
    }
}

// -- Users --

wire_enum! {
    /// Standing of a resident inside their república.
    UserHierarchy {
        Calouro => "calouro",
        Morador => "morador",
        Decano => "decano",
        ExMorador => "ex-morador",
    }
}

wire_enum! {
    Faculdade {
        Ufop => "ufop" | "UFOP",
        Uemg => "uemg" | "UEMG",
    }
}

// -- Republics --

wire_enum! {
    RepublicTipo {
        Masculina => "masculina",
        Feminina => "feminina",
        Mista => "mista",
    }
}

wire_enum! {
    RepublicStatus {
        Ativa => "ativa",
        Inativa => "inativa",
        Reformando => "reformando",
        Suspended => "suspended",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portuguese_aliases_parse_to_canonical_variants() {
        assert_eq!("aprovado".parse::<EventStatus>(), Ok(EventStatus::Approved));
        assert_eq!("confirmado".parse::<InviteStatus>(), Ok(InviteStatus::Accepted));
        assert_eq!("fechado".parse::<EventVisibility>(), Ok(EventVisibility::Closed));
        assert_eq!(InviteStatus::Accepted.as_str(), "accepted");
    }

    #[test]
    fn serde_accepts_aliases_and_writes_canonical() {
        let status: EventStatus = serde_json::from_str("\"rejeitado\"").unwrap();
        assert_eq!(status, EventStatus::Rejected);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"rejected\"");

        let faculdade: Faculdade = serde_json::from_str("\"UFOP\"").unwrap();
        assert_eq!(serde_json::to_string(&faculdade).unwrap(), "\"ufop\"");
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = "maybe".parse::<InviteStatus>().unwrap_err();
        assert_eq!(err.kind, "InviteStatus");
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn only_pending_events_transition() {
        use EventStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
    }
}
