//! Closed value sets carried by records and comments
//!
//! Every set parses case-insensitively from its display spelling and
//! serializes back to that spelling, both in JSON and in the database.

use casedesk_common::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| Error::InvalidArgument(format!("Invalid {}: {}", $label, s)))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

closed_enum! {
    /// Document-on-file flag (ledger, HCF, invoice, sign-in sheet)
    DocFlag, "document flag" {
        Yes => "yes",
        No => "no",
        NotRequired => "not required",
    }
}

impl Default for DocFlag {
    fn default() -> Self {
        DocFlag::NotRequired
    }
}

closed_enum! {
    LienStatus, "lien status" {
        NotFiled => "Not Filed",
        OutOfSol => "Out of SOL",
        Filed => "Filed",
        Settled => "Settled",
    }
}

closed_enum! {
    /// Legal case status. Spellings are the ones used on existing case files.
    CaseStatus, "case status" {
        Settled => "SETTLED",
        CAndRGranted => "C & R (GRANTED)",
        CicPending => "CIC PENDING",
        AAndSGranted => "A & S GRANTED",
        AdrSettledAndPaid => "ADR CASE - SETTED AND PAID ADR",
        OrderOfDismissal => "ORDER OF DISMISAAL OF CASE",
    }
}

closed_enum! {
    HearingTime, "hearing time" {
        Am => "AM",
        Pm => "PM",
    }
}

closed_enum! {
    DorFiledBy, "DOR filed-by" {
        Hubur => "HUBUR",
        Client => "CLIENT",
        AnotherLienClaimant => "ANOTHER LIEN CLAIMANT",
    }
}

closed_enum! {
    /// Yes/no answer for the 4903.8 and PMR status fields
    YesNo, "yes/no value" {
        Yes => "yes",
        No => "no",
    }
}

closed_enum! {
    JudgeOrderStatus, "judge order status" {
        Granted => "GRANTED",
        Pending => "PENDING",
    }
}

closed_enum! {
    /// Timeline status of a comment
    CommentStatus, "comment status" {
        Callback => "callback",
        Lvm => "lvm",
        SpokeTo => "spoke_to",
        SentEmailFax => "sent_email_fax",
        Offer => "offer",
        Settle => "settle",
        RequestToClose => "request_to_close",
        Wfp => "wfp",
        PaymentReceived => "payment_received",
        Closed => "closed",
        FilePmr => "file_pmr",
        FileLien => "file_lien",
        HearingRemarks => "hearing_remarks",
    }
}

/// Serde helper: absent, null and blank strings all mean "not set"
pub(crate) fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
