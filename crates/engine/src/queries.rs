//! Read requests.
//!
//! A [`ReadRequest`] is both a one-shot query and the descriptor a
//! subscription is bound to: after every relevant commit the notifier runs
//! it again and pushes the fresh [`ReadResponse`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Account, BankAccount, Booking, ChangeEventType, RealmView, UnbookedBankTransactionMatcher,
    UnbookedTransaction,
};

/// Half-open datetime range, `from` inclusive and `to` exclusive. A missing
/// bound is unbounded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, datetime: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| from <= datetime) && self.to.is_none_or(|to| datetime < to)
    }
}

/// Conjunctive filters of a booking listing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BookingFilter {
    DateRange { range: DateRange },
    /// Bookings with at least one entry on one of the accounts.
    AccountIds { account_ids: Vec<String> },
    /// Pagination cursor.
    IdGreaterThan { id: i64 },
    /// Oldest first instead of newest first.
    Ascending,
}

/// One line of a bank account statement: a booked entry or an unmatched
/// unbooked transaction, with the balance after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountTransaction {
    pub datetime: DateTime<Utc>,
    pub booking_id: Option<i64>,
    pub unbooked_transaction_id: Option<i64>,
    pub description: Option<String>,
    pub amount_in_cents: i64,
    pub balance_in_cents: i64,
}

impl BankAccountTransaction {
    pub fn is_booked(&self) -> bool {
        self.booking_id.is_some()
    }

    pub(crate) fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (
            self.datetime,
            self.booking_id
                .or(self.unbooked_transaction_id)
                .unwrap_or_default(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReadRequest {
    GetRealms,
    GetAccounts {
        realm_id: String,
    },
    GetBookings {
        realm_id: String,
        #[serde(default)]
        filters: Vec<BookingFilter>,
        #[serde(default)]
        limit: Option<u64>,
    },
    GetAccountBalance {
        realm_id: String,
        account_id: String,
        #[serde(default)]
        range: DateRange,
    },
    GetBankAccounts {
        realm_id: String,
    },
    GetBankAccountBalance {
        realm_id: String,
        account_id: String,
        #[serde(default)]
        range: DateRange,
    },
    GetBankAccountTransactions {
        realm_id: String,
        account_id: String,
        #[serde(default)]
        range: DateRange,
    },
    GetUnbookedTransactions {
        realm_id: String,
        account_id: String,
        #[serde(default)]
        range: DateRange,
    },
    GetUnbookedTransactionMatchers {
        realm_id: String,
    },
    GetMatchingMatchers {
        realm_id: String,
        account_id: String,
        transaction_id: i64,
    },
}

impl ReadRequest {
    /// Realm the read is scoped to, `None` for cross-realm reads.
    pub fn realm_id(&self) -> Option<&str> {
        match self {
            Self::GetRealms => None,
            Self::GetAccounts { realm_id }
            | Self::GetBookings { realm_id, .. }
            | Self::GetAccountBalance { realm_id, .. }
            | Self::GetBankAccounts { realm_id }
            | Self::GetBankAccountBalance { realm_id, .. }
            | Self::GetBankAccountTransactions { realm_id, .. }
            | Self::GetUnbookedTransactions { realm_id, .. }
            | Self::GetUnbookedTransactionMatchers { realm_id }
            | Self::GetMatchingMatchers { realm_id, .. } => Some(realm_id),
        }
    }

    /// Whether a committed change of `event` can alter this read's result.
    pub fn is_affected_by(&self, event: ChangeEventType) -> bool {
        use ChangeEventType as E;
        match self {
            Self::GetRealms => event == E::RealmChanged,
            Self::GetAccounts { .. } => matches!(event, E::AccountsChanged),
            Self::GetBookings { .. } | Self::GetAccountBalance { .. } => matches!(
                event,
                E::BookingAdded | E::BookingsChanged | E::AccountsChanged
            ),
            Self::GetBankAccounts { .. } => {
                matches!(event, E::BankAccountUpdated | E::AccountsChanged)
            }
            Self::GetBankAccountBalance { .. } | Self::GetBankAccountTransactions { .. } => {
                matches!(
                    event,
                    E::BookingAdded
                        | E::BookingsChanged
                        | E::BankAccountUpdated
                        | E::UnbookedTransactionsChanged
                )
            }
            Self::GetUnbookedTransactions { .. } => matches!(
                event,
                E::UnbookedTransactionsChanged | E::BankAccountUpdated | E::BookingsChanged
            ),
            Self::GetUnbookedTransactionMatchers { .. } => {
                event == E::UnbookedTransactionMatchersChanged
            }
            Self::GetMatchingMatchers { .. } => matches!(
                event,
                E::UnbookedTransactionMatchersChanged
                    | E::UnbookedTransactionsChanged
                    | E::BankAccountUpdated
                    | E::BookingsChanged
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ReadResponse {
    Realms(Vec<RealmView>),
    Accounts(Vec<Account>),
    Bookings(Vec<Booking>),
    Balance(i64),
    BankAccounts(Vec<BankAccount>),
    BankAccountTransactions(Vec<BankAccountTransaction>),
    UnbookedTransactions(Vec<UnbookedTransaction>),
    Matchers(Vec<UnbookedBankTransactionMatcher>),
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn date_range_is_half_open() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let range = DateRange::between(from, to);
        assert!(range.contains(from));
        assert!(!range.contains(to));
        assert!(DateRange::all().contains(to));
    }

    #[test]
    fn requests_parse_from_op_tag() {
        let request: ReadRequest = serde_json::from_str(
            r#"{"op":"getBookings","realmId":"home","filters":[{"type":"accountIds","accountIds":["food"]},{"type":"ascending"}]}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            ReadRequest::GetBookings {
                realm_id: "home".to_string(),
                filters: vec![
                    BookingFilter::AccountIds {
                        account_ids: vec!["food".to_string()]
                    },
                    BookingFilter::Ascending
                ],
                limit: None,
            }
        );
        assert_eq!(request.realm_id(), Some("home"));
    }

    #[test]
    fn realm_list_only_follows_realm_changes() {
        assert!(ReadRequest::GetRealms.is_affected_by(ChangeEventType::RealmChanged));
        assert!(!ReadRequest::GetRealms.is_affected_by(ChangeEventType::BookingAdded));
        let unbooked = ReadRequest::GetUnbookedTransactions {
            realm_id: "home".to_string(),
            account_id: "checking".to_string(),
            range: DateRange::all(),
        };
        assert!(unbooked.is_affected_by(ChangeEventType::BookingsChanged));
        assert!(!unbooked.is_affected_by(ChangeEventType::RealmChanged));
    }
}
