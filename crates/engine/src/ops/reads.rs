use crate::{ReadRequest, ReadResponse, ResultEngine};

use super::Engine;

impl Engine {
    /// Run a read request on behalf of `user_id`. Subscriptions re-run the
    /// same request whenever a relevant change commits.
    pub async fn read(&self, request: &ReadRequest, user_id: &str) -> ResultEngine<ReadResponse> {
        let response = match request {
            ReadRequest::GetRealms => ReadResponse::Realms(self.get_realms(user_id).await?),
            ReadRequest::GetAccounts { realm_id } => {
                ReadResponse::Accounts(self.get_accounts(realm_id, user_id).await?)
            }
            ReadRequest::GetBookings {
                realm_id,
                filters,
                limit,
            } => ReadResponse::Bookings(
                self.get_bookings(realm_id, filters, *limit, user_id)
                    .await?,
            ),
            ReadRequest::GetAccountBalance {
                realm_id,
                account_id,
                range,
            } => ReadResponse::Balance(
                self.account_balance(realm_id, account_id, range, user_id)
                    .await?,
            ),
            ReadRequest::GetBankAccounts { realm_id } => {
                ReadResponse::BankAccounts(self.get_bank_accounts(realm_id, user_id).await?)
            }
            ReadRequest::GetBankAccountBalance {
                realm_id,
                account_id,
                range,
            } => ReadResponse::Balance(
                self.bank_account_balance(realm_id, account_id, range, user_id)
                    .await?,
            ),
            ReadRequest::GetBankAccountTransactions {
                realm_id,
                account_id,
                range,
            } => ReadResponse::BankAccountTransactions(
                self.bank_account_transactions(realm_id, account_id, range, user_id)
                    .await?,
            ),
            ReadRequest::GetUnbookedTransactions {
                realm_id,
                account_id,
                range,
            } => ReadResponse::UnbookedTransactions(
                self.get_unbooked_transactions(realm_id, account_id, range, user_id)
                    .await?,
            ),
            ReadRequest::GetUnbookedTransactionMatchers { realm_id } => {
                ReadResponse::Matchers(self.get_matchers(realm_id, user_id).await?)
            }
            ReadRequest::GetMatchingMatchers {
                realm_id,
                account_id,
                transaction_id,
            } => ReadResponse::Matchers(
                self.matching_matchers(realm_id, account_id, *transaction_id, user_id)
                    .await?,
            ),
        };
        Ok(response)
    }
}
