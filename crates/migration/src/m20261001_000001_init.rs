//! Initial schema migration - creates all tables from scratch.
//!
//! - `users`: identities and the admin flag
//! - `realms`: books, each with its own booking counter
//! - `realm_access`: per-user access level for a realm
//! - `accounts`: the chart of accounts, a tree per realm
//! - `bookings` / `booking_entries`: the double-entry ledger
//! - `bank_accounts`: 1:1 extension of an account with the unbooked counter
//! - `unbooked_bank_transactions`: imported bank activity
//! - `unbooked_bank_transaction_matchers`: filter/action rules
//! - `changelog`: append-only log of every mutation

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
    IsActive,
    IsAdmin,
}

#[derive(Iden)]
enum Realms {
    Table,
    Id,
    Name,
    Currency,
    LastBookingId,
}

#[derive(Iden)]
enum RealmAccess {
    Table,
    RealmId,
    UserId,
    AccessLevel,
}

#[derive(Iden)]
enum Accounts {
    Table,
    RealmId,
    Id,
    Name,
    Description,
    ParentAccountId,
    IsStandard,
}

#[derive(Iden)]
enum Bookings {
    Table,
    RealmId,
    Id,
    Description,
    Datetime,
}

#[derive(Iden)]
enum BookingEntries {
    Table,
    RealmId,
    BookingId,
    Id,
    Description,
    AccountId,
    AmountInCents,
    Checked,
}

#[derive(Iden)]
enum BankAccounts {
    Table,
    RealmId,
    AccountId,
    BankId,
    AccountNumber,
    OpenDate,
    CloseDate,
    LastUnbookedTransactionId,
}

#[derive(Iden)]
enum UnbookedBankTransactions {
    Table,
    RealmId,
    AccountId,
    Id,
    Memo,
    Datetime,
    AmountInCents,
    OtherAccountNumber,
    MatchedBookingId,
}

#[derive(Iden)]
enum UnbookedBankTransactionMatchers {
    Table,
    RealmId,
    Id,
    Name,
    Filter,
    Action,
    ActionAccountId,
    ActionMemo,
    LastUsed,
}

#[derive(Iden)]
enum Changelog {
    Table,
    Id,
    EventType,
    Payload,
    CreatedAt,
    CreatedByUserId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::IsAdmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Realms
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Realms::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Realms::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Realms::Name).string().not_null())
                    .col(
                        ColumnDef::new(Realms::Currency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(
                        ColumnDef::new(Realms::LastBookingId)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Realm access
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(RealmAccess::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RealmAccess::RealmId).string().not_null())
                    .col(ColumnDef::new(RealmAccess::UserId).string().not_null())
                    .col(ColumnDef::new(RealmAccess::AccessLevel).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(RealmAccess::RealmId)
                            .col(RealmAccess::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-realm_access-realm_id")
                            .from(RealmAccess::Table, RealmAccess::RealmId)
                            .to(Realms::Table, Realms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-realm_access-user_id")
                            .from(RealmAccess::Table, RealmAccess::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::RealmId).string().not_null())
                    .col(ColumnDef::new(Accounts::Id).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::Description).string())
                    .col(ColumnDef::new(Accounts::ParentAccountId).string())
                    .col(
                        ColumnDef::new(Accounts::IsStandard)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .primary_key(Index::create().col(Accounts::RealmId).col(Accounts::Id))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-accounts-realm_id")
                            .from(Accounts::Table, Accounts::RealmId)
                            .to(Realms::Table, Realms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Bookings
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bookings::RealmId).string().not_null())
                    .col(ColumnDef::new(Bookings::Id).big_integer().not_null())
                    .col(ColumnDef::new(Bookings::Description).string())
                    .col(
                        ColumnDef::new(Bookings::Datetime)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(Bookings::RealmId).col(Bookings::Id))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bookings-realm_id")
                            .from(Bookings::Table, Bookings::RealmId)
                            .to(Realms::Table, Realms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-bookings-realm_id-datetime")
                    .table(Bookings::Table)
                    .col(Bookings::RealmId)
                    .col(Bookings::Datetime)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Booking entries
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BookingEntries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BookingEntries::RealmId).string().not_null())
                    .col(
                        ColumnDef::new(BookingEntries::BookingId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BookingEntries::Id).integer().not_null())
                    .col(ColumnDef::new(BookingEntries::Description).string())
                    .col(ColumnDef::new(BookingEntries::AccountId).string().not_null())
                    .col(
                        ColumnDef::new(BookingEntries::AmountInCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BookingEntries::Checked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .primary_key(
                        Index::create()
                            .col(BookingEntries::RealmId)
                            .col(BookingEntries::BookingId)
                            .col(BookingEntries::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-booking_entries-booking")
                            .from(
                                BookingEntries::Table,
                                (BookingEntries::RealmId, BookingEntries::BookingId),
                            )
                            .to(Bookings::Table, (Bookings::RealmId, Bookings::Id)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-booking_entries-account")
                            .from(
                                BookingEntries::Table,
                                (BookingEntries::RealmId, BookingEntries::AccountId),
                            )
                            .to(Accounts::Table, (Accounts::RealmId, Accounts::Id)),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-booking_entries-realm_id-account_id")
                    .table(BookingEntries::Table)
                    .col(BookingEntries::RealmId)
                    .col(BookingEntries::AccountId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Bank accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(BankAccounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BankAccounts::RealmId).string().not_null())
                    .col(ColumnDef::new(BankAccounts::AccountId).string().not_null())
                    .col(ColumnDef::new(BankAccounts::BankId).string().not_null())
                    .col(ColumnDef::new(BankAccounts::AccountNumber).string())
                    .col(ColumnDef::new(BankAccounts::OpenDate).date().not_null())
                    .col(ColumnDef::new(BankAccounts::CloseDate).date())
                    .col(
                        ColumnDef::new(BankAccounts::LastUnbookedTransactionId)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(BankAccounts::RealmId)
                            .col(BankAccounts::AccountId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-bank_accounts-account")
                            .from(
                                BankAccounts::Table,
                                (BankAccounts::RealmId, BankAccounts::AccountId),
                            )
                            .to(Accounts::Table, (Accounts::RealmId, Accounts::Id)),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Unbooked bank transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(UnbookedBankTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UnbookedBankTransactions::RealmId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnbookedBankTransactions::AccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnbookedBankTransactions::Id)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UnbookedBankTransactions::Memo).string())
                    .col(
                        ColumnDef::new(UnbookedBankTransactions::Datetime)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnbookedBankTransactions::AmountInCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UnbookedBankTransactions::OtherAccountNumber).string())
                    .col(ColumnDef::new(UnbookedBankTransactions::MatchedBookingId).big_integer())
                    .primary_key(
                        Index::create()
                            .col(UnbookedBankTransactions::RealmId)
                            .col(UnbookedBankTransactions::AccountId)
                            .col(UnbookedBankTransactions::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-unbooked_bank_transactions-bank_account")
                            .from(
                                UnbookedBankTransactions::Table,
                                (
                                    UnbookedBankTransactions::RealmId,
                                    UnbookedBankTransactions::AccountId,
                                ),
                            )
                            .to(
                                BankAccounts::Table,
                                (BankAccounts::RealmId, BankAccounts::AccountId),
                            ),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-unbooked_bank_transactions-matched_booking")
                    .table(UnbookedBankTransactions::Table)
                    .col(UnbookedBankTransactions::RealmId)
                    .col(UnbookedBankTransactions::MatchedBookingId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. Matchers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(UnbookedBankTransactionMatchers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UnbookedBankTransactionMatchers::RealmId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnbookedBankTransactionMatchers::Id)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnbookedBankTransactionMatchers::Name)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnbookedBankTransactionMatchers::Filter)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UnbookedBankTransactionMatchers::Action)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UnbookedBankTransactionMatchers::ActionAccountId).string())
                    .col(ColumnDef::new(UnbookedBankTransactionMatchers::ActionMemo).string())
                    .col(
                        ColumnDef::new(UnbookedBankTransactionMatchers::LastUsed)
                            .timestamp(),
                    )
                    .primary_key(
                        Index::create()
                            .col(UnbookedBankTransactionMatchers::RealmId)
                            .col(UnbookedBankTransactionMatchers::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-unbooked_bank_transaction_matchers-realm_id")
                            .from(
                                UnbookedBankTransactionMatchers::Table,
                                UnbookedBankTransactionMatchers::RealmId,
                            )
                            .to(Realms::Table, Realms::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 10. Changelog
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Changelog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Changelog::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Changelog::EventType).string().not_null())
                    .col(ColumnDef::new(Changelog::Payload).text().not_null())
                    .col(
                        ColumnDef::new(Changelog::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Changelog::CreatedByUserId).string().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(Changelog::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(UnbookedBankTransactionMatchers::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(UnbookedBankTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BankAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BookingEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RealmAccess::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Realms::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
