use std::{error::Error, fs::File, io::Write};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{AccessLevel, BankAccountCmd, Currency, DuplicatePolicy, Engine};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "bookkeeper_admin")]
#[command(about = "Admin utilities for the bookkeeper (users, realms, bank imports)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./bookkeeper.db?mode=rwc"
    )]
    database_url: String,

    /// User the realm commands act as (also read from `BOOKKEEPER_USER`).
    #[arg(long = "as", env = "BOOKKEEPER_USER", global = true)]
    acting_user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Realm(Realm),
    Access(Access),
    BankAccount(BankAccount),
    Import(Import),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    /// Grants implicit access to every realm.
    #[arg(long)]
    admin: bool,
}

#[derive(Args, Debug)]
struct Realm {
    #[command(subcommand)]
    command: RealmCommand,
}

#[derive(Subcommand, Debug)]
enum RealmCommand {
    Create(RealmCreateArgs),
}

#[derive(Args, Debug)]
struct RealmCreateArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "EUR", value_parser = parse_currency)]
    currency: Currency,
}

#[derive(Args, Debug)]
struct Access {
    #[command(subcommand)]
    command: AccessCommand,
}

#[derive(Subcommand, Debug)]
enum AccessCommand {
    Grant(AccessGrantArgs),
}

#[derive(Args, Debug)]
struct AccessGrantArgs {
    #[arg(long)]
    realm: String,
    #[arg(long)]
    user: String,
    /// One of none, read, write, owner.
    #[arg(long, value_parser = parse_access_level)]
    level: AccessLevel,
}

#[derive(Args, Debug)]
struct BankAccount {
    #[command(subcommand)]
    command: BankAccountCommand,
}

#[derive(Subcommand, Debug)]
enum BankAccountCommand {
    Add(BankAccountAddArgs),
}

#[derive(Args, Debug)]
struct BankAccountAddArgs {
    #[arg(long)]
    realm: String,
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    name: String,
    #[arg(long)]
    bank: String,
    #[arg(long)]
    account_number: Option<String>,
    /// First day of the account, `YYYY-MM-DD`.
    #[arg(long)]
    open_date: NaiveDate,
    /// Opening balance in cents.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    opening_balance: i64,
    /// Book below `BankAccountLiability` (credit cards, loans).
    #[arg(long)]
    liability: bool,
}

#[derive(Args, Debug)]
struct Import {
    #[command(subcommand)]
    command: ImportCommand,
}

#[derive(Subcommand, Debug)]
enum ImportCommand {
    Csv(ImportCsvArgs),
}

#[derive(Args, Debug)]
struct ImportCsvArgs {
    #[arg(long)]
    realm: String,
    #[arg(long)]
    account: String,
    /// CSV file with a `date,description,amount` header.
    file: std::path::PathBuf,
    /// One of same-date-and-amount, same-date-amount-and-description, none.
    #[arg(long, default_value = "same-date-amount-and-description", value_parser = parse_policy)]
    policy: DuplicatePolicy,
}

fn parse_currency(raw: &str) -> Result<Currency, String> {
    Currency::try_from(raw).map_err(|err| err.to_string())
}

fn parse_access_level(raw: &str) -> Result<AccessLevel, String> {
    match raw.to_ascii_lowercase().as_str() {
        "none" => Ok(AccessLevel::None),
        "read" => Ok(AccessLevel::Read),
        "write" => Ok(AccessLevel::Write),
        "owner" => Ok(AccessLevel::Owner),
        other => Err(format!("unsupported access level: {other}")),
    }
}

fn parse_policy(raw: &str) -> Result<DuplicatePolicy, String> {
    match raw {
        "same-date-and-amount" => Ok(DuplicatePolicy::SameDateAndAmount),
        "same-date-amount-and-description" => Ok(DuplicatePolicy::SameDateAmountAndDescription),
        "none" => Ok(DuplicatePolicy::None),
        other => Err(format!("unsupported duplicate policy: {other}")),
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> CliResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn print_line(message: &str) -> CliResult<()> {
    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(message),
        Print("\r\n")
    )?;
    Ok(())
}

/// Reads a password without echoing it, printing `*` per character.
fn prompt_password(prompt: &str) -> CliResult<String> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                break;
            }
            KeyCode::Backspace if buf.pop().is_some() => {
                execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
            }
            _ => {}
        }
        out.flush()?;
    }

    Ok(buf)
}

fn prompt_new_password() -> CliResult<String> {
    for _ in 0..3 {
        let first = prompt_password("Password: ")?;
        if first.is_empty() {
            print_line("Password must not be empty.")?;
            continue;
        }
        if prompt_password("Confirm password: ")? == first {
            return Ok(first);
        }
        print_line("Passwords do not match. Try again.")?;
    }

    Err("too many attempts".into())
}

async fn connect_db(database_url: &str) -> CliResult<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn acting_user(cli_user: Option<&str>) -> CliResult<&str> {
    cli_user.ok_or_else(|| "--as <user> (or BOOKKEEPER_USER) is required".into())
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;
    let as_user = cli.acting_user.as_deref();

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let password = prompt_new_password()?;
            engine
                .create_user(&args.username, &password, args.admin)
                .await?;
            println!("created user: {}", args.username);
        }
        Command::Realm(Realm {
            command: RealmCommand::Create(args),
        }) => {
            let realm_id = engine
                .create_realm(&args.name, args.currency, &args.owner)
                .await?;
            println!("created realm: {} ({realm_id})", args.name);
        }
        Command::Access(Access {
            command: AccessCommand::Grant(args),
        }) => {
            engine
                .set_realm_access(&args.realm, &args.user, args.level, acting_user(as_user)?)
                .await?;
            println!("{} now has {:?} access to {}", args.user, args.level, args.realm);
        }
        Command::BankAccount(BankAccount {
            command: BankAccountCommand::Add(args),
        }) => {
            let mut cmd = BankAccountCmd::new(
                args.realm,
                acting_user(as_user)?,
                args.name,
                args.bank,
                args.open_date,
            )
            .opening_balance(args.opening_balance);
            cmd.account_id = args.id;
            cmd.account_number = args.account_number;
            cmd.liability = args.liability;
            let account_id = engine.add_bank_account(cmd).await?;
            println!("created bank account: {account_id}");
        }
        Command::Import(Import {
            command: ImportCommand::Csv(args),
        }) => {
            let records = engine::read_csv(File::open(&args.file)?);
            let report = engine
                .import_bank_transactions(
                    &args.realm,
                    &args.account,
                    records,
                    &args.policy,
                    acting_user(as_user)?,
                )
                .await?;
            println!(
                "imported {} / skipped {}",
                report.imported, report.skipped
            );
            if let Some(error) = report.error {
                eprintln!("first error: {error}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_access_levels() {
        assert_eq!(parse_access_level("Write"), Ok(AccessLevel::Write));
        assert!(parse_access_level("admin").is_err());
    }

    #[test]
    fn parses_policies() {
        assert_eq!(
            parse_policy("same-date-and-amount"),
            Ok(DuplicatePolicy::SameDateAndAmount)
        );
        assert!(parse_policy("fuzzy").is_err());
    }

    #[test]
    fn cli_accepts_negative_opening_balances() {
        let cli = Cli::try_parse_from([
            "bookkeeper_admin",
            "--as",
            "alice",
            "bank-account",
            "add",
            "--realm",
            "r1",
            "--name",
            "Visa",
            "--bank",
            "testbank",
            "--open-date",
            "2026-01-01",
            "--opening-balance",
            "-1500",
            "--liability",
        ])
        .unwrap();
        let Command::BankAccount(BankAccount {
            command: BankAccountCommand::Add(args),
        }) = cli.command
        else {
            panic!("unexpected command");
        };
        assert_eq!(args.opening_balance, -1500);
        assert!(args.liability);
        assert_eq!(cli.acting_user.as_deref(), Some("alice"));
    }
}
