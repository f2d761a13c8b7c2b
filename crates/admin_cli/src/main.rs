use std::{error::Error, fs::File, io, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use migration::MigratorTrait;
use rust_decimal::Decimal;
use sea_orm::{Database, DatabaseConnection};
use settlement::{
    AdminProofCmd, ComplaintStatus, Country, CurrencyCode, CurrencyRate, Engine, FeePercent,
    MarkPaidCmd, Money, NewPaymentDetail, PlatformConfig, RaiseComplaintCmd, RateCorrectionCmd,
    ResolveReassignCmd, RevertCmd, SessionPayment, Transaction, TransactionListFilter,
    TransactionStatus,
};
use uuid::Uuid;

mod output;
mod settings;

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

const DEFAULT_DATABASE_URL: &str = "sqlite:./skillswap.db?mode=rwc";

#[derive(Parser, Debug)]
#[command(name = "skillswap_admin")]
#[command(about = "Admin utilities for the skill-exchange settlement engine")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`, then from
    /// the settings file).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or edit the platform configuration.
    Config(ConfigArgs),
    /// Manage currency buy/sell rates.
    Currency(CurrencyArgs),
    /// Manage countries and their default currency.
    Country(CountryArgs),
    /// Manage the company's payment details.
    PaymentDetail(PaymentDetailArgs),
    /// Transactions: create, settle, revert, list, export.
    Tx(TxArgs),
    /// Payment complaints.
    Complaint(ComplaintArgs),
    /// Earnings summary over a date range.
    Earnings(RangeArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    SetFee {
        /// Percent between 0 and 100 (`10`, `12.5`, `7%`).
        percent: FeePercent,
    },
}

#[derive(Args, Debug)]
struct CurrencyArgs {
    #[command(subcommand)]
    command: CurrencyCommand,
}

#[derive(Subcommand, Debug)]
enum CurrencyCommand {
    Set {
        #[arg(value_parser = parse_currency)]
        code: CurrencyCode,
        /// USD per unit when converting from this currency.
        #[arg(long)]
        buy: Decimal,
        /// USD per unit when converting into this currency (defaults to buy).
        #[arg(long)]
        sell: Option<Decimal>,
    },
    Remove {
        #[arg(value_parser = parse_currency)]
        code: CurrencyCode,
    },
}

#[derive(Args, Debug)]
struct CountryArgs {
    #[command(subcommand)]
    command: CountryCommand,
}

#[derive(Subcommand, Debug)]
enum CountryCommand {
    Set {
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_currency)]
        currency: Option<CurrencyCode>,
    },
    Remove {
        code: String,
    },
}

#[derive(Args, Debug)]
struct PaymentDetailArgs {
    #[command(subcommand)]
    command: PaymentDetailCommand,
}

#[derive(Subcommand, Debug)]
enum PaymentDetailCommand {
    Add {
        #[arg(long)]
        method: String,
        #[arg(long)]
        account_name: String,
        #[arg(long)]
        account_number: String,
        #[arg(long, value_parser = parse_currency)]
        currency: CurrencyCode,
        #[arg(long)]
        instructions: Option<String>,
    },
    Remove {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct TxArgs {
    #[command(subcommand)]
    command: TxCommand,
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    /// Record a session payment (idempotent per session).
    Create(TxCreateArgs),
    List(TxListArgs),
    Show {
        id: Uuid,
    },
    MarkPaid(TxMarkPaidArgs),
    Revert {
        id: Uuid,
        #[command(flatten)]
        revert: RevertArgs,
    },
    /// Append a corrected rate to a settled transaction's history.
    Correct {
        id: Uuid,
        #[arg(long)]
        admin: String,
        #[arg(long)]
        rate: Decimal,
        #[arg(long)]
        amount: Option<Money>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Delete a transaction with its history and complaints.
    Purge {
        id: Uuid,
    },
    /// Write every matching transaction as CSV.
    ExportCsv {
        #[command(flatten)]
        filter: TxFilterArgs,
        /// Output file (stdout when omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct TxCreateArgs {
    #[arg(long)]
    session: String,
    #[arg(long)]
    learner: String,
    #[arg(long)]
    teacher: String,
    #[arg(long, default_value = "0")]
    amount: Money,
    #[arg(long, value_parser = parse_currency)]
    currency: Option<CurrencyCode>,
    #[arg(long)]
    learner_country: Option<String>,
    #[arg(long, value_parser = parse_currency)]
    payout_currency: Option<CurrencyCode>,
    #[arg(long)]
    teacher_country: Option<String>,
    #[arg(long)]
    free: bool,
}

#[derive(Args, Debug)]
struct TxFilterArgs {
    #[arg(long, value_parser = parse_status)]
    status: Vec<TransactionStatus>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long, value_parser = parse_currency)]
    currency: Option<CurrencyCode>,
    #[command(flatten)]
    range: RangeArgs,
}

impl TxFilterArgs {
    fn to_filter(&self) -> TransactionListFilter {
        TransactionListFilter {
            from: self.range.from,
            to: self.range.to,
            statuses: (!self.status.is_empty()).then(|| self.status.clone()),
            user_id: self.user.clone(),
            payer_currency: self.currency.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct TxListArgs {
    #[command(flatten)]
    filter: TxFilterArgs,
    #[arg(long, default_value_t = 50)]
    limit: u64,
    #[arg(long)]
    cursor: Option<String>,
}

#[derive(Args, Debug)]
struct TxMarkPaidArgs {
    id: Uuid,
    #[arg(long)]
    admin: String,
    #[arg(long)]
    fee_percent: Option<FeePercent>,
    /// NPR → payout currency rate actually used (blank or 0: computed).
    #[arg(long)]
    rate: Option<Decimal>,
    /// Amount actually sent (blank or 0: computed).
    #[arg(long)]
    amount: Option<Money>,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args, Debug)]
struct RevertArgs {
    #[arg(long)]
    admin: String,
    #[arg(long, default_value = "0")]
    deduction: Money,
    #[arg(long)]
    note: Option<String>,
}

impl RevertArgs {
    fn into_cmd(self) -> RevertCmd {
        let mut cmd = RevertCmd::new(self.admin, Utc::now()).deduction(self.deduction);
        if let Some(note) = self.note {
            cmd = cmd.note(note);
        }
        cmd
    }
}

#[derive(Args, Debug)]
struct ComplaintArgs {
    #[command(subcommand)]
    command: ComplaintCommand,
}

#[derive(Subcommand, Debug)]
enum ComplaintCommand {
    Open {
        #[arg(long)]
        tx: Uuid,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        proof: Vec<String>,
    },
    Proof {
        id: Uuid,
        #[arg(long)]
        admin: String,
        #[arg(long)]
        proof: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    ResolveReassign {
        id: Uuid,
        #[arg(long)]
        admin: String,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    ResolveRevert {
        id: Uuid,
        #[command(flatten)]
        revert: RevertArgs,
    },
    Show {
        id: Uuid,
    },
    List {
        #[arg(long, value_parser = parse_complaint_status)]
        status: Option<ComplaintStatus>,
        #[arg(long)]
        tx: Option<Uuid>,
    },
}

#[derive(Args, Debug, Clone)]
struct RangeArgs {
    /// Inclusive lower bound (RFC 3339).
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// Exclusive upper bound (RFC 3339).
    #[arg(long)]
    to: Option<DateTime<Utc>>,
}

fn parse_currency(raw: &str) -> Result<CurrencyCode, String> {
    CurrencyCode::parse(raw).map_err(|err| err.to_string())
}

fn parse_status(raw: &str) -> Result<TransactionStatus, String> {
    TransactionStatus::try_from(raw).map_err(|err| err.to_string())
}

fn parse_complaint_status(raw: &str) -> Result<ComplaintStatus, String> {
    ComplaintStatus::try_from(raw).map_err(|err| err.to_string())
}

async fn connect_db(database_url: &str) -> CliResult<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Pages through every transaction matching `filter`.
async fn collect_transactions(
    engine: &Engine,
    filter: &TransactionListFilter,
) -> CliResult<Vec<Transaction>> {
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let (page, next) = engine
            .list_transactions(filter, 500, cursor.as_deref())
            .await?;
        out.extend(page);
        match next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "skillswap_admin={level},settlement={level}",
            level = settings.app.level
        ))
        .with_writer(io::stderr)
        .init();

    let database_url = cli
        .database_url
        .or(settings.database.url)
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
    let db = connect_db(&database_url).await?;

    let mut seed = PlatformConfig::default();
    if let Some(percent) = settings.seed.platform_fee_percent.as_deref() {
        seed.platform_fee_percent = FeePercent::from_str(percent)?;
    }
    let engine = Engine::builder()
        .database(db)
        .default_config(seed)
        .build()
        .await?;

    run(&engine, cli.command, cli.json).await
}

async fn run(engine: &Engine, command: Command, json: bool) -> CliResult<()> {
    match command {
        Command::Config(ConfigArgs { command }) => match command {
            ConfigCommand::Show => {
                let config = engine.platform_config().await?;
                if json {
                    output::json(&config)?;
                } else {
                    output::config(&config);
                }
            }
            ConfigCommand::SetFee { percent } => {
                engine.set_platform_fee_percent(percent).await?;
                println!("platform fee set to {percent}");
            }
        },
        Command::Currency(CurrencyArgs { command }) => match command {
            CurrencyCommand::Set { code, buy, sell } => {
                let rate = CurrencyRate::new(code, buy, sell)?;
                engine.upsert_currency_rate(rate.clone()).await?;
                println!(
                    "{}: buy {} sell {}",
                    rate.code, rate.buy_to_usd, rate.sell_to_usd
                );
            }
            CurrencyCommand::Remove { code } => {
                engine.remove_currency_rate(&code).await?;
                println!("removed currency {code}");
            }
        },
        Command::Country(CountryArgs { command }) => match command {
            CountryCommand::Set {
                code,
                name,
                currency,
            } => {
                let country = Country::new(&code, &name, currency)?;
                engine.set_country(country.clone()).await?;
                println!("saved country {} ({})", country.code, country.name);
            }
            CountryCommand::Remove { code } => {
                engine.remove_country(&code).await?;
                println!("removed country {code}");
            }
        },
        Command::PaymentDetail(PaymentDetailArgs { command }) => match command {
            PaymentDetailCommand::Add {
                method,
                account_name,
                account_number,
                currency,
                instructions,
            } => {
                let mut cmd = NewPaymentDetail::new(method, account_name, account_number, currency);
                if let Some(instructions) = instructions {
                    cmd = cmd.instructions(instructions);
                }
                let detail = engine.add_payment_detail(cmd).await?;
                println!("created payment detail {}", detail.id);
            }
            PaymentDetailCommand::Remove { id } => {
                engine.remove_payment_detail(id).await?;
                println!("removed payment detail {id}");
            }
        },
        Command::Tx(TxArgs { command }) => run_tx(engine, command, json).await?,
        Command::Complaint(ComplaintArgs { command }) => {
            run_complaint(engine, command, json).await?;
        }
        Command::Earnings(range) => {
            let summary = engine.earnings_summary(range.from, range.to).await?;
            if json {
                output::json(&summary)?;
            } else {
                output::earnings(&summary);
            }
        }
    }
    Ok(())
}

async fn run_tx(engine: &Engine, command: TxCommand, json: bool) -> CliResult<()> {
    let print = |tx: &Transaction| -> CliResult<()> {
        if json {
            output::json(tx)
        } else {
            output::transaction_detail(tx);
            Ok(())
        }
    };

    match command {
        TxCommand::Create(args) => {
            let mut payment = SessionPayment::new(
                args.session,
                args.learner,
                args.teacher,
                args.amount,
                Utc::now(),
            );
            if let Some(currency) = args.currency {
                payment = payment.currency(currency);
            }
            if let Some(country) = args.learner_country {
                payment = payment.learner_country(country);
            }
            if let Some(currency) = args.payout_currency {
                payment = payment.payout_currency(currency);
            }
            if let Some(country) = args.teacher_country {
                payment = payment.teacher_country(country);
            }
            if args.free {
                payment = payment.free();
            }
            print(&engine.create_transaction(payment).await?)?;
        }
        TxCommand::List(args) => {
            let (txs, next) = engine
                .list_transactions(&args.filter.to_filter(), args.limit, args.cursor.as_deref())
                .await?;
            if json {
                output::json(&serde_json::json!({ "transactions": txs, "next_cursor": next }))?;
            } else {
                for tx in &txs {
                    println!("{}", output::transaction_line(tx));
                }
                if let Some(next) = next {
                    println!("next cursor: {next}");
                }
            }
        }
        TxCommand::Show { id } => print(&engine.transaction(id).await?)?,
        TxCommand::MarkPaid(args) => {
            let mut cmd = MarkPaidCmd::new(args.admin, Utc::now());
            if let Some(fee_percent) = args.fee_percent {
                cmd = cmd.fee_percent(fee_percent);
            }
            if let Some(rate) = args.rate {
                cmd = cmd.rate(rate);
            }
            if let Some(amount) = args.amount {
                cmd = cmd.amount(amount);
            }
            if let Some(note) = args.note {
                cmd = cmd.note(note);
            }
            print(&engine.mark_paid(args.id, cmd).await?)?;
        }
        TxCommand::Revert { id, revert } => {
            print(&engine.revert(id, revert.into_cmd()).await?)?;
        }
        TxCommand::Correct {
            id,
            admin,
            rate,
            amount,
            note,
        } => {
            let mut cmd = RateCorrectionCmd::new(admin, rate, Utc::now());
            if let Some(amount) = amount {
                cmd = cmd.payout_amount(amount);
            }
            if let Some(note) = note {
                cmd = cmd.note(note);
            }
            let entry = engine.record_rate_correction(id, cmd).await?;
            if json {
                output::json(&entry)?;
            } else {
                println!(
                    "history #{}: rate {} amount {}",
                    entry.seq, entry.rate, entry.payout_amount
                );
            }
        }
        TxCommand::Purge { id } => {
            engine.purge_transaction(id).await?;
            println!("purged transaction {id}");
        }
        TxCommand::ExportCsv {
            filter,
            output: out_path,
        } => {
            let txs = collect_transactions(engine, &filter.to_filter()).await?;
            match out_path {
                Some(path) => {
                    output::write_csv(File::create(&path)?, &txs)?;
                    tracing::info!(rows = txs.len(), path = %path.display(), "export written");
                }
                None => output::write_csv(io::stdout().lock(), &txs)?,
            }
        }
    }
    Ok(())
}

async fn run_complaint(engine: &Engine, command: ComplaintCommand, json: bool) -> CliResult<()> {
    let complaint = match command {
        ComplaintCommand::Open {
            tx,
            by,
            reason,
            proof,
        } => {
            let mut cmd = RaiseComplaintCmd::new(tx, by, reason, Utc::now());
            for url in proof {
                cmd = cmd.proof_url(url);
            }
            engine.raise_complaint(cmd).await?
        }
        ComplaintCommand::Proof {
            id,
            admin,
            proof,
            notes,
        } => {
            let mut cmd = AdminProofCmd::new(admin);
            for url in proof {
                cmd = cmd.proof_url(url);
            }
            if let Some(notes) = notes {
                cmd = cmd.notes(notes);
            }
            engine.submit_admin_proof(id, cmd).await?
        }
        ComplaintCommand::ResolveReassign {
            id,
            admin,
            link,
            notes,
        } => {
            let mut cmd = ResolveReassignCmd::new(admin, Utc::now());
            if let Some(link) = link {
                cmd = cmd.new_meeting_link(link);
            }
            if let Some(notes) = notes {
                cmd = cmd.notes(notes);
            }
            engine.resolve_reassign(id, cmd).await?
        }
        ComplaintCommand::ResolveRevert { id, revert } => {
            engine.resolve_revert(id, revert.into_cmd()).await?
        }
        ComplaintCommand::Show { id } => engine.complaint(id).await?,
        ComplaintCommand::List { status, tx } => {
            let complaints = match tx {
                Some(tx) => {
                    let mut all = engine.complaints_for_transaction(tx).await?;
                    if let Some(status) = status {
                        all.retain(|c| c.status == status);
                    }
                    all
                }
                None => engine.list_complaints(status).await?,
            };
            if json {
                output::json(&complaints)?;
            } else {
                for complaint in &complaints {
                    println!("{}", output::complaint_line(complaint));
                }
            }
            return Ok(());
        }
    };

    if json {
        output::json(&complaint)?;
    } else {
        println!("{}", output::complaint_line(&complaint));
        if let Some(notes) = &complaint.admin_notes {
            println!("  admin notes: {}", notes.replace('\n', " | "));
        }
    }
    Ok(())
}
