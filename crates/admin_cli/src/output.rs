//! Human-readable, JSON and CSV rendering of engine records.

use std::{error::Error, io::Write};

use serde::Serialize;
use settlement::{EarningsSummary, PaymentComplaint, PlatformConfig, Transaction};

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub fn json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn transaction_line(tx: &Transaction) -> String {
    let payout = match (tx.payout_amount, tx.exchange_rate) {
        (Some(amount), Some(rate)) => format!(" payout {amount} {} @ {rate}", tx.payout_currency),
        (Some(amount), None) => format!(" payout {amount} {}", tx.payout_currency),
        _ => String::new(),
    };
    format!(
        "{} {} session={} learner={} teacher={} paid {} {} (fee {} / net {}) npr {}{}",
        tx.id,
        tx.status,
        tx.session_id,
        tx.learner_id,
        tx.teacher_id,
        tx.amount_paid,
        tx.payer_currency,
        tx.platform_fee_amount,
        tx.teacher_amount,
        tx.amount_paid_npr,
        payout,
    )
}

pub fn transaction_detail(tx: &Transaction) {
    println!("{}", transaction_line(tx));
    println!("  fee percent: {}", tx.platform_fee_percent);
    println!(
        "  npr: paid {} fee {} teacher {}",
        tx.amount_paid_npr, tx.platform_fee_amount_npr, tx.teacher_amount_npr
    );
    if let (Some(deduction), Some(refund)) = (tx.revert_deduction_amount, tx.revert_refund_amount)
    {
        println!("  reverted: deduction {deduction} refund {refund}");
    }
    if let Some(note) = &tx.note {
        println!("  note: {}", note.replace('\n', " | "));
    }
    for entry in &tx.exchange_rate_history {
        println!(
            "  #{} {} rate {} amount {} by {}{}",
            entry.seq,
            entry.at.to_rfc3339(),
            entry.rate,
            entry.payout_amount,
            entry.admin_id,
            entry
                .note
                .as_deref()
                .map(|n| format!(" ({n})"))
                .unwrap_or_default(),
        );
    }
}

pub fn complaint_line(c: &PaymentComplaint) -> String {
    let resolution = c
        .resolution
        .map(|r| format!(" -> {}", r.as_str()))
        .unwrap_or_default();
    format!(
        "{} {}{} tx={} by {} ({}) \"{}\" proofs={} admin_proofs={}",
        c.id,
        c.status,
        resolution,
        c.transaction_id,
        c.raised_by,
        c.role.as_str(),
        c.reason,
        c.proof_urls.len(),
        c.proof_submitted_by_admin.len(),
    )
}

pub fn config(config: &PlatformConfig) {
    println!("platform fee: {}", config.platform_fee_percent);
    println!("currencies:");
    for rate in config.currency_rates.iter() {
        println!(
            "  {} buy {} sell {}",
            rate.code, rate.buy_to_usd, rate.sell_to_usd
        );
    }
    println!("countries:");
    for country in &config.countries {
        let currency = country
            .currency
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!("  {} {} {currency}", country.code, country.name);
    }
    println!("payment details:");
    for detail in &config.payment_details {
        println!(
            "  {} {} {} {} {}",
            detail.id, detail.method, detail.account_name, detail.account_number, detail.currency
        );
    }
}

pub fn earnings(summary: &EarningsSummary) {
    println!(
        "transactions: {} (paid out {}, pending {}, reverted {})",
        summary.transactions, summary.paid_out_count, summary.pending_count, summary.reverted_count
    );
    println!(
        "NPR gross {} fee {} teacher {} (paid out {}, pending {})",
        summary.gross_npr,
        summary.platform_fee_npr,
        summary.teacher_amount_npr,
        summary.paid_out_npr,
        summary.pending_npr
    );
    for totals in &summary.by_payer_currency {
        println!(
            "  {}: {} tx, paid {} fee {} teacher {} refunded {}",
            totals.currency,
            totals.transactions,
            totals.amount_paid,
            totals.platform_fee,
            totals.teacher_amount,
            totals.refunded
        );
    }
}

#[derive(Serialize)]
struct ExportRow<'a> {
    id: String,
    session_id: &'a str,
    status: &'a str,
    created_at: String,
    learner_id: &'a str,
    teacher_id: &'a str,
    payer_currency: &'a str,
    amount_paid: String,
    platform_fee_percent: String,
    platform_fee: String,
    teacher_amount: String,
    amount_paid_npr: String,
    platform_fee_npr: String,
    teacher_amount_npr: String,
    payout_currency: &'a str,
    exchange_rate: Option<String>,
    payout_amount: Option<String>,
    paid_to_teacher_at: Option<String>,
    reverted_at: Option<String>,
    revert_refund: Option<String>,
}

/// Writes transactions as CSV, one row per transaction.
pub fn write_csv<W: Write>(out: W, txs: &[Transaction]) -> CliResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    for tx in txs {
        writer.serialize(ExportRow {
            id: tx.id.to_string(),
            session_id: &tx.session_id,
            status: tx.status.as_str(),
            created_at: tx.created_at.to_rfc3339(),
            learner_id: &tx.learner_id,
            teacher_id: &tx.teacher_id,
            payer_currency: tx.payer_currency.as_str(),
            amount_paid: tx.amount_paid.to_string(),
            platform_fee_percent: tx.platform_fee_percent.value().to_string(),
            platform_fee: tx.platform_fee_amount.to_string(),
            teacher_amount: tx.teacher_amount.to_string(),
            amount_paid_npr: tx.amount_paid_npr.to_string(),
            platform_fee_npr: tx.platform_fee_amount_npr.to_string(),
            teacher_amount_npr: tx.teacher_amount_npr.to_string(),
            payout_currency: tx.payout_currency.as_str(),
            exchange_rate: tx.exchange_rate.map(|r| r.to_string()),
            payout_amount: tx.payout_amount.map(|a| a.to_string()),
            paid_to_teacher_at: tx.paid_to_teacher_at.map(|t| t.to_rfc3339()),
            reverted_at: tx.reverted_at.map(|t| t.to_rfc3339()),
            revert_refund: tx.revert_refund_amount.map(|a| a.to_string()),
        })?;
    }
    writer.flush()?;
    Ok(())
}
