use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlatformSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlatformSettings::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PlatformSettings::PlatformFeePercent)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlatformSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CurrencyRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CurrencyRates::Code)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CurrencyRates::BuyToUsd).string().not_null())
                    .col(ColumnDef::new(CurrencyRates::SellToUsd).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Countries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Countries::Code)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Countries::Name).string().not_null())
                    .col(ColumnDef::new(Countries::CurrencyCode).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaymentDetails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentDetails::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentDetails::Method).string().not_null())
                    .col(ColumnDef::new(PaymentDetails::AccountName).string().not_null())
                    .col(ColumnDef::new(PaymentDetails::AccountNumber).string().not_null())
                    .col(ColumnDef::new(PaymentDetails::Currency).string().not_null())
                    .col(ColumnDef::new(PaymentDetails::Instructions).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::SessionId).string().not_null())
                    .col(ColumnDef::new(Transactions::LearnerId).string().not_null())
                    .col(ColumnDef::new(Transactions::TeacherId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountPaidMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::PayerCurrency).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::PlatformFeePercent)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::PlatformFeeMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TeacherAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::PayoutCurrency).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountPaidNprMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::PlatformFeeNprMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TeacherAmountNprMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::ExchangeRate).string())
                    .col(ColumnDef::new(Transactions::PayoutAmountMinor).big_integer())
                    .col(ColumnDef::new(Transactions::Status).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::PaidAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::PaidToTeacherAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::RevertedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::RevertDeductionMinor).big_integer())
                    .col(ColumnDef::new(Transactions::RevertRefundMinor).big_integer())
                    .col(ColumnDef::new(Transactions::Note).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-session_id-unique")
                    .table(Transactions::Table)
                    .col(Transactions::SessionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-created_at")
                    .table(Transactions::Table)
                    .col(Transactions::CreatedAt)
                    .col(Transactions::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-status")
                    .table(Transactions::Table)
                    .col(Transactions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExchangeRateHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExchangeRateHistory::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExchangeRateHistory::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExchangeRateHistory::Seq).integer().not_null())
                    .col(
                        ColumnDef::new(ExchangeRateHistory::At)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExchangeRateHistory::Rate).string().not_null())
                    .col(
                        ColumnDef::new(ExchangeRateHistory::PayoutAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExchangeRateHistory::Note).string())
                    .col(ColumnDef::new(ExchangeRateHistory::AdminId).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-exchange_rate_history-transaction_id")
                            .from(ExchangeRateHistory::Table, ExchangeRateHistory::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-exchange_rate_history-transaction_id-seq-unique")
                    .table(ExchangeRateHistory::Table)
                    .col(ExchangeRateHistory::TransactionId)
                    .col(ExchangeRateHistory::Seq)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaymentComplaints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentComplaints::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentComplaints::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentComplaints::RaisedBy).string().not_null())
                    .col(ColumnDef::new(PaymentComplaints::Role).string().not_null())
                    .col(ColumnDef::new(PaymentComplaints::Reason).string().not_null())
                    .col(ColumnDef::new(PaymentComplaints::ProofUrls).string().not_null())
                    .col(ColumnDef::new(PaymentComplaints::Status).string().not_null())
                    .col(ColumnDef::new(PaymentComplaints::AdminNotes).string())
                    .col(
                        ColumnDef::new(PaymentComplaints::ProofSubmittedByAdmin)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentComplaints::Resolution).string())
                    .col(ColumnDef::new(PaymentComplaints::RevertDeductionMinor).big_integer())
                    .col(
                        ColumnDef::new(PaymentComplaints::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentComplaints::ResolvedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(PaymentComplaints::ResolvedBy).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payment_complaints-transaction_id")
                            .from(PaymentComplaints::Table, PaymentComplaints::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payment_complaints-transaction_id-status")
                    .table(PaymentComplaints::Table)
                    .col(PaymentComplaints::TransactionId)
                    .col(PaymentComplaints::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentComplaints::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExchangeRateHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentDetails::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Countries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CurrencyRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlatformSettings::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum PlatformSettings {
    Table,
    Id,
    PlatformFeePercent,
    UpdatedAt,
}

#[derive(Iden)]
pub enum CurrencyRates {
    Table,
    Code,
    BuyToUsd,
    SellToUsd,
}

#[derive(Iden)]
pub enum Countries {
    Table,
    Code,
    Name,
    CurrencyCode,
}

#[derive(Iden)]
pub enum PaymentDetails {
    Table,
    Id,
    Method,
    AccountName,
    AccountNumber,
    Currency,
    Instructions,
}

#[derive(Iden)]
pub enum Transactions {
    Table,
    Id,
    SessionId,
    LearnerId,
    TeacherId,
    AmountPaidMinor,
    PayerCurrency,
    PlatformFeePercent,
    PlatformFeeMinor,
    TeacherAmountMinor,
    PayoutCurrency,
    AmountPaidNprMinor,
    PlatformFeeNprMinor,
    TeacherAmountNprMinor,
    ExchangeRate,
    PayoutAmountMinor,
    Status,
    CreatedAt,
    PaidAt,
    PaidToTeacherAt,
    RevertedAt,
    RevertDeductionMinor,
    RevertRefundMinor,
    Note,
}

#[derive(Iden)]
pub enum ExchangeRateHistory {
    Table,
    Id,
    TransactionId,
    Seq,
    At,
    Rate,
    PayoutAmountMinor,
    Note,
    AdminId,
}

#[derive(Iden)]
pub enum PaymentComplaints {
    Table,
    Id,
    TransactionId,
    RaisedBy,
    Role,
    Reason,
    ProofUrls,
    Status,
    AdminNotes,
    ProofSubmittedByAdmin,
    Resolution,
    RevertDeductionMinor,
    CreatedAt,
    ResolvedAt,
    ResolvedBy,
}
