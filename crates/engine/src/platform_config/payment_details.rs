use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{CurrencyCode, EngineError, ResultEngine, util::parse_uuid};

use super::PaymentDetail;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub method: String,
    pub account_name: String,
    pub account_number: String,
    pub currency: String,
    pub instructions: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PaymentDetail> for ActiveModel {
    fn from(detail: &PaymentDetail) -> Self {
        Self {
            id: ActiveValue::Set(detail.id.to_string()),
            method: ActiveValue::Set(detail.method.clone()),
            account_name: ActiveValue::Set(detail.account_name.clone()),
            account_number: ActiveValue::Set(detail.account_number.clone()),
            currency: ActiveValue::Set(detail.currency.to_string()),
            instructions: ActiveValue::Set(detail.instructions.clone()),
        }
    }
}

impl TryFrom<Model> for PaymentDetail {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "payment detail")?,
            method: model.method,
            account_name: model.account_name,
            account_number: model.account_number,
            currency: CurrencyCode::parse(&model.currency)?,
            instructions: model.instructions,
        })
    }
}
