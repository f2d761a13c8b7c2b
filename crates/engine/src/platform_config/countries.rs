use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{CurrencyCode, EngineError, ResultEngine};

use super::Country;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "countries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub name: String,
    pub currency_code: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Country> for ActiveModel {
    fn from(country: &Country) -> Self {
        Self {
            code: ActiveValue::Set(country.code.clone()),
            name: ActiveValue::Set(country.name.clone()),
            currency_code: ActiveValue::Set(country.currency.as_ref().map(ToString::to_string)),
        }
    }
}

impl TryFrom<Model> for Country {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            code: model.code,
            name: model.name,
            currency: model
                .currency_code
                .as_deref()
                .map(CurrencyCode::parse)
                .transpose()?,
        })
    }
}
