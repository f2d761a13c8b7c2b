use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{
    CurrencyCode, CurrencyRate, EngineError, ResultEngine, util::parse_decimal,
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "currency_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub buy_to_usd: String,
    pub sell_to_usd: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CurrencyRate> for ActiveModel {
    fn from(rate: &CurrencyRate) -> Self {
        Self {
            code: ActiveValue::Set(rate.code.to_string()),
            buy_to_usd: ActiveValue::Set(rate.buy_to_usd.to_string()),
            sell_to_usd: ActiveValue::Set(rate.sell_to_usd.to_string()),
        }
    }
}

impl TryFrom<Model> for CurrencyRate {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let buy = parse_decimal(&model.buy_to_usd, "buy rate")?;
        let sell = parse_decimal(&model.sell_to_usd, "sell rate")?;
        CurrencyRate::new(CurrencyCode::parse(&model.code)?, buy, Some(sell))
    }
}
