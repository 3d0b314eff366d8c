use super::repo::{exec, query_one};
use super::Store;
use crate::error::{ChatError, ChatResult};
use crate::money::Money;
use crate::types::UserModel;

/// Per-model price table entry: micro-units per million tokens, input and
/// output priced independently. A snapshot taken at accounting time stays
/// valid forever; historical costs never re-derive from a mutated table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceConfig {
    pub input_per_million: Money,
    pub output_per_million: Money,
}

/// Read-mostly model configuration: the price table plus per-user model
/// bindings used for request validation.
#[derive(Clone)]
pub struct ModelCatalog {
    store: Store,
}

impl ModelCatalog {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn price(&self, model_id: &str) -> ChatResult<PriceConfig> {
        let conn = self.store.conn()?;
        query_one(
            &conn,
            "SELECT input_per_million, output_per_million FROM model_prices WHERE model_id = ?1",
            &[&model_id],
            |row| {
                Ok(PriceConfig {
                    input_per_million: Money::from_micros(row.get(0)?),
                    output_per_million: Money::from_micros(row.get(1)?),
                })
            },
        )?
        .ok_or_else(|| ChatError::InvalidConfig(format!("no price entry for model {}", model_id)))
    }

    pub fn upsert_price(&self, model_id: &str, price: PriceConfig) -> ChatResult<()> {
        let conn = self.store.conn()?;
        exec(
            &conn,
            "INSERT INTO model_prices (model_id, input_per_million, output_per_million)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(model_id) DO UPDATE SET
                 input_per_million = excluded.input_per_million,
                 output_per_million = excluded.output_per_million",
            &[
                &model_id,
                &price.input_per_million.micros(),
                &price.output_per_million.micros(),
            ],
        )?;
        Ok(())
    }

    pub fn user_model(&self, user_id: &str, model_id: &str) -> ChatResult<Option<UserModel>> {
        let conn = self.store.conn()?;
        query_one(
            &conn,
            "SELECT enabled, max_tokens, temperature_min, temperature_max
             FROM user_models WHERE user_id = ?1 AND model_id = ?2",
            &[&user_id, &model_id],
            |row| {
                Ok(UserModel {
                    user_id: user_id.to_string(),
                    model_id: model_id.to_string(),
                    enabled: row.get::<_, i64>(0)? != 0,
                    max_tokens: row.get::<_, Option<i64>>(1)?.map(|v| v as u32),
                    temperature_min: row.get(2)?,
                    temperature_max: row.get(3)?,
                })
            },
        )
    }

    pub fn upsert_user_model(&self, binding: &UserModel) -> ChatResult<()> {
        let conn = self.store.conn()?;
        exec(
            &conn,
            "INSERT INTO user_models
                 (user_id, model_id, enabled, max_tokens, temperature_min, temperature_max)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, model_id) DO UPDATE SET
                 enabled = excluded.enabled,
                 max_tokens = excluded.max_tokens,
                 temperature_min = excluded.temperature_min,
                 temperature_max = excluded.temperature_max",
            &[
                &binding.user_id,
                &binding.model_id,
                &(binding.enabled as i64),
                &binding.max_tokens.map(|v| v as i64),
                &binding.temperature_min,
                &binding.temperature_max,
            ],
        )?;
        Ok(())
    }
}
