pub mod customer;
pub mod transaction;

use std::error::Error;

use derive_more::{AsRef, Deref, Display, From};
use thiserror::Error;

/// エンティティ
pub trait Entity {
    const ENTITY_NAME: &'static str;
}

/// 顧客番号
///
/// 完全一致でのみ比較する。前後の空白除去や大文字小文字の正規化は行わない。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Display, From, Deref, AsRef)]
pub struct CustomerNumber(String);

impl CustomerNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CustomerNumber {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Error, Debug)]
pub enum DataAccessError {
    #[error("Data read error: {0}")]
    ReadError(Box<dyn Error + Send + Sync>),
}
