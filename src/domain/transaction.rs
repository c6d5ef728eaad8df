use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};

use crate::domain::{CustomerNumber, DataAccessError, Entity};

/// 口座番号の最大桁数
pub const ACCOUNT_NUMBER_MAX_LEN: usize = 24;

/// 取引データリポジトリ
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// 顧客番号に紐づく取引データを登録順で返す
    async fn find_by_customer_number(
        &self,
        number: &CustomerNumber,
    ) -> Result<Vec<TransactionData>, DataAccessError>;
}

/// 取引データの全フィールドを `フィールド名: 型 => "電文上の要素名"` の形で
/// 受け取ったマクロへ渡す。
///
/// 電文上の要素名は既存スキーマの綴りをそのまま保持している
/// (`upDatedAt`, `maxMonthlyBebitTransactions`, `intrestAmount` など)。
macro_rules! transaction_data_fields {
    ($callback:ident ! ( $($prefix:tt)* )) => {
        $callback! {
            $($prefix)* {
                account_number: String => "accountNumber",
                alternative_channel_credit_amount: f64 => "alternativechanneltrnscrAmount",
                alternative_channel_credit_number: i64 => "alternativechanneltrnscrNumber",
                alternative_channel_debit_amount: f64 => "alternativechanneltrnsdebitAmount",
                alternative_channel_debit_number: i64 => "alternativechanneltrnsdebitNumber",
                atm_transactions_number: i64 => "atmTransactionsNumber",
                atm_transactions_amount: f64 => "atmtransactionsAmount",
                bounced_cheques_debit_number: i64 => "bouncedChequesDebitNumber",
                bounced_cheques_credit_number: i64 => "bouncedchequescreditNumber",
                bounced_cheque_credit_amount: f64 => "bouncedchequetransactionscrAmount",
                bounced_cheque_debit_amount: f64 => "bouncedchequetransactionsdrAmount",
                cheque_debit_transactions_amount: f64 => "chequeDebitTransactionsAmount",
                cheque_debit_transactions_number: i64 => "chequeDebitTransactionsNumber",
                created_at: Option<DateTime<Utc>> => "createdAt",
                created_date: Option<DateTime<Utc>> => "createdDate",
                credit_transactions_amount: f64 => "credittransactionsAmount",
                debit_card_pos_transactions_amount: f64 => "debitcardpostransactionsAmount",
                debit_card_pos_transactions_number: i64 => "debitcardpostransactionsNumber",
                incoming_local_credit_amount: f64 => "fincominglocaltransactioncrAmount",
                id: Option<i64> => "id",
                incoming_international_credit_amount: f64 => "incominginternationaltrncrAmount",
                incoming_international_credit_number: i64 => "incominginternationaltrncrNumber",
                incoming_local_credit_number: i64 => "incominglocaltransactioncrNumber",
                interest_amount: f64 => "intrestAmount",
                last_transaction_date: Option<DateTime<Utc>> => "lastTransactionDate",
                last_transaction_type: Option<String> => "lastTransactionType",
                last_transaction_value: f64 => "lastTransactionValue",
                max_atm_transactions: f64 => "maxAtmTransactions",
                max_monthly_debit_transactions: f64 => "maxMonthlyBebitTransactions",
                max_alternative_channel_credit: f64 => "maxalternativechanneltrnscr",
                max_alternative_channel_debit: f64 => "maxalternativechanneltrnsdebit",
                max_bounced_cheque_credit: f64 => "maxbouncedchequetransactionscr",
                max_cheque_debit_transactions: f64 => "maxchequedebittransactions",
                max_debit_card_pos_transactions: f64 => "maxdebitcardpostransactions",
                max_incoming_international_credit: f64 => "maxincominginternationaltrncr",
                max_incoming_local_credit: f64 => "maxincominglocaltransactioncr",
                max_mobile_money_credit: f64 => "maxmobilemoneycredittrn",
                max_mobile_money_debit: f64 => "maxmobilemoneydebittransaction",
                max_monthly_credit_transactions: f64 => "maxmonthlycredittransactions",
                max_outgoing_international_debit: f64 => "maxoutgoinginttrndebit",
                max_outgoing_local_debit: f64 => "maxoutgoinglocaltrndebit",
                max_over_the_counter_withdrawals: f64 => "maxoverthecounterwithdrawals",
                min_atm_transactions: f64 => "minAtmTransactions",
                min_monthly_debit_transactions: f64 => "minMonthlyDebitTransactions",
                min_alternative_channel_credit: f64 => "minalternativechanneltrnscr",
                min_alternative_channel_debit: f64 => "minalternativechanneltrnsdebit",
                min_bounced_cheque_credit: f64 => "minbouncedchequetransactionscr",
                min_cheque_debit_transactions: f64 => "minchequedebittransactions",
                min_debit_card_pos_transactions: f64 => "mindebitcardpostransactions",
                min_incoming_international_credit: f64 => "minincominginternationaltrncr",
                min_incoming_local_credit: f64 => "minincominglocaltransactioncr",
                min_mobile_money_credit: f64 => "minmobilemoneycredittrn",
                min_mobile_money_debit: f64 => "minmobilemoneydebittransaction",
                min_monthly_credit_transactions: f64 => "minmonthlycredittransactions",
                min_outgoing_international_debit: f64 => "minoutgoinginttrndebit",
                min_outgoing_local_debit: f64 => "minoutgoinglocaltrndebit",
                min_over_the_counter_withdrawals: f64 => "minoverthecounterwithdrawals",
                mobile_money_credit_amount: f64 => "mobilemoneycredittransactionAmount",
                mobile_money_credit_number: i64 => "mobilemoneycredittransactionNumber",
                mobile_money_debit_amount: f64 => "mobilemoneydebittransactionAmount",
                mobile_money_debit_number: i64 => "mobilemoneydebittransactionNumber",
                monthly_balance: f64 => "monthlyBalance",
                monthly_debit_transactions_amount: f64 => "monthlydebittransactionsAmount",
                outgoing_international_debit_amount: f64 => "outgoinginttransactiondebitAmount",
                outgoing_international_debit_number: i64 => "outgoinginttrndebitNumber",
                outgoing_local_debit_amount: f64 => "outgoinglocaltransactiondebitAmount",
                outgoing_local_debit_number: i64 => "outgoinglocaltransactiondebitNumber",
                overdraft_limit: f64 => "overdraftLimit",
                over_the_counter_withdrawals_amount: f64 => "overthecounterwithdrawalsAmount",
                over_the_counter_withdrawals_number: i64 => "overthecounterwithdrawalsNumber",
                transaction_value: f64 => "transactionValue",
                updated_at: Option<DateTime<Utc>> => "upDatedAt",
            }
        }
    };
}

pub(crate) use transaction_data_fields;

macro_rules! declare_transaction_data {
    ($name:ident { $($field:ident : $ty:ty => $wire:literal),* $(,)? }) => {
        /// 取引データ
        ///
        /// 1口座分の取引集計値。カテゴリ別の件数・金額と最小値/最大値を持つ。
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $(pub(crate) $field: $ty,)*
        }

        impl $name {
            fn zeroed() -> Self {
                Self {
                    $($field: Default::default(),)*
                }
            }

            $(
                pub fn $field(&self) -> &$ty {
                    &self.$field
                }
            )*
        }
    };
}

transaction_data_fields!(declare_transaction_data!(TransactionData));

impl TransactionData {
    /// 口座番号のみ設定し、その他を0または未設定で生成する
    pub fn new(account_number: impl Into<String>) -> Result<Self, TransactionError> {
        let data = Self {
            account_number: account_number.into(),
            ..Self::zeroed()
        };
        data.validate()?;
        Ok(data)
    }

    /// 口座番号は最大24文字
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.account_number.chars().count() > ACCOUNT_NUMBER_MAX_LEN {
            return Err(TransactionError::AccountNumberTooLong);
        }
        Ok(())
    }
}

impl Entity for TransactionData {
    const ENTITY_NAME: &'static str = "transaction_data";
}

/// 取引照会サービス
#[derive(Clone)]
pub struct TransactionService {
    repository: Arc<dyn TransactionRepository>,
}

impl TransactionService {
    pub fn new(repository: Arc<dyn TransactionRepository>) -> Self {
        Self { repository }
    }

    /// 該当なしの場合は空のリストを返す
    pub async fn transactions(
        &self,
        number: &CustomerNumber,
    ) -> Result<Vec<TransactionData>, DataAccessError> {
        self.repository.find_by_customer_number(number).await
    }
}

/// 取引データエラー
#[derive(Error, Display, Debug, PartialEq, Eq)]
pub enum TransactionError {
    #[display(fmt = "Account number must be at most 24 characters")]
    AccountNumberTooLong,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MapRepository(HashMap<CustomerNumber, Vec<TransactionData>>);

    #[async_trait]
    impl TransactionRepository for MapRepository {
        async fn find_by_customer_number(
            &self,
            number: &CustomerNumber,
        ) -> Result<Vec<TransactionData>, DataAccessError> {
            Ok(self.0.get(number).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_new_zeroes_everything_but_account_number() {
        let data = TransactionData::new("123").unwrap();
        assert_eq!(data.account_number, "123");
        assert_eq!(data.transaction_value, 0.0);
        assert_eq!(data.atm_transactions_number, 0);
        assert_eq!(data.last_transaction_type, None);
        assert_eq!(data.updated_at, None);
    }

    #[test]
    fn test_account_number_length() {
        assert!(TransactionData::new("332216783322167555621628").is_ok());
        assert_eq!(
            TransactionData::new("3322167833221675556216281"),
            Err(TransactionError::AccountNumberTooLong)
        );
    }

    #[test]
    fn test_validate_checks_account_number_after_construction() {
        let mut data = TransactionData::new("332216783322167555621628").unwrap();
        assert_eq!(data.validate(), Ok(()));
        data.account_number.push('9');
        assert_eq!(data.validate(), Err(TransactionError::AccountNumberTooLong));
    }

    #[test]
    fn test_getters() {
        let data = TransactionData {
            id: Some(7),
            interest_amount: 22.0,
            ..TransactionData::new("A").unwrap()
        };
        assert_eq!(data.account_number(), "A");
        assert_eq!(data.id(), &Some(7));
        assert_eq!(*data.interest_amount(), 22.0);
        assert_eq!(TransactionData::ENTITY_NAME, "transaction_data");
    }

    #[tokio::test]
    async fn test_service_keeps_order_and_defaults_to_empty() {
        let first = TransactionData {
            transaction_value: 1.0,
            ..TransactionData::new("A").unwrap()
        };
        let second = TransactionData {
            transaction_value: 2.0,
            ..TransactionData::new("B").unwrap()
        };
        let repository = MapRepository(HashMap::from([(
            CustomerNumber::from("1"),
            vec![first.clone(), second.clone()],
        )]));
        let service = TransactionService::new(Arc::new(repository));
        assert_eq!(
            service.transactions(&"1".into()).await.unwrap(),
            vec![first, second]
        );
        assert!(service.transactions(&"2".into()).await.unwrap().is_empty());
    }
}
