use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::domain::{
    customer::{Customer, CustomerError, CustomerRepository, CustomerStatus, Gender, IdType},
    transaction::{TransactionData, TransactionError, TransactionRepository},
    CustomerNumber, DataAccessError, Entity,
};

/// 起動時に構築し、以後変更しない顧客テーブル
#[derive(Clone, Default)]
pub struct InMemoryCustomerRepository {
    customers: Arc<HashMap<CustomerNumber, Customer>>,
}

impl InMemoryCustomerRepository {
    pub fn new(customers: HashMap<CustomerNumber, Customer>) -> Self {
        Self {
            customers: Arc::new(customers),
        }
    }

    /// モックデータで初期化する。タイムスタンプ系の項目には `now` を使う。
    pub fn with_mock_data(now: DateTime<Utc>) -> Result<Self, CustomerError> {
        let customers = mock_customers(now)?
            .into_iter()
            .map(|(key, customer)| (CustomerNumber::from(key), customer))
            .collect();
        Ok(Self::new(customers))
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_customer_number(
        &self,
        number: &CustomerNumber,
    ) -> Result<Option<Customer>, DataAccessError> {
        let found = self.customers.get(number).cloned();
        debug!(
            entity = Customer::ENTITY_NAME,
            customer_number = %number,
            hit = found.is_some(),
            "テーブル検索"
        );
        Ok(found)
    }
}

/// 起動時に構築し、以後変更しない取引データテーブル
#[derive(Clone, Default)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<HashMap<CustomerNumber, Vec<TransactionData>>>,
}

impl InMemoryTransactionRepository {
    pub fn new(transactions: HashMap<CustomerNumber, Vec<TransactionData>>) -> Self {
        Self {
            transactions: Arc::new(transactions),
        }
    }

    pub fn with_mock_data(now: DateTime<Utc>) -> Result<Self, TransactionError> {
        let transactions = mock_transactions(now)?
            .into_iter()
            .map(|(key, records)| (CustomerNumber::from(key), records))
            .collect();
        Ok(Self::new(transactions))
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn find_by_customer_number(
        &self,
        number: &CustomerNumber,
    ) -> Result<Vec<TransactionData>, DataAccessError> {
        let found = self.transactions.get(number).cloned().unwrap_or_default();
        debug!(
            entity = TransactionData::ENTITY_NAME,
            customer_number = %number,
            count = found.len(),
            "テーブル検索"
        );
        Ok(found)
    }
}

fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate, CustomerError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(CustomerError::DateIsInvalid)
}

fn mock_customer(
    now: DateTime<Utc>,
    customer_number: &str,
    id: i64,
    dob: NaiveDate,
    monthly_income: f64,
) -> Result<Customer, CustomerError> {
    Customer::builder(customer_number)
        .created_at(now)
        .created_date(now)
        .dob(dob)
        .email("john.doe@example.com")
        .first_name("John")
        .gender(Gender::Male)
        .id(id)
        .id_number(customer_number)
        .id_type(IdType::NationalId)
        .last_name("Doe")
        .mobile("+255123456789")
        .monthly_income(monthly_income)
        .status(CustomerStatus::Active)
        .updated_at(now)
        .build()
}

fn mock_customers(now: DateTime<Utc>) -> Result<Vec<(&'static str, Customer)>, CustomerError> {
    // 234774784 の顧客番号・本人確認番号は既存のモックデータに合わせて別の値を保持する
    let first = Customer::builder("CUST1001")
        .created_at(now)
        .created_date(now)
        .dob(date(1985, 5, 20)?)
        .email("john.doe@example.com")
        .first_name("John")
        .gender(Gender::Male)
        .id(1001)
        .id_number("A12345678")
        .id_type(IdType::NationalId)
        .last_name("Doe")
        .mobile("+255123456789")
        .monthly_income(2500.00)
        .status(CustomerStatus::Active)
        .updated_at(now)
        .build()?;
    Ok(vec![
        ("234774784", first),
        (
            "318411216",
            mock_customer(now, "318411216", 1002, date(2001, 1, 2)?, 500.00)?,
        ),
        (
            "340397370",
            mock_customer(now, "340397370", 1003, date(1999, 9, 20)?, 5000.00)?,
        ),
        (
            "366585630",
            mock_customer(now, "366585630", 1004, date(2009, 9, 20)?, 2000.00)?,
        ),
        (
            "397178638",
            mock_customer(now, "397178638", 1005, date(2000, 3, 20)?, 2000.00)?,
        ),
    ])
}

/// 全カテゴリに同じ傾向の値を入れた取引データ
fn mock_transaction(
    now: DateTime<Utc>,
    id: i64,
    account_number: &str,
    transaction_value: f64,
    monthly_balance: f64,
) -> Result<TransactionData, TransactionError> {
    let base = TransactionData::new(account_number)?;
    let scale = transaction_value / 3500.0;
    Ok(TransactionData {
        alternative_channel_credit_amount: 562_235.0 * scale,
        alternative_channel_credit_number: 0,
        alternative_channel_debit_amount: 978_388.0 * scale,
        alternative_channel_debit_number: 4_100,
        atm_transactions_number: 6_563,
        atm_transactions_amount: 1_200.0 * scale,
        bounced_cheques_debit_number: 2,
        bounced_cheques_credit_number: 0,
        bounced_cheque_credit_amount: 748_575.0 * scale,
        bounced_cheque_debit_amount: 43_417.0 * scale,
        cheque_debit_transactions_amount: 4_352_345.0 * scale,
        cheque_debit_transactions_number: 5,
        created_at: Some(now),
        created_date: Some(now),
        credit_transactions_amount: 0.0,
        debit_card_pos_transactions_amount: 35_000.0 * scale,
        debit_card_pos_transactions_number: 4_454,
        incoming_local_credit_amount: 0.0,
        id: Some(id),
        incoming_international_credit_amount: 0.0,
        incoming_international_credit_number: 0,
        incoming_local_credit_number: 74,
        interest_amount: 22.0,
        last_transaction_date: Some(now - Duration::days(1)),
        last_transaction_type: Some("ATM".to_owned()),
        last_transaction_value: 3_500.0 * scale,
        max_atm_transactions: 0.0,
        max_monthly_debit_transactions: 534_555.0 * scale,
        max_alternative_channel_credit: 0.0,
        max_alternative_channel_debit: 0.0,
        max_bounced_cheque_credit: 0.0,
        max_cheque_debit_transactions: 0.0,
        max_debit_card_pos_transactions: 5_468_645_372.0 * scale,
        max_incoming_international_credit: 0.0,
        max_incoming_local_credit: 0.0,
        max_mobile_money_credit: 0.0,
        max_mobile_money_debit: 0.0,
        max_monthly_credit_transactions: 0.0,
        max_outgoing_international_debit: 0.0,
        max_outgoing_local_debit: 0.0,
        max_over_the_counter_withdrawals: 6_533_362.0 * scale,
        min_atm_transactions: 0.0,
        min_monthly_debit_transactions: 0.0,
        min_alternative_channel_credit: 0.0,
        min_alternative_channel_debit: 0.0,
        min_bounced_cheque_credit: 0.0,
        min_cheque_debit_transactions: 0.0,
        min_debit_card_pos_transactions: 0.0,
        min_incoming_international_credit: 0.0,
        min_incoming_local_credit: 0.0,
        min_mobile_money_credit: 0.0,
        min_mobile_money_debit: 0.0,
        min_monthly_credit_transactions: 29_961.0 * scale,
        min_outgoing_international_debit: 0.0,
        min_outgoing_local_debit: 0.0,
        min_over_the_counter_withdrawals: 0.0,
        mobile_money_credit_amount: 0.0,
        mobile_money_credit_number: 946_455,
        mobile_money_debit_amount: 0.0,
        mobile_money_debit_number: 5_523,
        monthly_balance,
        monthly_debit_transactions_amount: 103_235.0 * scale,
        outgoing_international_debit_amount: 5_436.0 * scale,
        outgoing_international_debit_number: 466,
        outgoing_local_debit_amount: 6_261.0 * scale,
        outgoing_local_debit_number: 0,
        overdraft_limit: 7.0,
        over_the_counter_withdrawals_amount: 943_455.0 * scale,
        over_the_counter_withdrawals_number: 4_525_252,
        transaction_value,
        updated_at: Some(now),
        ..base
    })
}

fn mock_transactions(
    now: DateTime<Utc>,
) -> Result<Vec<(&'static str, Vec<TransactionData>)>, TransactionError> {
    Ok(vec![
        (
            "234774784",
            vec![mock_transaction(
                now,
                1,
                "332216783322167555621628",
                3_500.0,
                6_788.0,
            )?],
        ),
        (
            "318411216",
            vec![
                mock_transaction(now, 2, "318411216000000000000001", 1_200.0, 2_500.0)?,
                mock_transaction(now, 3, "318411216000000000000002", 800.0, 150.0)?,
            ],
        ),
        (
            "340397370",
            vec![mock_transaction(
                now,
                4,
                "340397370000000000000001",
                7_000.0,
                12_000.0,
            )?],
        ),
        (
            "366585630",
            vec![mock_transaction(
                now,
                5,
                "366585630000000000000001",
                2_000.0,
                4_000.0,
            )?],
        ),
        ("397178638", Vec::new()),
    ])
}
