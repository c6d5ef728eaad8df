use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use derive_more::{Display, Error};

use crate::domain::{CustomerNumber, DataAccessError, Entity};

/// 顧客リポジトリ
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// 顧客番号で検索する
    async fn find_by_customer_number(
        &self,
        number: &CustomerNumber,
    ) -> Result<Option<Customer>, DataAccessError>;
}

/// 性別
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const VALUES: &'static [&'static str] = &["MALE", "FEMALE"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
        }
    }
}

/// 本人確認書類の種別
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IdType {
    Passport,
    NationalId,
    DriversLicense,
    VotersId,
}

impl IdType {
    pub const VALUES: &'static [&'static str] =
        &["PASSPORT", "NATIONAL_ID", "DRIVERS_LICENSE", "VOTERS_ID"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passport => "PASSPORT",
            Self::NationalId => "NATIONAL_ID",
            Self::DriversLicense => "DRIVERS_LICENSE",
            Self::VotersId => "VOTERS_ID",
        }
    }
}

/// 顧客ステータス
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CustomerStatus {
    Active,
    Inactive,
}

impl CustomerStatus {
    pub const VALUES: &'static [&'static str] = &["ACTIVE", "INACTIVE"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

macro_rules! impl_enum_text {
    ($($ty:ident { $($text:literal => $variant:ident),+ $(,)? }),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = CustomerError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    match s {
                        $($text => Ok(Self::$variant),)+
                        _ => Err(CustomerError::UnknownEnumValue),
                    }
                }
            }
        )+
    };
}

impl_enum_text! {
    Gender { "MALE" => Male, "FEMALE" => Female },
    IdType {
        "PASSPORT" => Passport,
        "NATIONAL_ID" => NationalId,
        "DRIVERS_LICENSE" => DriversLicense,
        "VOTERS_ID" => VotersId,
    },
    CustomerStatus { "ACTIVE" => Active, "INACTIVE" => Inactive },
}

/// 顧客エンティティ
///
/// 静的テーブルに定義された後は変更されない。生成は [`CustomerBuilder`] を使う。
#[derive(Clone, Debug, PartialEq)]
pub struct Customer {
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) created_date: Option<DateTime<Utc>>,
    pub(crate) customer_number: CustomerNumber,
    pub(crate) dob: Option<NaiveDate>,
    pub(crate) email: Option<String>,
    pub(crate) first_name: Option<String>,
    pub(crate) gender: Option<Gender>,
    pub(crate) id: Option<i64>,
    pub(crate) id_number: Option<String>,
    pub(crate) id_type: Option<IdType>,
    pub(crate) last_name: Option<String>,
    pub(crate) middle_name: Option<String>,
    pub(crate) mobile: Option<String>,
    pub(crate) monthly_income: f64,
    pub(crate) status: Option<CustomerStatus>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn builder(customer_number: impl Into<CustomerNumber>) -> CustomerBuilder {
        CustomerBuilder::default().customer_number(customer_number)
    }

    /// 該当顧客なしの場合に返す、顧客番号のみを持つレコード
    pub fn blank(customer_number: CustomerNumber) -> Self {
        Self {
            created_at: None,
            created_date: None,
            customer_number,
            dob: None,
            email: None,
            first_name: None,
            gender: None,
            id: None,
            id_number: None,
            id_type: None,
            last_name: None,
            middle_name: None,
            mobile: None,
            monthly_income: 0.0,
            status: None,
            updated_at: None,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn created_date(&self) -> Option<DateTime<Utc>> {
        self.created_date
    }

    pub fn customer_number(&self) -> &CustomerNumber {
        &self.customer_number
    }

    pub fn dob(&self) -> Option<NaiveDate> {
        self.dob
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn gender(&self) -> Option<Gender> {
        self.gender
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn id_number(&self) -> Option<&str> {
        self.id_number.as_deref()
    }

    pub fn id_type(&self) -> Option<IdType> {
        self.id_type
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    pub fn middle_name(&self) -> Option<&str> {
        self.middle_name.as_deref()
    }

    pub fn mobile(&self) -> Option<&str> {
        self.mobile.as_deref()
    }

    pub fn monthly_income(&self) -> f64 {
        self.monthly_income
    }

    pub fn status(&self) -> Option<CustomerStatus> {
        self.status
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::blank(self.customer_number.clone())
    }

    /// 構築済みの値が顧客の不変条件を満たすか検証する
    pub fn validate(&self) -> Result<(), CustomerError> {
        if !self.monthly_income.is_finite() {
            return Err(CustomerError::MonthlyIncomeIsNotFinite);
        }
        Ok(())
    }
}

impl Entity for Customer {
    const ENTITY_NAME: &'static str = "customer";
}

/// 顧客ビルダー
#[derive(Clone, Debug, Default)]
pub struct CustomerBuilder {
    created_at: Option<DateTime<Utc>>,
    created_date: Option<DateTime<Utc>>,
    customer_number: Option<CustomerNumber>,
    dob: Option<NaiveDate>,
    email: Option<String>,
    first_name: Option<String>,
    gender: Option<Gender>,
    id: Option<i64>,
    id_number: Option<String>,
    id_type: Option<IdType>,
    last_name: Option<String>,
    middle_name: Option<String>,
    mobile: Option<String>,
    monthly_income: f64,
    status: Option<CustomerStatus>,
    updated_at: Option<DateTime<Utc>>,
}

impl CustomerBuilder {
    pub fn created_at(mut self, value: DateTime<Utc>) -> Self {
        self.created_at = Some(value);
        self
    }

    pub fn created_date(mut self, value: DateTime<Utc>) -> Self {
        self.created_date = Some(value);
        self
    }

    pub fn customer_number(mut self, value: impl Into<CustomerNumber>) -> Self {
        self.customer_number = Some(value.into());
        self
    }

    pub fn dob(mut self, value: NaiveDate) -> Self {
        self.dob = Some(value);
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = Some(value.into());
        self
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = Some(value.into());
        self
    }

    pub fn gender(mut self, value: Gender) -> Self {
        self.gender = Some(value);
        self
    }

    pub fn id(mut self, value: i64) -> Self {
        self.id = Some(value);
        self
    }

    pub fn id_number(mut self, value: impl Into<String>) -> Self {
        self.id_number = Some(value.into());
        self
    }

    pub fn id_type(mut self, value: IdType) -> Self {
        self.id_type = Some(value);
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = Some(value.into());
        self
    }

    pub fn middle_name(mut self, value: impl Into<String>) -> Self {
        self.middle_name = Some(value.into());
        self
    }

    pub fn mobile(mut self, value: impl Into<String>) -> Self {
        self.mobile = Some(value.into());
        self
    }

    pub fn monthly_income(mut self, value: f64) -> Self {
        self.monthly_income = value;
        self
    }

    pub fn status(mut self, value: CustomerStatus) -> Self {
        self.status = Some(value);
        self
    }

    pub fn updated_at(mut self, value: DateTime<Utc>) -> Self {
        self.updated_at = Some(value);
        self
    }

    pub fn build(self) -> Result<Customer, CustomerError> {
        let customer_number = self
            .customer_number
            .ok_or(CustomerError::CustomerNumberIsMissing)?;
        let customer = Customer {
            created_at: self.created_at,
            created_date: self.created_date,
            customer_number,
            dob: self.dob,
            email: self.email,
            first_name: self.first_name,
            gender: self.gender,
            id: self.id,
            id_number: self.id_number,
            id_type: self.id_type,
            last_name: self.last_name,
            middle_name: self.middle_name,
            mobile: self.mobile,
            monthly_income: self.monthly_income,
            status: self.status,
            updated_at: self.updated_at,
        };
        customer.validate()?;
        Ok(customer)
    }
}

/// 顧客照会サービス
#[derive(Clone)]
pub struct CustomerService {
    repository: Arc<dyn CustomerRepository>,
}

impl CustomerService {
    pub fn new(repository: Arc<dyn CustomerRepository>) -> Self {
        Self { repository }
    }

    /// 顧客番号に一致する顧客を返す。該当なしでもエラーにはせず空のレコードを返す。
    pub async fn customer(&self, number: &CustomerNumber) -> Result<Customer, DataAccessError> {
        Ok(self
            .repository
            .find_by_customer_number(number)
            .await?
            .unwrap_or_else(|| Customer::blank(number.clone())))
    }
}

/// 顧客エラー
#[derive(Error, Display, Debug, PartialEq, Eq)]
pub enum CustomerError {
    #[display(fmt = "Customer number is missing")]
    CustomerNumberIsMissing,
    #[display(fmt = "Monthly income must be a finite number")]
    MonthlyIncomeIsNotFinite,
    #[display(fmt = "Unknown enumeration value")]
    UnknownEnumValue,
    #[display(fmt = "Date is invalid")]
    DateIsInvalid,
}
