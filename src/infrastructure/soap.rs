//! SOAP 1.1 (document/literal, bare) の電文変換
//!
//! XMLの読み書きは `quick-xml` に任せ、ここでは電文の構造検証と
//! 型付きレコードとの相互変換、WSDLの生成のみを行う。

pub mod envelope;
pub mod wsdl;
pub mod xsd;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::{
    customer::{Customer, CustomerStatus, Gender, IdType},
    transaction::{transaction_data_fields, TransactionData, ACCOUNT_NUMBER_MAX_LEN},
    CustomerNumber,
};

use self::envelope::{write_text_element, XmlElement, XmlWriter};
use self::wsdl::ComplexType;
use self::xsd::{XsdField, XsdValue};

pub const SOAP_ENV_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const WSDL_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const WSDL_SOAP_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const SOAP_HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";

pub const CUSTOMER_NAMESPACE: &str = "http://credable.io/cbs/customer";
pub const TRANSACTION_NAMESPACE: &str = "http://credable.io/cbs/transaction";

#[derive(Error, Debug)]
pub enum SoapError {
    /// 受信電文がスキーマに適合しない
    #[error("{0}")]
    Validation(String),
    #[error("Failed to write XML: {0}")]
    Write(#[from] quick_xml::Error),
}

impl SoapError {
    pub fn fault_code(&self) -> FaultCode {
        match self {
            Self::Validation(_) => FaultCode::Client,
            Self::Write(_) => FaultCode::Server,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultCode {
    Client,
    Server,
}

impl FaultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "soap:Client",
            Self::Server => "soap:Server",
        }
    }
}

/// サービスが公開する1操作の定義
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub service: &'static str,
    pub port_type: &'static str,
    pub binding: &'static str,
    pub name: &'static str,
    pub namespace: &'static str,
    pub input: &'static str,
    pub output: &'static str,
}

pub const CUSTOMER_OPERATION: Operation = Operation {
    service: "CustomerPortService",
    port_type: "CustomerPort",
    binding: "CustomerPortSoap11",
    name: "Customer",
    namespace: CUSTOMER_NAMESPACE,
    input: "CustomerRequest",
    output: "CustomerResponse",
};

pub const TRANSACTIONS_OPERATION: Operation = Operation {
    service: "TransactionsPortService",
    port_type: "TransactionsPort",
    binding: "TransactionsPortSoap11",
    name: "Transactions",
    namespace: TRANSACTION_NAMESPACE,
    input: "TransactionsRequest",
    output: "TransactionsResponse",
};

/// 電文上の複合型に対応するレコード
pub trait SoapRecord: Sized {
    const TYPE_NAME: &'static str;
    const NAMESPACE: &'static str;

    fn fields() -> Vec<XsdField>;

    /// 子要素のみを `tns` 接頭辞付きで書き出す
    fn write_fields(&self, writer: &mut XmlWriter) -> Result<(), SoapError>;

    fn read_fields(element: &XmlElement) -> Result<Self, SoapError>;
}

macro_rules! impl_soap_record {
    ($name:ident as $type_name:literal in $namespace:ident $(checked by $check:path)? {
        $($field:ident : $ty:ty => $wire:literal),* $(,)?
    }) => {
        impl SoapRecord for $name {
            const TYPE_NAME: &'static str = $type_name;
            const NAMESPACE: &'static str = $namespace;

            fn fields() -> Vec<XsdField> {
                vec![$(XsdField::of::<$ty>($wire)),*]
            }

            fn write_fields(&self, writer: &mut XmlWriter) -> Result<(), SoapError> {
                $(
                    if let Some(text) = XsdValue::to_xsd(&self.$field) {
                        write_text_element(writer, concat!("tns:", $wire), &text)?;
                    }
                )*
                Ok(())
            }

            fn read_fields(element: &XmlElement) -> Result<Self, SoapError> {
                let mut values = element.child_values(Self::NAMESPACE)?;
                $(
                    let $field = <$ty as XsdValue>::from_xsd($wire, values.remove($wire).flatten())?;
                )*
                if let Some(unexpected) = values.keys().min() {
                    return Err(SoapError::Validation(format!(
                        "Element '{}' is not expected in {}",
                        unexpected, $type_name
                    )));
                }
                let record = Self { $($field),* };
                $(
                    $check(&record).map_err(|error| {
                        SoapError::Validation(format!("{}: {}", $type_name, error))
                    })?;
                )?
                Ok(record)
            }
        }
    };
}

impl_soap_record! {
    Customer as "CustomerType" in CUSTOMER_NAMESPACE checked by Customer::validate {
        created_at: Option<DateTime<Utc>> => "createdAt",
        created_date: Option<DateTime<Utc>> => "createdDate",
        customer_number: CustomerNumber => "customerNumber",
        dob: Option<NaiveDate> => "dob",
        email: Option<String> => "email",
        first_name: Option<String> => "firstName",
        gender: Option<Gender> => "gender",
        id: Option<i64> => "id",
        id_number: Option<String> => "idNumber",
        id_type: Option<IdType> => "idType",
        last_name: Option<String> => "lastName",
        middle_name: Option<String> => "middleName",
        mobile: Option<String> => "mobile",
        monthly_income: f64 => "monthlyIncome",
        status: Option<CustomerStatus> => "status",
        updated_at: Option<DateTime<Utc>> => "updatedAt",
    }
}

transaction_data_fields!(impl_soap_record!(
    TransactionData as "TransactionDataType" in TRANSACTION_NAMESPACE
        checked by TransactionData::validate
));

/// 顧客照会リクエスト
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerRequest {
    pub customer_number: CustomerNumber,
}

impl_soap_record! {
    CustomerRequest as "CustomerRequest" in CUSTOMER_NAMESPACE {
        customer_number: CustomerNumber => "customerNumber",
    }
}

/// 取引照会リクエスト
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionsRequest {
    pub customer_number: CustomerNumber,
}

impl_soap_record! {
    TransactionsRequest as "TransactionsRequest" in TRANSACTION_NAMESPACE {
        customer_number: CustomerNumber => "customerNumber",
    }
}

/// 顧客照会サービスのWSDL
pub fn customer_wsdl(location: &str) -> Result<Vec<u8>, SoapError> {
    wsdl::render(
        &CUSTOMER_OPERATION,
        &[
            ComplexType::of::<Customer>(),
            ComplexType::of::<CustomerRequest>(),
            ComplexType {
                name: "CustomerResponse",
                fields: vec![XsdField::element("customer", "tns:CustomerType")],
            },
        ],
        location,
    )
}

/// 取引照会サービスのWSDL
pub fn transactions_wsdl(location: &str) -> Result<Vec<u8>, SoapError> {
    wsdl::render(
        &TRANSACTIONS_OPERATION,
        &[
            ComplexType::of::<TransactionData>()
                .restrict("accountNumber", ACCOUNT_NUMBER_MAX_LEN),
            ComplexType::of::<TransactionsRequest>(),
            ComplexType {
                name: "TransactionsResponse",
                fields: vec![XsdField::repeated("transactions", "tns:TransactionDataType")],
            },
        ],
        location,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_fields_follow_schema_order() {
        let fields = Customer::fields();
        assert_eq!(fields.len(), 16);
        assert_eq!(fields[0].name, "createdAt");
        assert_eq!(fields[15].name, "updatedAt");
        let income = fields.iter().find(|f| f.name == "monthlyIncome").unwrap();
        assert_eq!(income.min_occurs, 1);
        assert_eq!(income.xsd_type, "xs:double");
        let gender = fields.iter().find(|f| f.name == "gender").unwrap();
        assert_eq!(gender.min_occurs, 0);
        assert_eq!(gender.xsd_type, "tns:Gender");
    }

    #[test]
    fn test_transaction_fields_keep_wire_names() {
        let fields = TransactionData::fields();
        assert_eq!(fields.len(), 72);
        let names: Vec<_> = fields.iter().map(|f| f.name).collect();
        assert!(names.contains(&"upDatedAt"));
        assert!(names.contains(&"maxMonthlyBebitTransactions"));
        assert!(names.contains(&"intrestAmount"));
        assert!(names.contains(&"maxmonthlycredittransactions"));
        assert!(!names.contains(&"updatedAt"));
    }

    #[test]
    fn test_fault_codes() {
        assert_eq!(
            SoapError::Validation("x".to_owned()).fault_code(),
            FaultCode::Client
        );
        assert_eq!(FaultCode::Server.as_str(), "soap:Server");
    }
}
