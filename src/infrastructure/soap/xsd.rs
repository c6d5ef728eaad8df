use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::domain::{
    customer::{CustomerStatus, Gender, IdType},
    CustomerNumber,
};

use super::SoapError;

/// XSDの単純型として電文に載せられる値
pub trait XsdValue: Sized {
    /// スキーマ上の型名 (`xs:string`, `tns:Gender` など)
    const XSD_TYPE: &'static str;
    const MIN_OCCURS: u32 = 1;
    /// 列挙型の場合の (単純型名, 許容値)
    const ENUMERATION: Option<(&'static str, &'static [&'static str])> = None;

    /// `None` の場合は要素自体を出力しない
    fn to_xsd(&self) -> Option<String>;

    /// `text` が `None` の場合は要素が存在しない、または `xsi:nil` 指定
    fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError>;
}

/// 複合型の要素定義
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XsdField {
    pub name: &'static str,
    pub xsd_type: &'static str,
    pub min_occurs: u32,
    pub unbounded: bool,
    pub enumeration: Option<(&'static str, &'static [&'static str])>,
    /// 文字列長の上限 (`xs:maxLength`)
    pub max_length: Option<usize>,
}

impl XsdField {
    pub fn of<T: XsdValue>(name: &'static str) -> Self {
        Self {
            name,
            xsd_type: T::XSD_TYPE,
            min_occurs: T::MIN_OCCURS,
            unbounded: false,
            enumeration: T::ENUMERATION,
            max_length: None,
        }
    }

    /// 複合型を参照する要素
    pub fn element(name: &'static str, xsd_type: &'static str) -> Self {
        Self {
            name,
            xsd_type,
            min_occurs: 1,
            unbounded: false,
            enumeration: None,
            max_length: None,
        }
    }

    /// 0回以上繰り返す要素
    pub fn repeated(name: &'static str, xsd_type: &'static str) -> Self {
        Self {
            min_occurs: 0,
            unbounded: true,
            ..Self::element(name, xsd_type)
        }
    }
}

fn required<'a>(name: &str, text: Option<&'a str>) -> Result<&'a str, SoapError> {
    text.ok_or_else(|| SoapError::Validation(format!("Element '{name}' is required")))
}

fn invalid(name: &str, text: &str, expected: &str) -> SoapError {
    SoapError::Validation(format!(
        "Element '{name}': '{text}' is not a valid value of type {expected}"
    ))
}

impl<T: XsdValue> XsdValue for Option<T> {
    const XSD_TYPE: &'static str = T::XSD_TYPE;
    const MIN_OCCURS: u32 = 0;
    const ENUMERATION: Option<(&'static str, &'static [&'static str])> = T::ENUMERATION;

    fn to_xsd(&self) -> Option<String> {
        self.as_ref().and_then(T::to_xsd)
    }

    fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError> {
        match text {
            Some(_) => T::from_xsd(name, text).map(Some),
            None => Ok(None),
        }
    }
}

impl XsdValue for String {
    const XSD_TYPE: &'static str = "xs:string";

    fn to_xsd(&self) -> Option<String> {
        Some(self.clone())
    }

    fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError> {
        required(name, text).map(str::to_owned)
    }
}

impl XsdValue for CustomerNumber {
    const XSD_TYPE: &'static str = "xs:string";

    fn to_xsd(&self) -> Option<String> {
        Some(self.as_str().to_owned())
    }

    fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError> {
        required(name, text).map(CustomerNumber::from)
    }
}

impl XsdValue for i64 {
    const XSD_TYPE: &'static str = "xs:integer";

    fn to_xsd(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError> {
        let text = required(name, text)?;
        text.trim()
            .parse()
            .map_err(|_| invalid(name, text, Self::XSD_TYPE))
    }
}

impl XsdValue for f64 {
    const XSD_TYPE: &'static str = "xs:double";

    fn to_xsd(&self) -> Option<String> {
        Some(format_double(*self))
    }

    fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError> {
        let text = required(name, text)?;
        match text.trim() {
            "INF" => Ok(f64::INFINITY),
            "-INF" => Ok(f64::NEG_INFINITY),
            "NaN" => Ok(f64::NAN),
            value if value.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) => value
                .parse()
                .map_err(|_| invalid(name, text, Self::XSD_TYPE)),
            _ => Err(invalid(name, text, Self::XSD_TYPE)),
        }
    }
}

/// 整数値でも小数点以下1桁を付けて出力する (`2500.0`)
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value == f64::INFINITY {
        "INF".to_owned()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_owned()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

impl XsdValue for DateTime<Utc> {
    const XSD_TYPE: &'static str = "xs:dateTime";

    fn to_xsd(&self) -> Option<String> {
        Some(self.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError> {
        let text = required(name, text)?;
        parse_date_time(text.trim()).ok_or_else(|| invalid(name, text, Self::XSD_TYPE))
    }
}

/// タイムゾーン指定なしの日時はUTCとみなす
fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|value| value.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|value| Utc.from_utc_datetime(&value))
        })
}

/// 電文上は `xs:dateTime` の0時0分として扱う
impl XsdValue for NaiveDate {
    const XSD_TYPE: &'static str = "xs:dateTime";

    fn to_xsd(&self) -> Option<String> {
        Some(self.format("%Y-%m-%dT00:00:00").to_string())
    }

    fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError> {
        let text = required(name, text)?;
        let trimmed = text.trim();
        parse_date_time(trimmed)
            .map(|value| value.date_naive())
            .or_else(|| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok())
            .ok_or_else(|| invalid(name, text, Self::XSD_TYPE))
    }
}

macro_rules! impl_xsd_enumeration {
    ($($ty:ident => $type_name:literal),+ $(,)?) => {
        $(
            impl XsdValue for $ty {
                const XSD_TYPE: &'static str = concat!("tns:", $type_name);
                const ENUMERATION: Option<(&'static str, &'static [&'static str])> =
                    Some(($type_name, $ty::VALUES));

                fn to_xsd(&self) -> Option<String> {
                    Some(self.as_str().to_owned())
                }

                fn from_xsd(name: &str, text: Option<&str>) -> Result<Self, SoapError> {
                    let text = required(name, text)?;
                    text.parse().map_err(|_| {
                        SoapError::Validation(format!(
                            "Element '{name}': '{text}' is not one of {}",
                            $ty::VALUES.join(", ")
                        ))
                    })
                }
            }
        )+
    };
}

impl_xsd_enumeration! {
    Gender => "Gender",
    IdType => "IdType",
    CustomerStatus => "Status",
}
