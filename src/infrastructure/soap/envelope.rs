use std::collections::HashMap;

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    name::ResolveResult,
    reader::NsReader,
    Writer,
};

use crate::domain::{customer::Customer, transaction::TransactionData};

use super::{
    FaultCode, SoapError, SoapRecord, CUSTOMER_NAMESPACE, SOAP_ENV_NAMESPACE,
    TRANSACTION_NAMESPACE, XSI_NAMESPACE,
};

pub type XmlWriter = Writer<Vec<u8>>;

/// 名前空間解決済みのXML要素
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub text: String,
    pub nil: bool,
    pub children: Vec<XmlElement>,
}

fn malformed(error: impl std::fmt::Display) -> SoapError {
    SoapError::Validation(format!("Malformed XML: {error}"))
}

impl XmlElement {
    pub fn parse(xml: &[u8]) -> Result<Self, SoapError> {
        let xml = std::str::from_utf8(xml).map_err(malformed)?;
        let mut reader = NsReader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;
        loop {
            let (namespace, event) = reader.read_resolved_event().map_err(malformed)?;
            let namespace = match namespace {
                ResolveResult::Bound(namespace) => {
                    Some(String::from_utf8_lossy(namespace.as_ref()).into_owned())
                }
                ResolveResult::Unbound => None,
                ResolveResult::Unknown(prefix) => {
                    return Err(SoapError::Validation(format!(
                        "Unknown namespace prefix '{}'",
                        String::from_utf8_lossy(&prefix)
                    )))
                }
            };
            match event {
                Event::Start(start) => stack.push(Self::open(&reader, namespace, &start)?),
                Event::Empty(start) => {
                    let element = Self::open(&reader, namespace, &start)?;
                    Self::close(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| malformed("unexpected end tag"))?;
                    Self::close(element, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(malformed)?;
                    match stack.last_mut() {
                        Some(parent) => parent.text.push_str(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err(malformed("text outside of the root element")),
                    }
                }
                Event::CData(data) => {
                    let data = data.into_inner();
                    let text = std::str::from_utf8(&data).map_err(malformed)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.text.push_str(text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !stack.is_empty() {
            return Err(malformed("unclosed element"));
        }
        root.ok_or_else(|| malformed("document is empty"))
    }

    fn open(
        reader: &NsReader<&[u8]>,
        namespace: Option<String>,
        start: &BytesStart,
    ) -> Result<Self, SoapError> {
        let name = std::str::from_utf8(start.local_name().as_ref())
            .map_err(malformed)?
            .to_owned();
        let mut nil = false;
        for attribute in start.attributes() {
            let attribute = attribute.map_err(malformed)?;
            // `xsi:nil` のみ。他の名前空間の `nil` 属性は値として扱わない。
            let (attribute_namespace, local_name) = reader.resolve_attribute(attribute.key);
            let is_xsi = matches!(
                attribute_namespace,
                ResolveResult::Bound(bound) if bound.as_ref() == XSI_NAMESPACE.as_bytes()
            );
            if is_xsi && local_name.as_ref() == b"nil" {
                nil = matches!(attribute.value.as_ref(), b"true" | b"1");
            }
        }
        Ok(Self {
            namespace,
            name,
            nil,
            ..Default::default()
        })
    }

    fn close(
        element: Self,
        stack: &mut [XmlElement],
        root: &mut Option<XmlElement>,
    ) -> Result<(), SoapError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => return Err(malformed("multiple root elements")),
        }
        Ok(())
    }

    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.name == name
    }

    /// `xsi:nil` 指定の場合は `None`
    pub fn value(&self) -> Option<&str> {
        match self.nil {
            true => None,
            false => Some(&self.text),
        }
    }

    /// 子要素を要素名と値の組にする。
    ///
    /// 名前空間違い、重複、複合型直下の文字データ、単純型要素内の子要素は検証エラー。
    pub fn child_values(&self, namespace: &str) -> Result<HashMap<&str, Option<&str>>, SoapError> {
        if !self.text.trim().is_empty() {
            return Err(SoapError::Validation(format!(
                "Element '{}' must not contain character data",
                self.name
            )));
        }
        let mut values = HashMap::with_capacity(self.children.len());
        for child in &self.children {
            if child.namespace.as_deref() != Some(namespace) {
                return Err(SoapError::Validation(format!(
                    "Element '{}' must be qualified with namespace {}",
                    child.name, namespace
                )));
            }
            if let Some(nested) = child.children.first() {
                return Err(SoapError::Validation(format!(
                    "Element '{}' must not contain element '{}'",
                    child.name, nested.name
                )));
            }
            if values.insert(child.name.as_str(), child.value()).is_some() {
                return Err(SoapError::Validation(format!(
                    "Element '{}' occurs more than once",
                    child.name
                )));
            }
        }
        Ok(values)
    }

    fn describe(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{{{}}}{}", namespace, self.name),
            None => self.name.clone(),
        }
    }
}

/// `soap:Body` の唯一の子要素を取り出す
fn body_payload(xml: &[u8]) -> Result<XmlElement, SoapError> {
    let envelope = XmlElement::parse(xml)?;
    if !envelope.is(SOAP_ENV_NAMESPACE, "Envelope") {
        return Err(SoapError::Validation(format!(
            "Expected a SOAP 1.1 Envelope, found {}",
            envelope.describe()
        )));
    }
    let mut bodies = envelope
        .children
        .into_iter()
        .filter(|child| child.is(SOAP_ENV_NAMESPACE, "Body"));
    let body = bodies
        .next()
        .ok_or_else(|| SoapError::Validation("SOAP Body is missing".to_owned()))?;
    if bodies.next().is_some() {
        return Err(SoapError::Validation(
            "SOAP Envelope must contain exactly one Body".to_owned(),
        ));
    }
    let mut children = body.children;
    match children.len() {
        1 => Ok(children.remove(0)),
        0 => Err(SoapError::Validation("SOAP Body is empty".to_owned())),
        _ => Err(SoapError::Validation(
            "SOAP Body must contain exactly one element".to_owned(),
        )),
    }
}

fn expect_element(element: &XmlElement, namespace: &str, name: &str) -> Result<(), SoapError> {
    match element.is(namespace, name) {
        true => Ok(()),
        false => Err(SoapError::Validation(format!(
            "Expected element {{{}}}{}, found {}",
            namespace,
            name,
            element.describe()
        ))),
    }
}

/// リクエスト電文を検証し、型付きの入力値にする
pub fn decode_request<T: SoapRecord>(xml: &[u8]) -> Result<T, SoapError> {
    let payload = body_payload(xml)?;
    expect_element(&payload, T::NAMESPACE, T::TYPE_NAME)?;
    T::read_fields(&payload)
}

pub fn encode_request<T: SoapRecord>(request: &T) -> Result<Vec<u8>, SoapError> {
    let element = format!("tns:{}", T::TYPE_NAME);
    write_envelope(Some(T::NAMESPACE), |writer| {
        write_start(writer, &element)?;
        request.write_fields(writer)?;
        write_end(writer, &element)
    })
}

pub fn encode_customer_response(customer: &Customer) -> Result<Vec<u8>, SoapError> {
    write_envelope(Some(CUSTOMER_NAMESPACE), |writer| {
        write_start(writer, "tns:CustomerResponse")?;
        write_start(writer, "tns:customer")?;
        customer.write_fields(writer)?;
        write_end(writer, "tns:customer")?;
        write_end(writer, "tns:CustomerResponse")
    })
}

pub fn decode_customer_response(xml: &[u8]) -> Result<Customer, SoapError> {
    let payload = body_payload(xml)?;
    expect_element(&payload, CUSTOMER_NAMESPACE, "CustomerResponse")?;
    match payload.children.as_slice() {
        [customer] => {
            expect_element(customer, CUSTOMER_NAMESPACE, "customer")?;
            Customer::read_fields(customer)
        }
        _ => Err(SoapError::Validation(
            "CustomerResponse must contain exactly one customer".to_owned(),
        )),
    }
}

pub fn encode_transactions_response(
    transactions: &[TransactionData],
) -> Result<Vec<u8>, SoapError> {
    write_envelope(Some(TRANSACTION_NAMESPACE), |writer| {
        write_start(writer, "tns:TransactionsResponse")?;
        for transaction in transactions {
            write_start(writer, "tns:transactions")?;
            transaction.write_fields(writer)?;
            write_end(writer, "tns:transactions")?;
        }
        write_end(writer, "tns:TransactionsResponse")
    })
}

pub fn decode_transactions_response(xml: &[u8]) -> Result<Vec<TransactionData>, SoapError> {
    let payload = body_payload(xml)?;
    expect_element(&payload, TRANSACTION_NAMESPACE, "TransactionsResponse")?;
    payload
        .children
        .iter()
        .map(|child| {
            expect_element(child, TRANSACTION_NAMESPACE, "transactions")?;
            TransactionData::read_fields(child)
        })
        .collect()
}

/// SOAP Fault
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    pub code: String,
    pub message: String,
}

pub fn encode_fault(code: FaultCode, message: &str) -> Result<Vec<u8>, SoapError> {
    write_envelope(None, |writer| {
        write_start(writer, "soap:Fault")?;
        write_text_element(writer, "faultcode", code.as_str())?;
        write_text_element(writer, "faultstring", message)?;
        write_end(writer, "soap:Fault")
    })
}

pub fn decode_fault(xml: &[u8]) -> Result<Fault, SoapError> {
    let payload = body_payload(xml)?;
    expect_element(&payload, SOAP_ENV_NAMESPACE, "Fault")?;
    let text = |name: &str| {
        payload
            .children
            .iter()
            .find(|child| child.namespace.is_none() && child.name == name)
            .map(|child| child.text.clone())
            .unwrap_or_default()
    };
    Ok(Fault {
        code: text("faultcode"),
        message: text("faultstring"),
    })
}

fn write_envelope<F>(namespace: Option<&str>, body: F) -> Result<Vec<u8>, SoapError>
where
    F: FnOnce(&mut XmlWriter) -> Result<(), SoapError>,
{
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut envelope = BytesStart::new("soap:Envelope");
    envelope.push_attribute(("xmlns:soap", SOAP_ENV_NAMESPACE));
    if let Some(namespace) = namespace {
        envelope.push_attribute(("xmlns:tns", namespace));
    }
    writer.write_event(Event::Start(envelope))?;
    write_start(&mut writer, "soap:Body")?;
    body(&mut writer)?;
    write_end(&mut writer, "soap:Body")?;
    write_end(&mut writer, "soap:Envelope")?;
    Ok(writer.into_inner())
}

pub fn write_start(writer: &mut XmlWriter, name: &str) -> Result<(), SoapError> {
    Ok(writer.write_event(Event::Start(BytesStart::new(name)))?)
}

pub fn write_end(writer: &mut XmlWriter, name: &str) -> Result<(), SoapError> {
    Ok(writer.write_event(Event::End(BytesEnd::new(name)))?)
}

pub fn write_text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), SoapError> {
    write_start(writer, name)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    write_end(writer, name)
}
