use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, Event},
    Writer,
};

use super::{
    envelope::XmlWriter, xsd::XsdField, Operation, SoapError, SoapRecord, SOAP_HTTP_TRANSPORT,
    WSDL_NAMESPACE, WSDL_SOAP_NAMESPACE, XSD_NAMESPACE,
};

/// スキーマ上の複合型
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplexType {
    pub name: &'static str,
    pub fields: Vec<XsdField>,
}

impl ComplexType {
    pub fn of<T: SoapRecord>() -> Self {
        Self {
            name: T::TYPE_NAME,
            fields: T::fields(),
        }
    }

    /// 指定した要素に文字列長の上限を付ける
    pub fn restrict(mut self, name: &str, max_length: usize) -> Self {
        for field in self.fields.iter_mut().filter(|field| field.name == name) {
            field.max_length = Some(max_length);
        }
        self
    }
}

fn start<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut element = BytesStart::new(name);
    for attribute in attributes {
        element.push_attribute(*attribute);
    }
    element
}

fn open(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<(), SoapError> {
    Ok(writer.write_event(Event::Start(start(name, attributes)))?)
}

fn close(writer: &mut XmlWriter, name: &str) -> Result<(), SoapError> {
    Ok(writer.write_event(Event::End(BytesEnd::new(name)))?)
}

fn empty(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> Result<(), SoapError> {
    Ok(writer.write_event(Event::Empty(start(name, attributes)))?)
}

/// 1操作のサービスを記述するWSDL 1.1文書を生成する
pub fn render(
    operation: &Operation,
    types: &[ComplexType],
    location: &str,
) -> Result<Vec<u8>, SoapError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    open(
        &mut writer,
        "wsdl:definitions",
        &[
            ("xmlns:wsdl", WSDL_NAMESPACE),
            ("xmlns:soap", WSDL_SOAP_NAMESPACE),
            ("xmlns:xs", XSD_NAMESPACE),
            ("xmlns:tns", operation.namespace),
            ("targetNamespace", operation.namespace),
        ],
    )?;

    open(&mut writer, "wsdl:types", &[])?;
    write_schema(&mut writer, operation, types)?;
    close(&mut writer, "wsdl:types")?;

    let input_message = format!("{}Message", operation.input);
    let output_message = format!("{}Message", operation.output);
    for (message, element) in [
        (&input_message, operation.input),
        (&output_message, operation.output),
    ] {
        let element = format!("tns:{element}");
        open(&mut writer, "wsdl:message", &[("name", message.as_str())])?;
        empty(
            &mut writer,
            "wsdl:part",
            &[("name", "parameters"), ("element", element.as_str())],
        )?;
        close(&mut writer, "wsdl:message")?;
    }

    let input = format!("tns:{input_message}");
    let output = format!("tns:{output_message}");
    open(&mut writer, "wsdl:portType", &[("name", operation.port_type)])?;
    open(&mut writer, "wsdl:operation", &[("name", operation.name)])?;
    empty(&mut writer, "wsdl:input", &[("message", input.as_str())])?;
    empty(&mut writer, "wsdl:output", &[("message", output.as_str())])?;
    close(&mut writer, "wsdl:operation")?;
    close(&mut writer, "wsdl:portType")?;

    let port_type = format!("tns:{}", operation.port_type);
    open(
        &mut writer,
        "wsdl:binding",
        &[("name", operation.binding), ("type", port_type.as_str())],
    )?;
    empty(
        &mut writer,
        "soap:binding",
        &[("style", "document"), ("transport", SOAP_HTTP_TRANSPORT)],
    )?;
    open(&mut writer, "wsdl:operation", &[("name", operation.name)])?;
    empty(
        &mut writer,
        "soap:operation",
        &[("soapAction", operation.name), ("style", "document")],
    )?;
    for direction in ["wsdl:input", "wsdl:output"] {
        open(&mut writer, direction, &[])?;
        empty(&mut writer, "soap:body", &[("use", "literal")])?;
        close(&mut writer, direction)?;
    }
    close(&mut writer, "wsdl:operation")?;
    close(&mut writer, "wsdl:binding")?;

    let binding = format!("tns:{}", operation.binding);
    open(&mut writer, "wsdl:service", &[("name", operation.service)])?;
    open(
        &mut writer,
        "wsdl:port",
        &[("name", operation.port_type), ("binding", binding.as_str())],
    )?;
    empty(&mut writer, "soap:address", &[("location", location)])?;
    close(&mut writer, "wsdl:port")?;
    close(&mut writer, "wsdl:service")?;

    close(&mut writer, "wsdl:definitions")?;
    Ok(writer.into_inner())
}

fn write_schema(
    writer: &mut XmlWriter,
    operation: &Operation,
    types: &[ComplexType],
) -> Result<(), SoapError> {
    open(
        writer,
        "xs:schema",
        &[
            ("targetNamespace", operation.namespace),
            ("elementFormDefault", "qualified"),
        ],
    )?;

    // 列挙型は型名ごとに1度だけ定義する
    let mut enumerations: Vec<(&str, &[&str])> = Vec::new();
    for field in types.iter().flat_map(|complex| &complex.fields) {
        if let Some((name, values)) = field.enumeration {
            if enumerations.iter().all(|(defined, _)| *defined != name) {
                enumerations.push((name, values));
            }
        }
    }
    for (name, values) in enumerations {
        open(writer, "xs:simpleType", &[("name", name)])?;
        open(writer, "xs:restriction", &[("base", "xs:string")])?;
        for value in values {
            empty(writer, "xs:enumeration", &[("value", *value)])?;
        }
        close(writer, "xs:restriction")?;
        close(writer, "xs:simpleType")?;
    }

    for complex in types {
        open(writer, "xs:complexType", &[("name", complex.name)])?;
        open(writer, "xs:sequence", &[])?;
        for field in &complex.fields {
            let min_occurs = field.min_occurs.to_string();
            let mut attributes = vec![("name", field.name)];
            if field.max_length.is_none() {
                attributes.push(("type", field.xsd_type));
            }
            attributes.push(("minOccurs", min_occurs.as_str()));
            if field.unbounded {
                attributes.push(("maxOccurs", "unbounded"));
            }
            match field.max_length {
                Some(max_length) => {
                    // 長さ制限付きの要素は無名の単純型で定義する
                    let max_length = max_length.to_string();
                    open(writer, "xs:element", &attributes)?;
                    open(writer, "xs:simpleType", &[])?;
                    open(writer, "xs:restriction", &[("base", field.xsd_type)])?;
                    empty(writer, "xs:maxLength", &[("value", max_length.as_str())])?;
                    close(writer, "xs:restriction")?;
                    close(writer, "xs:simpleType")?;
                    close(writer, "xs:element")?;
                }
                None => empty(writer, "xs:element", &attributes)?,
            }
        }
        close(writer, "xs:sequence")?;
        close(writer, "xs:complexType")?;
    }

    for element in [operation.input, operation.output] {
        let xsd_type = format!("tns:{element}");
        empty(
            writer,
            "xs:element",
            &[("name", element), ("type", xsd_type.as_str())],
        )?;
    }
    close(writer, "xs:schema")
}

#[cfg(test)]
mod tests {
    use crate::infrastructure::soap::{
        customer_wsdl, envelope::XmlElement, transactions_wsdl, CUSTOMER_NAMESPACE,
        TRANSACTION_NAMESPACE,
    };

    use super::*;

    fn find<'a>(element: &'a XmlElement, namespace: &str, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        if element.is(namespace, name) {
            found.push(element);
        }
        for child in &element.children {
            found.extend(find(child, namespace, name));
        }
        found
    }

    #[test]
    fn test_customer_wsdl() {
        let xml = customer_wsdl("http://localhost:8001/service/customer").unwrap();
        let text = String::from_utf8(xml.clone()).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains(r#"targetNamespace="http://credable.io/cbs/customer""#));
        assert!(text.contains(r#"<soap:address location="http://localhost:8001/service/customer"/>"#));
        assert!(text.contains(r#"soapAction="Customer""#));

        let definitions = XmlElement::parse(&xml).unwrap();
        assert!(definitions.is(WSDL_NAMESPACE, "definitions"));
        assert_eq!(find(&definitions, XSD_NAMESPACE, "complexType").len(), 3);
        // Gender, IdType, Status
        assert_eq!(find(&definitions, XSD_NAMESPACE, "simpleType").len(), 3);
        assert_eq!(find(&definitions, WSDL_NAMESPACE, "message").len(), 2);
        assert_eq!(find(&definitions, WSDL_SOAP_NAMESPACE, "address").len(), 1);
        assert!(CUSTOMER_NAMESPACE.ends_with("customer"));
    }

    #[test]
    fn test_transactions_wsdl() {
        let xml = transactions_wsdl("https://cbs.example.com/service/transaction-data").unwrap();
        let text = String::from_utf8(xml.clone()).unwrap();
        assert!(text.contains(
            r#"<xs:element name="transactions" type="tns:TransactionDataType" minOccurs="0" maxOccurs="unbounded"/>"#
        ));
        assert!(text.contains(r#"<xs:element name="upDatedAt" type="xs:dateTime" minOccurs="0"/>"#));
        assert!(text.contains(r#"<xs:element name="accountNumber" minOccurs="1">"#));

        let definitions = XmlElement::parse(&xml).unwrap();
        let elements = find(&definitions, XSD_NAMESPACE, "element");
        // 72 fields + customerNumber + transactions + 2 top-level elements
        assert_eq!(elements.len(), 76);
        let restrictions = find(&definitions, XSD_NAMESPACE, "restriction");
        assert_eq!(restrictions.len(), 1);
        let max_length = find(restrictions[0], XSD_NAMESPACE, "maxLength");
        assert_eq!(max_length.len(), 1);
        assert!(text.contains(r#"<xs:restriction base="xs:string">"#));
        assert!(text.contains(r#"<xs:maxLength value="24"/>"#));
        assert!(text.contains(TRANSACTION_NAMESPACE));
    }
}
