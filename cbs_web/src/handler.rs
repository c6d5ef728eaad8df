use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{
        header::{ALLOW, CONTENT_TYPE, HOST},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
};
use cbs::{
    domain::DataAccessError,
    infrastructure::soap::{
        self,
        envelope::{
            decode_request, encode_customer_response, encode_fault, encode_transactions_response,
        },
        CustomerRequest, FaultCode, SoapError, TransactionsRequest,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::router::{AppState, CUSTOMER_PATH, TRANSACTION_PATH};

pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Soap(#[from] SoapError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

impl ServiceError {
    fn fault_code(&self) -> FaultCode {
        match self {
            Self::Soap(error) => error.fault_code(),
            Self::DataAccess(_) => FaultCode::Server,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let code = self.fault_code();
        let message = match code {
            FaultCode::Client => {
                warn!("不正なリクエスト: {}", self);
                self.to_string()
            }
            FaultCode::Server => {
                error!("サービスエラー: {}", self);
                "Internal server error".to_owned()
            }
        };
        match encode_fault(code, &message) {
            Ok(body) => xml_response(StatusCode::INTERNAL_SERVER_ERROR, body),
            Err(error) => {
                error!("SOAP Faultの生成に失敗: {}", error);
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}

fn xml_response(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

/// 顧客照会
pub async fn customer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let request = decode_request::<CustomerRequest>(&body)?;
    let customer = state.customers.customer(&request.customer_number).await?;
    info!(
        customer_number = %request.customer_number,
        found = !customer.is_blank(),
        "顧客照会"
    );
    Ok(xml_response(StatusCode::OK, encode_customer_response(&customer)?))
}

/// 取引照会
pub async fn transactions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let request = decode_request::<TransactionsRequest>(&body)?;
    let transactions = state
        .transactions
        .transactions(&request.customer_number)
        .await?;
    info!(
        customer_number = %request.customer_number,
        count = transactions.len(),
        "取引照会"
    );
    Ok(xml_response(
        StatusCode::OK,
        encode_transactions_response(&transactions)?,
    ))
}

pub async fn customer_wsdl(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    if !wants_wsdl(query.as_deref()) {
        return Ok(method_not_allowed());
    }
    let location = location(&state, &headers, CUSTOMER_PATH);
    Ok(xml_response(StatusCode::OK, soap::customer_wsdl(&location)?))
}

pub async fn transactions_wsdl(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    if !wants_wsdl(query.as_deref()) {
        return Ok(method_not_allowed());
    }
    let location = location(&state, &headers, TRANSACTION_PATH);
    Ok(xml_response(StatusCode::OK, soap::transactions_wsdl(&location)?))
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

/// クエリに `wsdl` キーがあるか (`?wsdl`, `?WSDL`, `?wsdl=` など)
fn wants_wsdl(query: Option<&str>) -> bool {
    query
        .map(|query| {
            query.split('&').any(|pair| {
                let key = pair.split_once('=').map_or(pair, |(key, _)| key);
                key.eq_ignore_ascii_case("wsdl")
            })
        })
        .unwrap_or(false)
}

/// WSDLの `soap:address` にはリクエストされたURLをそのまま使う
fn location(state: &AppState, headers: &HeaderMap, path: &str) -> String {
    let host = headers
        .get(HOST)
        .and_then(|host| host.to_str().ok())
        .unwrap_or(state.default_host.as_str());
    format!("{}://{}{}", state.scheme, host, path)
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, "POST")],
        "Use POST for SOAP requests or GET with ?wsdl for the service description",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_wsdl() {
        assert!(wants_wsdl(Some("wsdl")));
        assert!(wants_wsdl(Some("WSDL")));
        assert!(wants_wsdl(Some("wsdl=")));
        assert!(wants_wsdl(Some("a=1&wsdl")));
        assert!(!wants_wsdl(Some("wsdl2")));
        assert!(!wants_wsdl(Some("xsd=1")));
        assert!(!wants_wsdl(None));
    }

    #[tokio::test]
    async fn test_data_access_error_is_server_fault() {
        let error = ServiceError::DataAccess(DataAccessError::ReadError("closed".into()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let fault = soap::envelope::decode_fault(&body).unwrap();
        assert_eq!(fault.code, "soap:Server");
        assert_eq!(fault.message, "Internal server error");
    }
}
