use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use cbs::{
    domain::{customer::CustomerService, transaction::TransactionService},
    infrastructure::memory::{InMemoryCustomerRepository, InMemoryTransactionRepository},
    Credentials, Services,
};

use crate::{auth, handler};

pub const CUSTOMER_PATH: &str = "/service/customer";
pub const TRANSACTION_PATH: &str = "/service/transaction-data";

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<Credentials>,
    pub customers: CustomerService,
    pub transactions: TransactionService,
    /// WSDLの `soap:address` に使うスキーム
    pub scheme: &'static str,
    /// `Host` ヘッダーがない場合のホスト名
    pub default_host: String,
}

impl AppState {
    pub fn new(
        credentials: Credentials,
        customers: InMemoryCustomerRepository,
        transactions: InMemoryTransactionRepository,
        tls: bool,
        default_host: impl Into<String>,
    ) -> Self {
        Self {
            credentials: Arc::new(credentials),
            customers: CustomerService::new(Arc::new(customers)),
            transactions: TransactionService::new(Arc::new(transactions)),
            scheme: if tls { "https" } else { "http" },
            default_host: default_host.into(),
        }
    }
}

/// 有効なサービスのみをルーティングする。認証はマッチしたルートにのみ掛かる。
pub fn router(state: AppState, services: &Services) -> Router {
    let mut router = Router::new();
    if services.customer {
        router = router.route(
            CUSTOMER_PATH,
            get(handler::customer_wsdl).post(handler::customer),
        );
    }
    if services.transaction {
        router = router.route(
            TRANSACTION_PATH,
            get(handler::transactions_wsdl).post(handler::transactions),
        );
    }
    if services.customer || services.transaction {
        router = router.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ));
    }
    router.fallback(handler::not_found).with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE, HOST, WWW_AUTHENTICATE},
            Request, StatusCode,
        },
        response::Response,
    };
    use base64::{engine::general_purpose::STANDARD, Engine};
    use cbs::infrastructure::soap::{
        envelope::{decode_customer_response, decode_fault, decode_transactions_response},
        CUSTOMER_NAMESPACE, TRANSACTION_NAMESPACE,
    };
    use chrono::Utc;
    use tower::ServiceExt;

    use crate::handler::XML_CONTENT_TYPE;

    use super::*;

    const USERNAME: &str = "cbs";
    const PASSWORD: &str = "s3cret";

    fn app(services: Services) -> Router {
        let now = Utc::now();
        let state = AppState::new(
            Credentials::new(USERNAME, PASSWORD),
            InMemoryCustomerRepository::with_mock_data(now).unwrap(),
            InMemoryTransactionRepository::with_mock_data(now).unwrap(),
            false,
            "0.0.0.0:8001",
        );
        router(state, &services)
    }

    fn authorization(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
    }

    fn lookup(namespace: &str, element: &str, customer_number: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:req="{namespace}">
  <soapenv:Header/>
  <soapenv:Body>
    <req:{element}>
      <req:customerNumber>{customer_number}</req:customerNumber>
    </req:{element}>
  </soapenv:Body>
</soapenv:Envelope>"#
        )
    }

    fn post(path: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(AUTHORIZATION, authorization(USERNAME, PASSWORD))
            .header(CONTENT_TYPE, "text/xml")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body(response: Response) -> Vec<u8> {
        hyper::body::to_bytes(response.into_body())
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_customer_found() {
        let request = post(
            CUSTOMER_PATH,
            lookup(CUSTOMER_NAMESPACE, "CustomerRequest", "234774784"),
        );
        let response = app(Services::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], XML_CONTENT_TYPE);
        let customer = decode_customer_response(&body(response).await).unwrap();
        assert_eq!(customer.customer_number().as_str(), "CUST1001");
        assert_eq!(customer.first_name(), Some("John"));
        assert_eq!(customer.id(), Some(1001));
        assert_eq!(customer.monthly_income(), 2500.0);
    }

    #[tokio::test]
    async fn test_customer_not_found_returns_blank_record() {
        let request = post(
            CUSTOMER_PATH,
            lookup(CUSTOMER_NAMESPACE, "CustomerRequest", "999999999"),
        );
        let response = app(Services::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let customer = decode_customer_response(&body(response).await).unwrap();
        assert_eq!(customer.customer_number().as_str(), "999999999");
        assert!(customer.is_blank());
        assert_eq!(customer.monthly_income(), 0.0);
    }

    #[tokio::test]
    async fn test_transactions() {
        let app = app(Services::default());
        let cases = [
            ("234774784", 1),
            ("318411216", 2),
            ("397178638", 0),
            ("unknown", 0),
        ];
        for (customer_number, expected) in cases {
            let request = post(
                TRANSACTION_PATH,
                lookup(TRANSACTION_NAMESPACE, "TransactionsRequest", customer_number),
            );
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let transactions = decode_transactions_response(&body(response).await).unwrap();
            assert_eq!(transactions.len(), expected, "{customer_number}");
        }
    }

    #[tokio::test]
    async fn test_transaction_record_content() {
        let request = post(
            TRANSACTION_PATH,
            lookup(TRANSACTION_NAMESPACE, "TransactionsRequest", "234774784"),
        );
        let response = app(Services::default()).oneshot(request).await.unwrap();
        let transactions = decode_transactions_response(&body(response).await).unwrap();
        assert_eq!(transactions[0].account_number(), "332216783322167555621628");
        assert_eq!(*transactions[0].transaction_value(), 3500.0);
        assert_eq!(*transactions[0].monthly_balance(), 6788.0);
    }

    #[tokio::test]
    async fn test_invalid_envelope_is_client_fault() {
        let app = app(Services::default());
        let bodies = [
            "not xml at all".to_owned(),
            lookup(CUSTOMER_NAMESPACE, "Unexpected", "234774784"),
            lookup(TRANSACTION_NAMESPACE, "CustomerRequest", "234774784"),
        ];
        for request_body in bodies {
            let response = app
                .clone()
                .oneshot(post(CUSTOMER_PATH, request_body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(response.headers()[CONTENT_TYPE], XML_CONTENT_TYPE);
            let fault = decode_fault(&body(response).await).unwrap();
            assert_eq!(fault.code, "soap:Client");
        }
    }

    #[tokio::test]
    async fn test_unknown_child_element_is_client_fault() {
        let request_body = lookup(CUSTOMER_NAMESPACE, "CustomerRequest", "234774784").replace(
            "</req:customerNumber>",
            "</req:customerNumber><req:branch>01</req:branch>",
        );
        let response = app(Services::default())
            .oneshot(post(CUSTOMER_PATH, request_body))
            .await
            .unwrap();
        let fault = decode_fault(&body(response).await).unwrap();
        assert_eq!(fault.code, "soap:Client");
        assert!(fault.message.contains("branch"));
    }

    #[tokio::test]
    async fn test_authentication_required() {
        let app = app(Services::default());
        let headers = [
            None,
            Some(authorization(USERNAME, "wrong")),
            Some(authorization("CBS", PASSWORD)),
            Some("Bearer token".to_owned()),
        ];
        for header in headers {
            let mut request = Request::builder().method("POST").uri(CUSTOMER_PATH);
            if let Some(header) = header {
                request = request.header(AUTHORIZATION, header);
            }
            let request = request
                .body(Body::from(lookup(
                    CUSTOMER_NAMESPACE,
                    "CustomerRequest",
                    "234774784",
                )))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                response.headers()[WWW_AUTHENTICATE],
                "Basic realm=\"SOAP API\""
            );
            assert_eq!(body(response).await, b"Authentication required");
        }
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let app = app(Services::default());
        for path in ["/", "/service/Customer", "/service/customer/extra", "/ws"] {
            let request = Request::builder().uri(path).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
            assert_eq!(body(response).await, b"404 Not Found");
        }
    }

    #[tokio::test]
    async fn test_wsdl() {
        let request = Request::builder()
            .uri("/service/customer?wsdl")
            .header(HOST, "cbs.example.com:8001")
            .header(AUTHORIZATION, authorization(USERNAME, PASSWORD))
            .body(Body::empty())
            .unwrap();
        let response = app(Services::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let wsdl = String::from_utf8(body(response).await).unwrap();
        assert!(wsdl.contains(r#"location="http://cbs.example.com:8001/service/customer""#));
        assert!(wsdl.contains(r#"name="CustomerPortService""#));
        assert!(wsdl.contains(r#"name="CustomerRequest""#));
        assert!(wsdl.contains(r#"name="CustomerResponse""#));
        assert!(wsdl.contains(CUSTOMER_NAMESPACE));
    }

    #[tokio::test]
    async fn test_get_without_wsdl_is_not_allowed() {
        let request = Request::builder()
            .uri(TRANSACTION_PATH)
            .header(AUTHORIZATION, authorization(USERNAME, PASSWORD))
            .body(Body::empty())
            .unwrap();
        let response = app(Services::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_disabled_service_is_not_found() {
        let app = app(Services {
            customer: false,
            transaction: true,
        });
        let response = app
            .clone()
            .oneshot(post(
                CUSTOMER_PATH,
                lookup(CUSTOMER_NAMESPACE, "CustomerRequest", "234774784"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(post(
                TRANSACTION_PATH,
                lookup(TRANSACTION_NAMESPACE, "TransactionsRequest", "234774784"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
