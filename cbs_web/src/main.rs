mod auth;
mod handler;
mod router;

use std::{error::Error, net::SocketAddr};

use axum_server::tls_rustls::RustlsConfig;
use cbs::{
    infrastructure::memory::{InMemoryCustomerRepository, InMemoryTransactionRepository},
    CbsConfig,
};
use chrono::Utc;
use tracing::{error, info, Level};

use crate::router::AppState;

#[tokio::main]
async fn main() {
    match CbsConfig::load() {
        Ok(config) => {
            tracing_subscriber::fmt()
                .with_max_level(Level::from(&config.logger.level))
                .init();
            if let Err(error) = serve(config).await {
                error!("アプリケーションエラー: {}", error);
                std::process::exit(1);
            }
        }
        Err(error) => {
            tracing_subscriber::fmt::init();
            error!("設定の読み込みに失敗: {}", error);
            std::process::exit(1);
        }
    }
}

async fn serve(config: CbsConfig) -> Result<(), Box<dyn Error>> {
    if !config.services.customer && !config.services.transaction {
        return Err("No service is enabled".into());
    }
    let now = Utc::now();
    let customers = InMemoryCustomerRepository::with_mock_data(now)?;
    let transactions = InMemoryTransactionRepository::with_mock_data(now)?;
    info!(
        customers = customers.len(),
        transactions = transactions.len(),
        "モックデータを読み込みました"
    );

    let address = config.server.address();
    let state = AppState::new(
        config.auth,
        customers,
        transactions,
        config.server.tls.is_some(),
        address.as_str(),
    );
    let app = router::router(state, &config.services);
    let addr: SocketAddr = address.parse()?;

    match &config.server.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            info!(
                customer = config.services.customer,
                transaction = config.services.transaction,
                "HTTPSで待ち受けを開始: {}",
                addr
            );
            axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(
                customer = config.services.customer,
                transaction = config.services.transaction,
                "HTTPで待ち受けを開始: {}",
                addr
            );
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await?;
        }
    }
    Ok(())
}
