pub mod features;
pub mod shared;

use features::receipts::{HttpReceiptGateway, ReceiptCoordinator};
use log::{error, info};
use shared::{
    initialize_logging_system, load_environment_variables, ApiClient, ApiClientConfig, ApiConfig,
    AppError, AppResult,
};
use std::sync::Arc;

/// アプリケーションシェルの起動処理
///
/// 環境変数の読み込み、ログ初期化、APIクライアントとストアの構築を行い、
/// 初回のヘルスチェックと一覧取得まで済ませたコーディネーターを返す
pub async fn bootstrap() -> AppResult<ReceiptCoordinator> {
    load_environment_variables();
    initialize_logging_system();

    info!("アプリケーション初期化を開始します...");

    let api_config = ApiConfig::from_env();
    if let Err(e) = api_config.validate() {
        error!("API設定の検証に失敗しました: {e}");
        return Err(AppError::configuration(e));
    }
    info!(
        "API設定: base_url={}, timeout={}秒, localhost={}",
        api_config.base_url,
        api_config.timeout_seconds,
        api_config.is_localhost()
    );

    let client = ApiClient::new_with_config(ApiClientConfig::from(api_config))?;
    let gateway = Arc::new(HttpReceiptGateway::new(client));
    let coordinator = ReceiptCoordinator::new(gateway);

    coordinator.initialize().await;

    info!("アプリケーション初期化が完了しました");
    Ok(coordinator)
}
