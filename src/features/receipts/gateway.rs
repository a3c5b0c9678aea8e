// 領収書APIへのゲートウェイ

use super::models::{
    ProcessResponse, ProcessingStatusResponse, QueryRequest, QueryResponse, ReceiptFile,
    ServerReceipt, UploadResponse,
};
use crate::shared::api_client::ApiClient;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use log::info;
use reqwest::multipart;
use serde_json::Value;

/// 領収書APIの型付き操作
///
/// すべての失敗はメッセージを持つ `AppError` として返す
#[async_trait]
pub trait ReceiptGateway: Send + Sync {
    /// `GET /health`
    async fn health_check(&self) -> AppResult<()>;

    /// `GET /api/receipts?limit=N&offset=M`
    ///
    /// レスポンスの形が一定しないため、解析前のJSONを返す
    async fn list_receipts(&self, limit: u32, offset: u32) -> AppResult<Value>;

    /// `GET /api/receipts/{id}`
    async fn get_receipt(&self, receipt_id: &str) -> AppResult<ServerReceipt>;

    /// `POST /api/upload-receipt`（multipart、フィールド名 `file`）
    async fn upload_receipt(&self, file: &ReceiptFile) -> AppResult<UploadResponse>;

    /// `POST /api/receipts/{id}/process`
    async fn process_receipt(&self, receipt_id: &str) -> AppResult<ProcessResponse>;

    /// `GET /api/receipts/{id}/processing-status`
    async fn get_processing_status(&self, receipt_id: &str)
        -> AppResult<ProcessingStatusResponse>;

    /// `POST /api/query`
    async fn query_receipts(&self, query: &str) -> AppResult<QueryResponse>;

    /// `POST /api/receipts/{id}/generate-wallet-pass`
    async fn generate_wallet_pass(&self, receipt_id: &str) -> AppResult<Value>;
}

/// HTTP経由のゲートウェイ実装
pub struct HttpReceiptGateway {
    client: ApiClient,
}

impl HttpReceiptGateway {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// 環境変数の設定でゲートウェイを作成
    pub fn from_env() -> AppResult<Self> {
        Ok(Self::new(ApiClient::new()?))
    }
}

/// 領収書IDを含むパスを組み立てる（IDはURLエンコードする）
pub fn receipt_path(receipt_id: &str, suffix: &str) -> String {
    format!(
        "/api/receipts/{}{suffix}",
        urlencoding::encode(receipt_id)
    )
}

#[async_trait]
impl ReceiptGateway for HttpReceiptGateway {
    async fn health_check(&self) -> AppResult<()> {
        self.client.get_status("/health").await
    }

    async fn list_receipts(&self, limit: u32, offset: u32) -> AppResult<Value> {
        self.client
            .get(&format!("/api/receipts?limit={limit}&offset={offset}"))
            .await
    }

    async fn get_receipt(&self, receipt_id: &str) -> AppResult<ServerReceipt> {
        self.client.get(&receipt_path(receipt_id, "")).await
    }

    async fn upload_receipt(&self, file: &ReceiptFile) -> AppResult<UploadResponse> {
        info!(
            "領収書ファイルをアップロードします: filename={}, size={}",
            file.filename,
            file.size()
        );

        self.client
            .post_multipart("/api/upload-receipt", || {
                let part = multipart::Part::bytes(file.data.clone())
                    .file_name(file.filename.clone())
                    .mime_str(&file.content_type)
                    .map_err(|e| AppError::validation(format!("MIMEタイプ設定エラー: {e}")))?;
                Ok(multipart::Form::new().part("file", part))
            })
            .await
    }

    async fn process_receipt(&self, receipt_id: &str) -> AppResult<ProcessResponse> {
        self.client
            .post_empty(&receipt_path(receipt_id, "/process"))
            .await
    }

    async fn get_processing_status(
        &self,
        receipt_id: &str,
    ) -> AppResult<ProcessingStatusResponse> {
        self.client
            .get(&receipt_path(receipt_id, "/processing-status"))
            .await
    }

    async fn query_receipts(&self, query: &str) -> AppResult<QueryResponse> {
        let request = QueryRequest {
            query: query.to_string(),
        };
        self.client.post("/api/query", &request).await
    }

    async fn generate_wallet_pass(&self, receipt_id: &str) -> AppResult<Value> {
        self.client
            .post_empty(&receipt_path(receipt_id, "/generate-wallet-pass"))
            .await
    }
}
