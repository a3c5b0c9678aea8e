//! 汎用APIクライアント
//!
//! APIサーバーとの通信を行うトランスポート層。
//! JSONを解析して返すか、`AppError::ExternalService` で失敗を通知する。
use crate::shared::config::environment::ApiConfig;
use crate::shared::errors::{AppError, AppResult};
use log::{debug, error, info, warn};
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// APIクライアント設定
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        ApiConfig::default().into()
    }
}

impl From<ApiConfig> for ApiClientConfig {
    fn from(config: ApiConfig) -> Self {
        Self {
            base_url: config.base_url,
            timeout_seconds: config.timeout_seconds,
            max_retries: config.max_retries,
        }
    }
}

impl ApiClientConfig {
    /// 環境設定からAPIクライアント設定を作成
    pub fn from_env() -> Self {
        ApiConfig::from_env().into()
    }
}

/// 汎用APIクライアント
pub struct ApiClient {
    client: Client,
    config: ApiClientConfig,
}

impl ApiClient {
    /// 環境変数の設定でAPIクライアントを作成
    pub fn new() -> AppResult<Self> {
        Self::new_with_config(ApiClientConfig::from_env())
    }

    /// 設定を指定してAPIクライアントを作成
    pub fn new_with_config(config: ApiClientConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTPクライアント初期化失敗: {e}")))?;

        Ok(Self { client, config })
    }

    /// ベースURLを取得
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// エンドポイントから完全なURLを組み立てる
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    /// GETリクエストを送信
    pub async fn get<T>(&self, endpoint: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        info!("GETリクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_with_retry("GET", endpoint, || Ok(self.client.get(&url)))
            .await?;
        parse_json(response, endpoint).await
    }

    /// ステータスのみを確認するGETリクエスト（レスポンスボディは読み捨てる）
    pub async fn get_status(&self, endpoint: &str) -> AppResult<()> {
        debug!("ステータス確認リクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        self.send_with_retry("GET", endpoint, || Ok(self.client.get(&url)))
            .await?;
        Ok(())
    }

    /// JSONボディ付きPOSTリクエストを送信
    pub async fn post<B, T>(&self, endpoint: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        info!("POSTリクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_with_retry("POST", endpoint, || Ok(self.client.post(&url).json(body)))
            .await?;
        parse_json(response, endpoint).await
    }

    /// ボディなしPOSTリクエストを送信
    pub async fn post_empty<T>(&self, endpoint: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        info!("POSTリクエスト送信（ボディなし）: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_with_retry("POST", endpoint, || Ok(self.client.post(&url)))
            .await?;
        parse_json(response, endpoint).await
    }

    /// マルチパートフォームをPOSTする
    ///
    /// `multipart::Form` は複製できないため、リトライごとに `build_form` で再作成する
    pub async fn post_multipart<F, T>(&self, endpoint: &str, build_form: F) -> AppResult<T>
    where
        F: Fn() -> AppResult<multipart::Form> + Send + Sync,
        T: DeserializeOwned,
    {
        info!("マルチパートPOSTリクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_with_retry("POST", endpoint, || {
                let form = build_form()?;
                Ok(self.client.post(&url).multipart(form))
            })
            .await?;
        parse_json(response, endpoint).await
    }

    /// リトライ機能付きでリクエストを送信
    ///
    /// 接続失敗のみリトライ対象。HTTPエラーレスポンスは即座に失敗とする
    async fn send_with_retry<F>(
        &self,
        method: &str,
        endpoint: &str,
        build_request: F,
    ) -> AppResult<Response>
    where
        F: Fn() -> AppResult<RequestBuilder> + Send + Sync,
    {
        let mut attempts = 0;
        loop {
            match build_request()?.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        info!("{method}リクエスト成功: endpoint={endpoint}");
                        return Ok(response);
                    }

                    let message = handle_error_response(response).await;
                    error!("{method}リクエスト失敗: endpoint={endpoint}, message={message}");
                    return Err(AppError::ExternalService(message));
                }
                Err(e) => {
                    if attempts < self.config.max_retries {
                        attempts += 1;
                        let delay = Duration::from_secs(2_u64.pow(attempts));
                        warn!(
                            "APIリクエスト失敗、リトライします: attempt={attempts}/{}, delay={delay:?}",
                            self.config.max_retries
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    error!("APIサーバーへの接続に失敗しました: endpoint={endpoint}, error={e}");
                    return Err(AppError::ExternalService(if e.is_timeout() {
                        "timeout".to_string()
                    } else {
                        format!("APIサーバーへの接続に失敗しました: {e}")
                    }));
                }
            }
        }
    }
}

/// 成功レスポンスのJSONを解析する
async fn parse_json<T>(response: Response, endpoint: &str) -> AppResult<T>
where
    T: DeserializeOwned,
{
    response.json::<T>().await.map_err(|e| {
        error!("レスポンス解析エラー: endpoint={endpoint}, error={e}");
        AppError::ExternalService(format!("レスポンス解析エラー: {e}"))
    })
}

/// エラーレスポンスを読み取り、メッセージを取り出す
async fn handle_error_response(response: Response) -> String {
    let status_code = response.status().as_u16();
    let response_text = response
        .text()
        .await
        .unwrap_or_else(|_| "レスポンス読み取り失敗".to_string());

    extract_error_message(status_code, &response_text)
}

/// エラーレスポンスのボディからメッセージを取り出す
///
/// # 解析順序
/// 1. `{"detail": "..."}`（FastAPI形式）
/// 2. `{"error": {"message": "..."}}`（構造化エラー）
/// 3. `{"error": "..."}` / `{"message": "..."}`
/// 4. いずれでもなければHTTPステータスから汎用メッセージを作成
pub fn extract_error_message(status_code: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.get("detail"),
            value.get("error").and_then(|e| e.get("message")),
            value.get("error"),
            value.get("message"),
        ];

        for candidate in candidates.into_iter().flatten() {
            if let Some(message) = candidate.as_str() {
                debug!("構造化エラーレスポンスを受信: status={status_code}, message={message}");
                return message.to_string();
            }
        }
    }

    warn!("非構造化エラーレスポンス: status={status_code}, body={body}");

    let message = match status_code {
        400 => "リクエストの形式が正しくありません",
        404 => "指定されたリソースが見つかりません",
        413 => "データサイズが制限を超えています",
        415 => "サポートされていないデータ形式です",
        422 => "リクエストの内容を処理できません",
        429 => "リクエストが多すぎます。しばらく待ってから再試行してください",
        500 => "サーバー内部エラーが発生しました",
        502 => "APIサーバーとの通信でエラーが発生しました",
        503 => "APIサーバーが一時的に利用できません",
        504 => "APIサーバーからの応答がタイムアウトしました",
        _ => "不明なエラーが発生しました",
    };
    format!("HTTP {status_code}: {message}")
}
