// 領収書ライフサイクルのコーディネーター
//
// ゲートウェイ呼び出しとストア更新を組み合わせたワークフロー。
// 自動リトライは行わない。リトライは常に利用者が同じ操作を再度呼び出すことで行う。

use super::gateway::ReceiptGateway;
use super::models::{BackendStatus, ProcessingStatusResponse, Receipt, ReceiptFile};
use super::normalizer::{normalize_list_response, normalize_server_receipt, normalize_upload};
use super::progress::SyntheticProgress;
use super::store::{ReceiptState, ReceiptStore};
use super::validation::{validate_query, validate_receipt_file};
use crate::shared::errors::{AppError, AppResult};
use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// 一覧取得のデフォルト件数
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// 回答がなかった場合の問い合わせ応答
pub const FALLBACK_QUERY_ANSWER: &str = "回答を取得できませんでした";

/// 問い合わせの回答
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnswer {
    pub answer: String,
    pub confidence: Option<f64>,
    pub sources: Vec<String>,
    pub suggested_actions: Vec<String>,
}

/// 領収書ライフサイクルのコーディネーター
#[derive(Clone)]
pub struct ReceiptCoordinator {
    gateway: Arc<dyn ReceiptGateway>,
    store: ReceiptStore,
    progress: SyntheticProgress,
}

impl ReceiptCoordinator {
    /// 空のストアでコーディネーターを作成
    pub fn new(gateway: Arc<dyn ReceiptGateway>) -> Self {
        Self::with_store(gateway, ReceiptStore::new())
    }

    /// 既存のストアを共有してコーディネーターを作成
    pub fn with_store(gateway: Arc<dyn ReceiptGateway>, store: ReceiptStore) -> Self {
        Self {
            gateway,
            store,
            progress: SyntheticProgress::default(),
        }
    }

    /// 擬似進捗の設定を差し替える
    pub fn with_progress(mut self, progress: SyntheticProgress) -> Self {
        self.progress = progress;
        self
    }

    /// ストアへの参照
    pub fn store(&self) -> &ReceiptStore {
        &self.store
    }

    /// 現在のスナップショット
    pub fn snapshot(&self) -> Arc<ReceiptState> {
        self.store.snapshot()
    }

    /// 状態の変更を購読する
    pub fn subscribe(&self) -> watch::Receiver<Arc<ReceiptState>> {
        self.store.subscribe()
    }

    /// 起動時の初期化（ヘルスチェックと一覧取得を並行実行）
    pub async fn initialize(&self) {
        info!("領収書ストアを初期化しています...");
        tokio::join!(
            self.check_backend_status(),
            self.load_receipts(DEFAULT_PAGE_LIMIT, 0)
        );

        let state = self.store.snapshot();
        info!(
            "領収書ストアの初期化が完了しました: receipts={}, total={}, backend={:?}",
            state.receipts.len(),
            state.total_count,
            state.backend_status
        );
    }

    /// バックエンドのヘルスチェック
    ///
    /// 結果は `backend_status` にのみ反映し、ストアの `error` には書き込まない
    pub async fn check_backend_status(&self) -> BackendStatus {
        let status = match self.gateway.health_check().await {
            Ok(()) => {
                info!("バックエンドは稼働しています");
                BackendStatus::Online
            }
            Err(e) => {
                warn!("バックエンドのヘルスチェックに失敗しました: {e}");
                BackendStatus::Offline
            }
        };

        self.store.set_backend_status(status);
        status
    }

    /// 領収書一覧を読み込み、ストアを置き換える
    ///
    /// 失敗時はストアの `error` にメッセージを設定する
    pub async fn load_receipts(&self, limit: u32, offset: u32) {
        info!("領収書一覧を読み込みます: limit={limit}, offset={offset}");
        self.store.set_loading(true);

        match self.gateway.list_receipts(limit, offset).await {
            Ok(response) => {
                let page = normalize_list_response(response);
                info!(
                    "領収書一覧を読み込みました: count={}, total={:?}",
                    page.receipts.len(),
                    page.total
                );
                self.store.replace_all(page.receipts, page.total);
            }
            Err(e) => {
                error!("領収書一覧の読み込みに失敗しました: {e}");
                self.store.set_error(Some(e.message()));
            }
        }
    }

    /// ファイルをアップロードし、結果をストアの先頭に追加する
    ///
    /// 検証エラーやアップロード失敗は呼び出し元にのみ返し、ストアには書き込まない。
    /// 追加された領収書はサーバーから再取得しない。
    /// 進捗の通知はアップロード完了後も続くことがあるが、ストアへの追加は待たない。
    pub async fn upload_receipt<P>(&self, file: &ReceiptFile, on_progress: P) -> AppResult<Receipt>
    where
        P: FnMut(f64) + Send + 'static,
    {
        validate_receipt_file(file)?;

        info!("領収書アップロードを開始します: filename={}", file.filename);
        let response = self
            .progress
            .track(self.gateway.upload_receipt(file), on_progress)
            .await
            .map_err(|e| {
                error!("領収書アップロードに失敗しました: filename={}, error={e}", file.filename);
                e
            })?;

        let receipt = normalize_upload(&response);
        info!("領収書アップロード成功: receipt_id={}", receipt.id);
        self.store.insert_front(receipt.clone());
        Ok(receipt)
    }

    /// 領収書の解析を開始する（`error` からのリトライも同じ操作）
    ///
    /// 解析中の領収書に対しては呼び出さないこと（画面側で操作を無効化する）。
    ///
    /// # 戻り値
    /// 最終的な領収書（`processed` または `error`）。
    /// 対象が見つからない・遷移できない場合のみErr
    pub async fn process_receipt(&self, receipt_id: &str) -> AppResult<Receipt> {
        let receipt = self
            .store
            .find(receipt_id)
            .ok_or_else(|| AppError::not_found(format!("領収書 {receipt_id}")))?;

        let processing = receipt.start_processing(Utc::now())?;
        self.store.upsert_by_id(processing.clone());
        info!("領収書の解析を開始します: receipt_id={receipt_id}");

        let outcome = self
            .gateway
            .process_receipt(receipt_id)
            .await
            .and_then(|response| {
                if !response.success {
                    let message = response
                        .error
                        .or(response.message)
                        .unwrap_or_else(|| "解析に失敗しました".to_string());
                    return Err(AppError::processing(message));
                }
                response
                    .extracted_data
                    .ok_or_else(|| AppError::processing("解析結果が空です"))
            });

        let finished = match outcome {
            Ok(data) => {
                info!("領収書の解析に成功しました: receipt_id={receipt_id}");
                processing.complete_processing(data, Utc::now())?
            }
            Err(e) => {
                warn!("領収書の解析に失敗しました: receipt_id={receipt_id}, error={e}");
                processing.fail_processing(e.message(), Utc::now())?
            }
        };

        self.store.upsert_by_id(finished.clone());
        Ok(finished)
    }

    /// 領収書を1件取得して `current_receipt` に設定する
    ///
    /// 失敗時はストアの `error` にメッセージを設定する
    pub async fn select_receipt(&self, receipt_id: &str) {
        info!("領収書を取得します: receipt_id={receipt_id}");
        self.store.set_loading(true);

        match self.gateway.get_receipt(receipt_id).await {
            Ok(payload) => {
                let receipt = normalize_server_receipt(&payload);
                self.store.set_current(Some(receipt));
                self.store.set_loading(false);
            }
            Err(e) => {
                error!("領収書の取得に失敗しました: receipt_id={receipt_id}, error={e}");
                self.store.set_error(Some(e.message()));
            }
        }
    }

    /// 選択中の領収書を解除する
    pub fn clear_current(&self) {
        self.store.set_current(None);
    }

    /// ストアのエラーを消去する
    pub fn clear_error(&self) {
        self.store.clear_error();
    }

    /// 解析ステータスを問い合わせる（ストアは更新しない）
    pub async fn get_processing_status(
        &self,
        receipt_id: &str,
    ) -> AppResult<ProcessingStatusResponse> {
        self.gateway.get_processing_status(receipt_id).await
    }

    /// ウォレットパスを生成する（ストアは更新しない）
    pub async fn generate_wallet_pass(&self, receipt_id: &str) -> AppResult<Value> {
        info!("ウォレットパスを生成します: receipt_id={receipt_id}");
        self.gateway.generate_wallet_pass(receipt_id).await
    }

    /// 自然言語で領収書に問い合わせる（ストアは更新しない）
    pub async fn query_receipts(&self, query: &str) -> AppResult<QueryAnswer> {
        let query = validate_query(query)?;
        info!("問い合わせを送信します: query={query}");

        let response = self.gateway.query_receipts(query).await?;
        Ok(QueryAnswer {
            answer: response
                .answer
                .filter(|answer| !answer.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_QUERY_ANSWER.to_string()),
            confidence: response.confidence,
            sources: response.sources,
            suggested_actions: response.suggested_actions,
        })
    }
}
