// 領収書機能のデータモデル

use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::lenient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 領収書の処理ステータス
///
/// ```text
/// uploaded --(解析開始)--> processing
/// processing --(解析成功)--> processed
/// processing --(解析失敗)--> error
/// error --(リトライ)--> processing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl ReceiptStatus {
    /// APIサーバー上の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Uploaded => "uploaded",
            ReceiptStatus::Processing => "processing",
            ReceiptStatus::Processed => "processed",
            ReceiptStatus::Error => "error",
        }
    }

    /// 文字列からステータスを解析（大文字小文字は区別しない）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "uploaded" => Some(ReceiptStatus::Uploaded),
            "processing" => Some(ReceiptStatus::Processing),
            "processed" => Some(ReceiptStatus::Processed),
            "error" => Some(ReceiptStatus::Error),
            _ => None,
        }
    }

    /// 解析を開始（またはリトライ）できる状態かどうか
    pub fn can_start_processing(&self) -> bool {
        matches!(self, ReceiptStatus::Uploaded | ReceiptStatus::Error)
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// バックエンドの稼働状況
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

/// 正規化済みのファイルメタデータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub original_filename: Option<String>,
    pub stored_filename: Option<String>,
    pub file_size: Option<u64>,
    pub content_type: Option<String>,
    pub upload_date: DateTime<Utc>,
}

/// AI解析で抽出された明細行
///
/// 形式が想定と異なる項目は失敗にせず空として扱う
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedItem {
    #[serde(deserialize_with = "lenient::or_default")]
    pub name: String,
    #[serde(deserialize_with = "lenient::amount")]
    pub quantity: Option<f64>,
    #[serde(deserialize_with = "lenient::amount")]
    pub unit_price: Option<f64>,
    #[serde(deserialize_with = "lenient::amount")]
    pub total_price: Option<f64>,
    #[serde(deserialize_with = "lenient::option")]
    pub category: Option<String>,
}

/// AI解析で抽出された領収書データ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedData {
    #[serde(deserialize_with = "lenient::option")]
    pub merchant_name: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub merchant_address: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub receipt_date: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub receipt_time: Option<String>,
    #[serde(deserialize_with = "lenient::seq")]
    pub items: Vec<ExtractedItem>,
    #[serde(deserialize_with = "lenient::amount")]
    pub subtotal: Option<f64>,
    #[serde(deserialize_with = "lenient::amount")]
    pub tax_amount: Option<f64>,
    #[serde(deserialize_with = "lenient::amount")]
    pub total_amount: Option<f64>,
    #[serde(deserialize_with = "lenient::option")]
    pub currency: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub receipt_number: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub payment_method: Option<String>,
    #[serde(deserialize_with = "lenient::amount")]
    pub confidence_score: Option<f64>,
}

/// ストアが保持する正規化済みの領収書
///
/// `extracted_data` は `Processed` のときだけ、`processing_error` は `Error` のときだけ設定される
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub status: ReceiptStatus,
    pub file_metadata: FileMetadata,
    pub download_url: Option<String>,
    pub extracted_data: Option<ExtractedData>,
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receipt {
    /// 解析を開始する（`uploaded` または `error` からのみ遷移可能）
    pub fn start_processing(&self, at: DateTime<Utc>) -> AppResult<Receipt> {
        if !self.status.can_start_processing() {
            return Err(AppError::validation(format!(
                "領収書 {} はステータス {} のため解析を開始できません",
                self.id, self.status
            )));
        }

        Ok(Receipt {
            status: ReceiptStatus::Processing,
            updated_at: at,
            ..self.clone()
        })
    }

    /// 解析成功を反映する（`processing` からのみ遷移可能）
    pub fn complete_processing(&self, data: ExtractedData, at: DateTime<Utc>) -> AppResult<Receipt> {
        self.ensure_processing()?;
        Ok(Receipt {
            status: ReceiptStatus::Processed,
            extracted_data: Some(data),
            processing_error: None,
            updated_at: at,
            ..self.clone()
        })
    }

    /// 解析失敗を反映する（`processing` からのみ遷移可能）
    pub fn fail_processing(&self, message: impl Into<String>, at: DateTime<Utc>) -> AppResult<Receipt> {
        self.ensure_processing()?;
        Ok(Receipt {
            status: ReceiptStatus::Error,
            extracted_data: None,
            processing_error: Some(message.into()),
            updated_at: at,
            ..self.clone()
        })
    }

    fn ensure_processing(&self) -> AppResult<()> {
        if self.status != ReceiptStatus::Processing {
            return Err(AppError::validation(format!(
                "領収書 {} は解析中ではありません（ステータス: {}）",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// 店舗名（解析済みの場合のみ）
    pub fn merchant_name(&self) -> Option<&str> {
        self.extracted_data
            .as_ref()
            .and_then(|data| data.merchant_name.as_deref())
    }

    /// 合計金額（解析済みの場合のみ）
    pub fn total_amount(&self) -> Option<f64> {
        self.extracted_data
            .as_ref()
            .and_then(|data| data.total_amount)
    }

    /// 元のファイル名
    pub fn filename(&self) -> Option<&str> {
        self.file_metadata.original_filename.as_deref()
    }

    /// 表示名（店舗名 → ファイル名 → "Receipt" の順）
    pub fn display_name(&self) -> &str {
        self.merchant_name()
            .or_else(|| self.filename())
            .unwrap_or("Receipt")
    }

    /// ファイル種別のラベル（`image/jpeg` → `JPEG`）
    pub fn file_type_label(&self) -> String {
        self.file_metadata
            .content_type
            .as_deref()
            .and_then(|content_type| content_type.split('/').nth(1))
            .filter(|subtype| !subtype.is_empty())
            .map(|subtype| subtype.to_uppercase())
            .unwrap_or_else(|| "FILE".to_string())
    }
}

/// アップロード対象のファイル
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ReceiptFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// ローカルファイルを読み込む（Content-Typeは拡張子から推定）
    pub fn from_path(path: impl AsRef<std::path::Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                AppError::validation(format!("ファイル名の取得に失敗しました: {}", path.display()))
            })?
            .to_string();

        let data = std::fs::read(path)?;
        let content_type = content_type_for(&filename).to_string();
        log::debug!(
            "ファイルを読み込みました: filename={filename}, size={}, content_type={content_type}",
            data.len()
        );

        Ok(Self {
            filename,
            content_type,
            data,
        })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// ファイル名の拡張子からContent-Typeを推定する
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ---- APIサーバーのレスポンス形式 ----

/// ファイルメタデータ（APIレスポンス上の生の形）
///
/// 旧形式のキー（`filename` / `size` / `type`）と
/// 新形式のキー（`original_filename` / `file_size` / `content_type`）が混在する
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFileMetadata {
    #[serde(deserialize_with = "lenient::option")]
    pub filename: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub original_filename: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub stored_filename: Option<String>,
    #[serde(deserialize_with = "lenient::size")]
    pub size: Option<u64>,
    #[serde(deserialize_with = "lenient::size")]
    pub file_size: Option<u64>,
    #[serde(rename = "type", deserialize_with = "lenient::option")]
    pub file_type: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub content_type: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub upload_date: Option<String>,
}

/// アップロードAPIのレスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, deserialize_with = "lenient::option")]
    pub success: Option<bool>,
    pub receipt_id: String,
    #[serde(default, deserialize_with = "lenient::option")]
    pub download_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub metadata: Option<RawFileMetadata>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub message: Option<String>,
}

/// 一覧・詳細APIが返す領収書
///
/// `id` 以外の項目は形式が想定と異なっても失敗にせず `None` として扱う
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReceipt {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::option")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub file_metadata: Option<RawFileMetadata>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub download_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub extracted_data: Option<ExtractedData>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub processing_error: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub updated_at: Option<String>,
}

/// 解析APIのレスポンス
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessResponse {
    pub success: bool,
    #[serde(deserialize_with = "lenient::option")]
    pub extracted_data: Option<ExtractedData>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// 解析ステータスAPIのレスポンス
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingStatusResponse {
    pub receipt_id: Option<String>,
    pub status: Option<String>,
    pub processing_error: Option<String>,
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProcessingStatusResponse {
    /// ステータス文字列を解析する
    pub fn receipt_status(&self) -> Option<ReceiptStatus> {
        self.status.as_deref().and_then(ReceiptStatus::parse)
    }
}

/// 自然言語問い合わせのリクエスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// 自然言語問い合わせのレスポンス
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryResponse {
    pub answer: Option<String>,
    pub confidence: Option<f64>,
    pub sources: Vec<String>,
    pub suggested_actions: Vec<String>,
}
