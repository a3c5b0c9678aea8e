// APIレスポンスを正規化済みの Receipt に変換する純粋関数群

use super::models::{
    FileMetadata, RawFileMetadata, Receipt, ReceiptStatus, ServerReceipt, UploadResponse,
};
use crate::shared::utils::parse_timestamp_or;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde_json::Value;

/// 一覧APIの結果を正規化したもの
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptPage {
    pub receipts: Vec<Receipt>,
    /// サーバーが報告した総件数（報告がない場合はNone）
    pub total: Option<u64>,
}

/// アップロードレスポンスを Receipt に変換する
///
/// ステータスは常に `uploaded`、解析データは常に空になる
pub fn normalize_upload(response: &UploadResponse) -> Receipt {
    normalize_upload_at(response, Utc::now())
}

/// 時刻を指定してアップロードレスポンスを変換する
pub fn normalize_upload_at(response: &UploadResponse, now: DateTime<Utc>) -> Receipt {
    debug!("アップロードレスポンスを正規化: receipt_id={}", response.receipt_id);

    Receipt {
        id: response.receipt_id.clone(),
        status: ReceiptStatus::Uploaded,
        file_metadata: normalize_file_metadata(response.metadata.as_ref(), now),
        download_url: response.download_url.clone(),
        extracted_data: None,
        processing_error: None,
        created_at: now,
        updated_at: now,
    }
}

/// 一覧・詳細APIの領収書を Receipt に変換する
///
/// `status` / `extracted_data` / `processing_error` はサーバーの値をそのまま使う
pub fn normalize_server_receipt(payload: &ServerReceipt) -> Receipt {
    normalize_server_receipt_at(payload, Utc::now())
}

/// 時刻を指定して一覧・詳細APIの領収書を変換する
///
/// `now` は日時が欠けている場合のフォールバックにのみ使う
pub fn normalize_server_receipt_at(payload: &ServerReceipt, now: DateTime<Utc>) -> Receipt {
    let status = match payload.status.as_deref() {
        Some(raw) => ReceiptStatus::parse(raw).unwrap_or_else(|| {
            warn!(
                "不明なステータスを受信したため uploaded として扱います: id={}, status={raw}",
                payload.id
            );
            ReceiptStatus::Uploaded
        }),
        None => {
            warn!("ステータスがないため uploaded として扱います: id={}", payload.id);
            ReceiptStatus::Uploaded
        }
    };

    let created_at = parse_timestamp_or(payload.created_at.as_deref(), now);
    let updated_at = parse_timestamp_or(payload.updated_at.as_deref(), created_at);

    Receipt {
        id: payload.id.clone(),
        status,
        file_metadata: normalize_file_metadata(payload.file_metadata.as_ref(), created_at),
        download_url: payload.download_url.clone(),
        extracted_data: payload.extracted_data.clone(),
        processing_error: payload.processing_error.clone(),
        created_at,
        updated_at,
    }
}

/// ファイルメタデータの二重キーを解決する
///
/// 先に見つかった値を優先する:
/// `filename` → `original_filename`、`size` → `file_size`、`type` → `content_type`
pub fn normalize_file_metadata(
    raw: Option<&RawFileMetadata>,
    fallback_date: DateTime<Utc>,
) -> FileMetadata {
    let Some(raw) = raw else {
        return FileMetadata {
            original_filename: None,
            stored_filename: None,
            file_size: None,
            content_type: None,
            upload_date: fallback_date,
        };
    };

    FileMetadata {
        original_filename: raw
            .filename
            .clone()
            .or_else(|| raw.original_filename.clone()),
        stored_filename: raw.stored_filename.clone(),
        file_size: raw.size.or(raw.file_size),
        content_type: raw.file_type.clone().or_else(|| raw.content_type.clone()),
        upload_date: parse_timestamp_or(raw.upload_date.as_deref(), fallback_date),
    }
}

/// 一覧APIのレスポンスを正規化する
///
/// # レスポンス形式
/// 1. `{ "receipts": [...], "total": n }` → receipts と total を使う
/// 2. `[...]`（配列そのもの） → 配列を receipts とし、total は配列の要素数
/// 3. それ以外 → 空の結果（エラーにはしない）
///
/// 要素単位で解析できないもの（`id` がないなど）は読み飛ばす
pub fn normalize_list_response(response: Value) -> ReceiptPage {
    match response {
        Value::Object(mut body) if body.get("receipts").is_some_and(Value::is_array) => {
            let total = body.get("total").and_then(Value::as_u64);
            let items = match body.remove("receipts") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            ReceiptPage {
                receipts: normalize_items(items),
                total,
            }
        }
        Value::Array(items) => {
            // 読み飛ばした要素も件数に含める
            let total = Some(items.len() as u64);
            ReceiptPage {
                receipts: normalize_items(items),
                total,
            }
        }
        other => {
            warn!("想定外の一覧レスポンス形式のため空として扱います: {other}");
            ReceiptPage {
                receipts: Vec::new(),
                total: Some(0),
            }
        }
    }
}

fn normalize_items(items: Vec<Value>) -> Vec<Receipt> {
    let now = Utc::now();
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ServerReceipt>(item) {
            Ok(payload) => Some(normalize_server_receipt_at(&payload, now)),
            Err(e) => {
                warn!("領収書データの解析に失敗したため読み飛ばします: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upload_response(value: Value) -> UploadResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_upload_legacy_keys() {
        let response = upload_response(json!({
            "receipt_id": "r9",
            "metadata": { "filename": "a.jpg", "size": 120 }
        }));

        let receipt = normalize_upload(&response);
        assert_eq!(receipt.id, "r9");
        assert_eq!(receipt.file_metadata.original_filename.as_deref(), Some("a.jpg"));
        assert_eq!(receipt.file_metadata.file_size, Some(120));
        assert_eq!(receipt.status, ReceiptStatus::Uploaded);
        assert!(receipt.extracted_data.is_none());
        assert!(receipt.processing_error.is_none());
        assert!(receipt.download_url.is_none());
    }

    #[test]
    fn test_normalize_upload_first_key_wins() {
        let response = upload_response(json!({
            "success": true,
            "receipt_id": "r1",
            "download_url": "https://storage.example.com/r1.png",
            "metadata": {
                "filename": "first.png",
                "original_filename": "second.png",
                "stored_filename": "receipts/123_abc.png",
                "file_size": 300,
                "type": "image/png",
                "content_type": "image/jpeg"
            }
        }));

        let now = Utc::now();
        let receipt = normalize_upload_at(&response, now);
        let metadata = &receipt.file_metadata;
        assert_eq!(metadata.original_filename.as_deref(), Some("first.png"));
        assert_eq!(metadata.stored_filename.as_deref(), Some("receipts/123_abc.png"));
        // size がないので file_size を使う
        assert_eq!(metadata.file_size, Some(300));
        assert_eq!(metadata.content_type.as_deref(), Some("image/png"));
        assert_eq!(metadata.upload_date, now);
        assert_eq!(receipt.created_at, now);
        assert_eq!(receipt.updated_at, now);
        assert_eq!(
            receipt.download_url.as_deref(),
            Some("https://storage.example.com/r1.png")
        );
    }

    #[test]
    fn test_normalize_upload_without_metadata() {
        let response = upload_response(json!({ "receipt_id": "bare", "metadata": null }));
        let receipt = normalize_upload(&response);
        assert_eq!(receipt.id, "bare");
        assert!(receipt.file_metadata.original_filename.is_none());
        assert!(receipt.file_metadata.file_size.is_none());
    }

    #[test]
    fn test_normalize_server_receipt_passes_through() {
        let payload: ServerReceipt = serde_json::from_value(json!({
            "id": "r2",
            "status": "processed",
            "file_metadata": {
                "original_filename": "dinner.jpg",
                "stored_filename": "receipts/x.jpg",
                "file_size": 4096,
                "content_type": "image/jpeg",
                "upload_date": "2025-07-18T10:30:00"
            },
            "download_url": "https://storage.example.com/x.jpg",
            "extracted_data": {
                "merchant_name": "Bistro",
                "total_amount": 42.0,
                "items": [{ "name": "Pasta", "total_price": 18.0 }]
            },
            "processing_error": null,
            "created_at": "2025-07-18T10:30:00.000000",
            "updated_at": "2025-07-18T10:31:00+00:00"
        }))
        .unwrap();

        let receipt = normalize_server_receipt(&payload);
        assert_eq!(receipt.status, ReceiptStatus::Processed);
        assert_eq!(receipt.merchant_name(), Some("Bistro"));
        assert_eq!(receipt.total_amount(), Some(42.0));
        assert_eq!(receipt.file_metadata.original_filename.as_deref(), Some("dinner.jpg"));
        assert_eq!(receipt.file_metadata.file_size, Some(4096));
        assert!(receipt.updated_at > receipt.created_at);
    }

    #[test]
    fn test_normalize_server_receipt_error_and_unknown_status() {
        let failed: ServerReceipt = serde_json::from_value(json!({
            "id": "r3",
            "status": "error",
            "processing_error": "blurry image"
        }))
        .unwrap();
        let receipt = normalize_server_receipt(&failed);
        assert_eq!(receipt.status, ReceiptStatus::Error);
        assert_eq!(receipt.processing_error.as_deref(), Some("blurry image"));

        let unknown: ServerReceipt =
            serde_json::from_value(json!({ "id": "r4", "status": "pending" })).unwrap();
        assert_eq!(
            normalize_server_receipt(&unknown).status,
            ReceiptStatus::Uploaded
        );
    }

    #[test]
    fn test_normalize_list_object_shape() {
        let page = normalize_list_response(json!({
            "receipts": [
                { "id": "a", "status": "uploaded" },
                { "id": "b", "status": "processing" }
            ],
            "total": 17,
            "limit": 10,
            "offset": 0
        }));
        assert_eq!(page.receipts.len(), 2);
        assert_eq!(page.total, Some(17));
        assert_eq!(page.receipts[1].status, ReceiptStatus::Processing);
    }

    #[test]
    fn test_normalize_list_object_without_total() {
        let page = normalize_list_response(json!({ "receipts": [{ "id": "a" }] }));
        assert_eq!(page.receipts.len(), 1);
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_normalize_list_bare_array() {
        let page = normalize_list_response(json!([{ "id": "r1", "status": "uploaded" }]));
        assert_eq!(page.receipts.len(), 1);
        assert_eq!(page.total, Some(1));
    }

    #[test]
    fn test_normalize_list_unknown_shape_is_empty() {
        for value in [json!({ "items": [] }), json!("nope"), json!(null), json!({ "receipts": null })] {
            let page = normalize_list_response(value);
            assert!(page.receipts.is_empty());
            assert_eq!(page.total, Some(0));
        }
    }

    #[test]
    fn test_normalize_list_skips_invalid_items() {
        let page = normalize_list_response(json!([
            { "id": "ok" },
            { "status": "uploaded" },
            42
        ]));
        assert_eq!(page.receipts.len(), 1);
        assert_eq!(page.receipts[0].id, "ok");
        assert_eq!(page.total, Some(3));
    }

    #[test]
    fn test_normalize_list_keeps_items_with_null_line_items() {
        let page = normalize_list_response(json!([
            { "id": "r1", "status": "processed", "extracted_data": { "items": null } }
        ]));
        assert_eq!(page.receipts.len(), 1);
        let receipt = &page.receipts[0];
        assert_eq!(receipt.id, "r1");
        assert_eq!(receipt.status, ReceiptStatus::Processed);
        assert!(receipt.extracted_data.as_ref().unwrap().items.is_empty());
    }

    #[test]
    fn test_normalize_list_keeps_items_with_string_amount() {
        let page = normalize_list_response(json!({
            "receipts": [{
                "id": "r1",
                "status": "processed",
                "extracted_data": { "merchant_name": "Cafe", "total_amount": "12.50" }
            }],
            "total": 1
        }));
        assert_eq!(page.receipts.len(), 1);
        assert_eq!(page.receipts[0].total_amount(), Some(12.5));
        assert_eq!(page.receipts[0].merchant_name(), Some("Cafe"));
    }

    #[test]
    fn test_normalize_list_keeps_items_with_fractional_file_size() {
        let page = normalize_list_response(json!([{
            "id": "r1",
            "status": "uploaded",
            "file_metadata": { "original_filename": "a.jpg", "file_size": 120.0 }
        }]));
        assert_eq!(page.receipts.len(), 1);
        let metadata = &page.receipts[0].file_metadata;
        assert_eq!(metadata.file_size, Some(120));
        assert_eq!(metadata.original_filename.as_deref(), Some("a.jpg"));
    }
}
