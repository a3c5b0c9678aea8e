// アップロード前のファイル検証
//
// ネットワーク呼び出しの前に実行し、失敗してもストアには触れない

use super::models::ReceiptFile;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::format_file_size;

/// アップロード可能なContent-Type
pub const ALLOWED_CONTENT_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
];

/// 最大ファイルサイズ（10MB）
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// アップロード対象ファイルを検証する
///
/// # バリデーション規則
/// - 画像または動画の許可された形式であること
/// - 空ファイルでないこと
/// - 10MB以下であること
pub fn validate_receipt_file(file: &ReceiptFile) -> AppResult<()> {
    let content_type = file.content_type.trim().to_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::validation(format!(
            "サポートされていないファイル形式です: {}（画像または動画ファイルを選択してください）",
            file.content_type
        )));
    }

    let size = file.size();
    if size == 0 {
        return Err(AppError::validation("空のファイルはアップロードできません"));
    }

    if size > MAX_FILE_SIZE {
        return Err(AppError::validation(format!(
            "ファイルサイズが制限を超えています: {}（最大: {}）",
            format_file_size(size),
            format_file_size(MAX_FILE_SIZE)
        )));
    }

    Ok(())
}

/// 問い合わせ文を検証し、前後の空白を除いたものを返す
pub fn validate_query(query: &str) -> AppResult<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("質問を入力してください"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_allowed_types() {
        for content_type in ALLOWED_CONTENT_TYPES {
            let file = ReceiptFile::new("receipt", content_type, vec![0u8; 10]);
            assert!(validate_receipt_file(&file).is_ok(), "{content_type}");
        }

        // 大文字でも許可
        let upper = ReceiptFile::new("a.png", "IMAGE/PNG", vec![1]);
        assert!(validate_receipt_file(&upper).is_ok());
    }

    #[test]
    fn test_rejects_disallowed_type() {
        let file = ReceiptFile::new("doc.pdf", "application/pdf", vec![1, 2, 3]);
        let result = validate_receipt_file(&file);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_rejects_size_limits() {
        let empty = ReceiptFile::new("a.jpg", "image/jpeg", Vec::new());
        assert!(validate_receipt_file(&empty).is_err());

        let exact = ReceiptFile::new("a.jpg", "image/jpeg", vec![0u8; MAX_FILE_SIZE as usize]);
        assert!(validate_receipt_file(&exact).is_ok());

        let too_big = ReceiptFile::new(
            "a.jpg",
            "image/jpeg",
            vec![0u8; MAX_FILE_SIZE as usize + 1],
        );
        let error = validate_receipt_file(&too_big).unwrap_err();
        assert!(error.message().contains("10 MB"));
    }

    #[test]
    fn test_validate_query() {
        assert_eq!(validate_query("  how much?  ").unwrap(), "how much?");
        assert!(validate_query("   ").is_err());
    }
}
