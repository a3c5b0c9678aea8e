use thiserror::Error;

/// アプリケーション全体で使用される統一エラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// バリデーション関連のエラー（ネットワーク呼び出し前に検出される）
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// リソースが見つからない場合のエラー
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 外部サービス（APIサーバー）との通信エラー
    #[error("外部サービスエラー: {0}")]
    ExternalService(String),

    /// バックエンドが報告した解析処理の失敗
    #[error("解析処理エラー: {0}")]
    Processing(String),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    /// JSON解析エラー
    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（外部サービス一時的エラーなど）
    Medium,
    /// 高重要度（設定エラーなど）
    High,
    /// 最重要
    Critical,
}

impl AppError {
    /// エラーが保持しているメッセージ本体を取得
    ///
    /// ストアの `error` や領収書の `processing_error` にはこの値が書き込まれる
    pub fn message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::ExternalService(msg)
            | AppError::Processing(msg)
            | AppError::Configuration(msg) => msg.clone(),
            AppError::Io(e) => e.to_string(),
            AppError::Json(e) => e.to_string(),
        }
    }

    /// ユーザーに表示するためのフレンドリーなメッセージを取得
    ///
    /// # 戻り値
    /// ユーザーに表示可能なエラーメッセージ
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Validation(msg) => msg,
            AppError::NotFound(msg) => msg,
            AppError::ExternalService(_) => "外部サービスとの通信でエラーが発生しました",
            AppError::Processing(msg) => msg,
            AppError::Configuration(_) => "設定エラーが発生しました",
            AppError::Io(_) => "ファイル操作でエラーが発生しました",
            AppError::Json(_) => "データ形式の解析でエラーが発生しました",
        }
    }

    /// エラーの詳細情報を取得（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    ///
    /// # 戻り値
    /// エラーの重要度レベル
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Validation(_) => ErrorSeverity::Low,
            AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::ExternalService(_) => ErrorSeverity::Medium,
            AppError::Processing(_) => ErrorSeverity::Medium,
            AppError::Configuration(_) => ErrorSeverity::High,
            AppError::Io(_) => ErrorSeverity::Medium,
            AppError::Json(_) => ErrorSeverity::Medium,
        }
    }

    /// バリデーションエラーを作成するヘルパー関数
    pub fn validation<S: Into<String>>(message: S) -> Self {
        AppError::Validation(message.into())
    }

    /// リソース未発見エラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `resource` - 見つからなかったリソース名
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    /// 外部サービスエラーを作成するヘルパー関数
    pub fn external_service<S: Into<String>>(message: S) -> Self {
        AppError::ExternalService(message.into())
    }

    /// 解析処理エラーを作成するヘルパー関数
    pub fn processing<S: Into<String>>(message: S) -> Self {
        AppError::Processing(message.into())
    }

    /// 設定エラーを作成するヘルパー関数
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }
}

/// AppErrorからStringへの変換（画面側での表示用）
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.user_message().to_string()
    }
}

/// Result型のエイリアス（アプリケーション全体で使用）
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        assert_eq!(
            AppError::validation("テスト").severity(),
            ErrorSeverity::Low
        );
        assert_eq!(AppError::not_found("領収書").severity(), ErrorSeverity::Low);
        assert_eq!(
            AppError::external_service("接続失敗").severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(
            AppError::processing("timeout").severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(
            AppError::configuration("URL未設定").severity(),
            ErrorSeverity::High
        );
    }

    #[test]
    fn test_message_is_bare() {
        // ラップ前のメッセージがそのまま取り出せること
        assert_eq!(AppError::external_service("timeout").message(), "timeout");
        assert_eq!(AppError::processing("OCR失敗").message(), "OCR失敗");
        assert_eq!(
            AppError::not_found("領収書 r1").message(),
            "領収書 r1が見つかりません"
        );
    }

    #[test]
    fn test_user_message() {
        let validation_error = AppError::validation("ファイルサイズが大きすぎます");
        assert_eq!(
            validation_error.user_message(),
            "ファイルサイズが大きすぎます"
        );

        let external_error = AppError::external_service("connection refused");
        assert_eq!(
            external_error.user_message(),
            "外部サービスとの通信でエラーが発生しました"
        );
    }

    #[test]
    fn test_string_conversion() {
        let error = AppError::validation("テストエラー");
        let error_string: String = error.into();
        assert_eq!(error_string, "テストエラー");
    }

    #[test]
    fn test_error_details() {
        let error = AppError::validation("詳細テスト");
        let details = error.details();
        assert!(details.contains("バリデーションエラー"));
        assert!(details.contains("詳細テスト"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: AppError = parse_error.into();
        assert!(matches!(error, AppError::Json(_)));
        assert!(!error.message().is_empty());
    }
}
