/// 機能別モジュール
///
/// 各機能モジュールは、その機能に関連するコード（モデル、正規化、状態管理、API呼び出し）
/// を含む自己完結型のユニットです。
pub mod receipts;
