// 領収書機能モジュール

pub mod coordinator;
pub mod gateway;
pub mod models;
pub mod normalizer;
pub mod progress;
pub mod selectors;
pub mod store;
pub mod validation;

// 公開インターフェース

// モデル
pub use models::{
    BackendStatus, ExtractedData, ExtractedItem, FileMetadata, ProcessResponse,
    ProcessingStatusResponse, QueryResponse, Receipt, ReceiptFile, ReceiptStatus, ServerReceipt,
    UploadResponse,
};

// 状態管理
pub use store::{reduce, ReceiptAction, ReceiptState, ReceiptStore};

// APIゲートウェイ
pub use gateway::{HttpReceiptGateway, ReceiptGateway};

// ワークフロー
pub use coordinator::{QueryAnswer, ReceiptCoordinator};
pub use progress::SyntheticProgress;
pub use selectors::SortKey;
