// 領収書ストア
//
// すべての画面が参照する唯一の状態。更新は ReceiptAction の reduce でのみ行い、
// 公開済みのスナップショットは書き換えずに新しい Arc で置き換える。

use super::models::{BackendStatus, Receipt};
use log::{debug, error, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// ストアのスナップショット
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReceiptState {
    /// 追加が新しい順
    pub receipts: Vec<Receipt>,
    pub current_receipt: Option<Receipt>,
    pub loading: bool,
    pub error: Option<String>,
    pub backend_status: BackendStatus,
    /// サーバー報告の総件数、または楽観的追加後のローカル件数
    pub total_count: u64,
}

impl ReceiptState {
    /// IDで領収書を検索
    pub fn find(&self, receipt_id: &str) -> Option<&Receipt> {
        self.receipts.iter().find(|receipt| receipt.id == receipt_id)
    }
}

/// ストアに対する更新操作
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiptAction {
    SetLoading(bool),
    /// エラーを設定し、読み込み中フラグを下ろす
    SetError(Option<String>),
    /// 一覧を丸ごと置き換える（total がなければ件数を使う）
    ReplaceAll {
        receipts: Vec<Receipt>,
        total: Option<u64>,
    },
    /// 先頭に楽観的に追加する
    InsertFront(Receipt),
    /// 同じIDの領収書を置き換える。見つからなければ何もしない（追加はしない）
    UpsertById(Receipt),
    SetCurrent(Option<Receipt>),
    SetBackendStatus(BackendStatus),
    ClearError,
}

impl ReceiptAction {
    /// ログ出力用の操作名
    pub fn name(&self) -> &'static str {
        match self {
            ReceiptAction::SetLoading(_) => "SetLoading",
            ReceiptAction::SetError(_) => "SetError",
            ReceiptAction::ReplaceAll { .. } => "ReplaceAll",
            ReceiptAction::InsertFront(_) => "InsertFront",
            ReceiptAction::UpsertById(_) => "UpsertById",
            ReceiptAction::SetCurrent(_) => "SetCurrent",
            ReceiptAction::SetBackendStatus(_) => "SetBackendStatus",
            ReceiptAction::ClearError => "ClearError",
        }
    }
}

/// 現在の状態と操作から次の状態を計算する（副作用なし）
pub fn reduce(state: &ReceiptState, action: ReceiptAction) -> ReceiptState {
    match action {
        ReceiptAction::SetLoading(loading) => ReceiptState {
            loading,
            ..state.clone()
        },
        ReceiptAction::SetError(message) => ReceiptState {
            error: message,
            loading: false,
            ..state.clone()
        },
        ReceiptAction::ClearError => ReceiptState {
            error: None,
            ..state.clone()
        },
        ReceiptAction::ReplaceAll { receipts, total } => {
            let receipts = dedup_by_id(receipts);
            // サーバーの件数が0でもページに領収書があればページの件数を使う
            let total_count = total
                .filter(|total| *total > 0)
                .unwrap_or(receipts.len() as u64);
            ReceiptState {
                receipts,
                total_count,
                loading: false,
                ..state.clone()
            }
        }
        ReceiptAction::InsertFront(receipt) => {
            let already_present = state.find(&receipt.id).is_some();
            let mut receipts = Vec::with_capacity(state.receipts.len() + 1);
            receipts.push(receipt.clone());
            receipts.extend(
                state
                    .receipts
                    .iter()
                    .filter(|existing| existing.id != receipt.id)
                    .cloned(),
            );

            let total_count = if already_present {
                warn!("同じIDの領収書が既に存在するため置き換えます: id={}", receipt.id);
                state.total_count
            } else {
                state.total_count + 1
            };

            ReceiptState {
                receipts,
                total_count,
                ..state.clone()
            }
        }
        ReceiptAction::UpsertById(receipt) => {
            if state.find(&receipt.id).is_none() {
                // 追加はしない。リロード直後の解析結果などはここで破棄される
                warn!("更新対象の領収書が一覧に存在しません: id={}", receipt.id);
            }

            let receipts = state
                .receipts
                .iter()
                .map(|existing| {
                    if existing.id == receipt.id {
                        receipt.clone()
                    } else {
                        existing.clone()
                    }
                })
                .collect();

            let current_receipt = match &state.current_receipt {
                Some(current) if current.id == receipt.id => Some(receipt),
                other => other.clone(),
            };

            ReceiptState {
                receipts,
                current_receipt,
                ..state.clone()
            }
        }
        ReceiptAction::SetCurrent(receipt) => ReceiptState {
            current_receipt: receipt,
            ..state.clone()
        },
        ReceiptAction::SetBackendStatus(backend_status) => ReceiptState {
            backend_status,
            ..state.clone()
        },
    }
}

/// 重複したIDを取り除く（最初に現れたものを残す）
fn dedup_by_id(receipts: Vec<Receipt>) -> Vec<Receipt> {
    let mut seen = HashSet::with_capacity(receipts.len());
    receipts
        .into_iter()
        .filter(|receipt| {
            let first = seen.insert(receipt.id.clone());
            if !first {
                warn!("一覧に重複したIDが含まれているため読み飛ばします: id={}", receipt.id);
            }
            first
        })
        .collect()
}

/// 領収書ストア
///
/// 複製しても同じ状態を共有する。購読者には `watch` チャネルで
/// 新しいスナップショットが通知される
#[derive(Debug, Clone)]
pub struct ReceiptStore {
    sender: Arc<watch::Sender<Arc<ReceiptState>>>,
}

impl Default for ReceiptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptStore {
    /// 初期状態のストアを作成
    pub fn new() -> Self {
        Self::with_state(ReceiptState::default())
    }

    /// 指定した状態でストアを作成
    pub fn with_state(state: ReceiptState) -> Self {
        let (sender, _) = watch::channel(Arc::new(state));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// 現在のスナップショットを取得
    pub fn snapshot(&self) -> Arc<ReceiptState> {
        self.sender.borrow().clone()
    }

    /// 状態の変更を購読する（読み取り専用）
    pub fn subscribe(&self) -> watch::Receiver<Arc<ReceiptState>> {
        self.sender.subscribe()
    }

    /// IDで領収書を検索
    pub fn find(&self, receipt_id: &str) -> Option<Receipt> {
        self.sender.borrow().find(receipt_id).cloned()
    }

    /// 操作を適用する
    ///
    /// # 戻り値
    /// 状態が変化して新しいスナップショットが公開された場合はtrue
    pub fn dispatch(&self, action: ReceiptAction) -> bool {
        let name = action.name();
        if let ReceiptAction::SetError(Some(message)) = &action {
            error!("ストアにエラーを設定します: {message}");
        }

        let changed = self.sender.send_if_modified(|current| {
            let next = reduce(&**current, action);
            if next == **current {
                false
            } else {
                *current = Arc::new(next);
                true
            }
        });

        debug!("ストア操作: action={name}, changed={changed}");
        changed
    }

    pub fn set_loading(&self, loading: bool) -> bool {
        self.dispatch(ReceiptAction::SetLoading(loading))
    }

    pub fn set_error(&self, message: Option<String>) -> bool {
        self.dispatch(ReceiptAction::SetError(message))
    }

    pub fn clear_error(&self) -> bool {
        self.dispatch(ReceiptAction::ClearError)
    }

    pub fn replace_all(&self, receipts: Vec<Receipt>, total: Option<u64>) -> bool {
        self.dispatch(ReceiptAction::ReplaceAll { receipts, total })
    }

    pub fn insert_front(&self, receipt: Receipt) -> bool {
        self.dispatch(ReceiptAction::InsertFront(receipt))
    }

    pub fn upsert_by_id(&self, receipt: Receipt) -> bool {
        self.dispatch(ReceiptAction::UpsertById(receipt))
    }

    pub fn set_current(&self, receipt: Option<Receipt>) -> bool {
        self.dispatch(ReceiptAction::SetCurrent(receipt))
    }

    pub fn set_backend_status(&self, status: BackendStatus) -> bool {
        self.dispatch(ReceiptAction::SetBackendStatus(status))
    }
}
