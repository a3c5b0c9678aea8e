// アップロード進捗の擬似表示
//
// トランスポート層はバイト単位の進捗を公開していないため、タイマーで
// 増加していく疑似的な値を通知する。実際の進捗が必要になった場合は
// ストリーミング対応のトランスポートに置き換える必要がある。

use crate::shared::errors::AppResult;
use log::debug;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

/// 擬似進捗の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticProgress {
    /// 通知間隔
    pub tick: Duration,
    /// 開始から100%を通知するまでの最短時間
    pub settle_delay: Duration,
    /// リクエスト完了前に通知する上限値
    pub ceiling: f64,
}

impl Default for SyntheticProgress {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            settle_delay: Duration::from_millis(1000),
            ceiling: 90.0,
        }
    }
}

impl SyntheticProgress {
    /// リクエストを実行し、並行して擬似進捗を通知する
    ///
    /// 進捗の通知はバックグラウンドタスクで行い、リクエストの結果は完了次第すぐに返す。
    ///
    /// # 動作
    /// - リクエスト実行中は `tick` ごとに `ceiling` 以下の単調増加する乱数を通知
    /// - 成功した場合は、開始から `settle_delay` 経過後に 100 を通知
    /// - 失敗した場合はそこで通知を止める（100 は通知しない）
    ///
    /// 通知が終わるとコールバックは破棄される
    pub async fn track<T, Fut, P>(&self, request: Fut, on_progress: P) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
        P: FnMut(f64) + Send + 'static,
    {
        let started = Instant::now();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let progress = *self;
        tokio::spawn(async move {
            progress.drive(started, outcome_rx, on_progress).await;
        });

        let result = request.await;
        // 受信側が既に終了している場合は送信に失敗するが、問題はない
        let _ = outcome_tx.send(result.is_ok());
        result
    }

    /// 結果を受け取るまでタイマーで進捗を通知する
    async fn drive<P>(
        self,
        started: Instant,
        mut outcome: oneshot::Receiver<bool>,
        mut on_progress: P,
    ) where
        P: FnMut(f64),
    {
        let mut ticker = tokio::time::interval_at(started + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut current = 0.0;

        let succeeded = loop {
            tokio::select! {
                // 送信側が破棄された（リクエストが中断された）場合は失敗扱い
                outcome = &mut outcome => break outcome.unwrap_or(false),
                _ = ticker.tick() => {
                    current = self.next_value(current);
                    on_progress(current);
                }
            }
        };

        if !succeeded {
            debug!("アップロードが完了しなかったため進捗通知を終了します");
            return;
        }

        tokio::time::sleep_until(started + self.settle_delay).await;
        debug!("アップロード完了、進捗を100%にします");
        on_progress(100.0);
    }

    /// 次の進捗値（直前の値以上、上限以下）
    fn next_value(&self, current: f64) -> f64 {
        let candidate: f64 = rand::thread_rng().gen_range(0.0..100.0);
        current.max(candidate.min(self.ceiling))
    }
}
