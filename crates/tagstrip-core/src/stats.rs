//! プロセス全体の統計カウンタ
//!
//! すべてのフローの処理結果を横断的に集計する共有ハンドル。
//! カウンタは観測専用で、処理の正しさには関与しない。
//!
//! フローごとの処理は逐次だが、カウンタ自体は複数フロー（複数スレッド）
//! から同時に更新されうるため、Relaxed オーダリングのアトミック加算で
//! 更新する。統計値なので順序保証は不要。

use core::sync::atomic::{AtomicU64, Ordering};

/// プロセス全体の統計カウンタ
///
/// `Arc<StripStats>` で共有し、各フローの `ChunkProcessor` に渡す。
/// モジュールロード時にゼロで生成し、アンロード時または要求に応じて
/// `snapshot()` で読み出す。
#[derive(Debug)]
pub struct StripStats {
    /// トランスポートから受け取った総バイト数（宣言長ベース）
    bytes_received: AtomicU64,
    /// アプリケーションへ渡した総バイト数
    bytes_delivered: AtomicU64,
    /// 完全に除去したタグの数
    tags_stripped: AtomicU64,
    /// コピー失敗（宣言長と実バイト数の不整合）の回数
    copy_failures: AtomicU64,
    /// 照合モードでのタグ不一致の回数
    tag_mismatches: AtomicU64,
    /// タグの残りだけでチャンクが尽きた回数
    tag_only_chunks: AtomicU64,
}

impl StripStats {
    /// ゼロ状態のカウンタを生成する
    pub fn new() -> Self {
        StripStats {
            bytes_received: AtomicU64::new(0),
            bytes_delivered: AtomicU64::new(0),
            tags_stripped: AtomicU64::new(0),
            copy_failures: AtomicU64::new(0),
            tag_mismatches: AtomicU64::new(0),
            tag_only_chunks: AtomicU64::new(0),
        }
    }

    /// 受信バイト数を加算する
    pub fn add_bytes_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    /// 出力バイト数を加算する
    pub fn add_bytes_delivered(&self, n: u64) {
        self.bytes_delivered.fetch_add(n, Ordering::Relaxed);
    }

    /// 除去タグ数を加算する
    pub fn add_tags_stripped(&self, n: u64) {
        self.tags_stripped.fetch_add(n, Ordering::Relaxed);
    }

    /// コピー失敗を記録する
    pub fn incr_copy_failures(&self) {
        self.copy_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// タグ不一致を記録する
    pub fn incr_tag_mismatches(&self) {
        self.tag_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// タグだけのチャンクを記録する
    pub fn incr_tag_only_chunks(&self) {
        self.tag_only_chunks.fetch_add(1, Ordering::Relaxed);
    }

    /// 現在値のスナップショットを取る
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            tags_stripped: self.tags_stripped.load(Ordering::Relaxed),
            copy_failures: self.copy_failures.load(Ordering::Relaxed),
            tag_mismatches: self.tag_mismatches.load(Ordering::Relaxed),
            tag_only_chunks: self.tag_only_chunks.load(Ordering::Relaxed),
        }
    }

    /// すべてのカウンタをゼロに戻す
    pub fn reset(&self) {
        self.bytes_received.store(0, Ordering::Relaxed);
        self.bytes_delivered.store(0, Ordering::Relaxed);
        self.tags_stripped.store(0, Ordering::Relaxed);
        self.copy_failures.store(0, Ordering::Relaxed);
        self.tag_mismatches.store(0, Ordering::Relaxed);
        self.tag_only_chunks.store(0, Ordering::Relaxed);
    }
}

impl Default for StripStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 統計カウンタのスナップショット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// 受信総バイト数
    pub bytes_received: u64,
    /// 出力総バイト数
    pub bytes_delivered: u64,
    /// 除去タグ総数
    pub tags_stripped: u64,
    /// コピー失敗回数
    pub copy_failures: u64,
    /// タグ不一致回数
    pub tag_mismatches: u64,
    /// タグだけのチャンクの回数
    pub tag_only_chunks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    #[test]
    fn test_new_is_zero() {
        let stats = StripStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = StripStats::new();
        stats.add_bytes_received(132);
        stats.add_bytes_delivered(100);
        stats.add_tags_stripped(1);
        stats.incr_copy_failures();
        stats.incr_tag_mismatches();
        stats.incr_tag_only_chunks();

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_received, 132);
        assert_eq!(snap.bytes_delivered, 100);
        assert_eq!(snap.tags_stripped, 1);
        assert_eq!(snap.copy_failures, 1);
        assert_eq!(snap.tag_mismatches, 1);
        assert_eq!(snap.tag_only_chunks, 1);
    }

    #[test]
    fn test_shared_handle_aggregates() {
        // 複数フローが同じハンドルに加算する
        let stats = Arc::new(StripStats::new());
        let a = Arc::clone(&stats);
        let b = Arc::clone(&stats);

        a.add_bytes_received(10);
        b.add_bytes_received(20);

        assert_eq!(stats.snapshot().bytes_received, 30);
    }

    #[test]
    fn test_reset() {
        let stats = StripStats::new();
        stats.add_bytes_received(42);
        stats.add_tags_stripped(3);
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
