//! # tagstrip-core
//!
//! 受信バイトストリームから周期的に埋め込まれた固定長タグを除去する
//! ストリーム処理のコア状態機械。
//!
//! ## ストリームの形
//!
//! 上流のピアはアプリケーションデータ `PERIOD` バイトごとに
//! `TAG_LEN` バイトのタグを挿入する：
//!
//! ```text
//! [data: PERIOD bytes][tag: TAG_LEN bytes][data: PERIOD bytes][tag: TAG_LEN bytes]...
//! ```
//!
//! トランスポートが届けるチャンクの境界は周期ともタグとも揃わないため、
//! チャンクをまたぐタグ・周期の残りを `StreamSession` が持ち越し、
//! `ChunkProcessor` が次のチャンク先頭から正しく再開する。
//!
//! ## 処理モデル
//!
//! - チャンクは 1 回だけ左から右へ消費される（先読みも再読もなし）
//! - タグのバイト列はデフォルトでは照合せず位置だけで読み飛ばす
//!   （「周期整合を信頼する」ポリシー。照合は設定で明示的に有効化できる）
//! - フローごとの `StreamSession` は逐次アクセスのみ（ロック不要）、
//!   プロセス全体の `StripStats` はアトミックカウンタで共有する

#![no_std]
extern crate alloc;

pub mod config;
pub mod cursor;
pub mod error;
pub mod processor;
pub mod session;
pub mod stats;

pub use config::TagConfig;
pub use cursor::ChunkCursor;
pub use error::StripError;
pub use processor::ChunkProcessor;
pub use session::{CarryOver, StreamSession};
pub use stats::{StatsSnapshot, StripStats};

/// デフォルトの周期（タグ間のアプリケーションデータのバイト数）
pub const DEFAULT_PERIOD: usize = 100;

/// デフォルトのタグパターン（32 バイト）
///
/// 照合モードが無効の間は長さだけが意味を持つ。
pub const DEFAULT_TAG_PATTERN: &[u8; 32] = b"XTAGTAGTAGTAGTAGTAGTAGTAGTAGTAGX";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_len() {
        assert_eq!(DEFAULT_TAG_PATTERN.len(), 32);
    }

    #[test]
    fn test_default_config_uses_defaults() {
        let config = TagConfig::default_config();
        assert_eq!(config.period(), DEFAULT_PERIOD);
        assert_eq!(config.tag_len(), DEFAULT_TAG_PATTERN.len());
    }
}
