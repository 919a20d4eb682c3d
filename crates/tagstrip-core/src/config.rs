//! タグ除去の設定
//!
//! 周期・タグパターン・照合モードをまとめた不変の設定。モジュールの
//! ロード時に一度だけ構築し、以後は変更しない。

use alloc::vec::Vec;

use crate::error::StripError;
use crate::{DEFAULT_PERIOD, DEFAULT_TAG_PATTERN};

/// タグ除去の設定（構築後は不変）
///
/// タグ長はパターンの長さで決まる。照合モードが無効（デフォルト）の間、
/// パターンの中身は使われず、タグは位置だけで読み飛ばされる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagConfig {
    /// タグ間のアプリケーションデータのバイト数
    period: usize,
    /// タグのバイトパターン（長さ = タグ長）
    pattern: Vec<u8>,
    /// 読み飛ばすタグバイトをパターンと照合するか
    verify_pattern: bool,
}

impl TagConfig {
    /// 周期とタグパターンから設定を構築する
    ///
    /// # エラー
    /// - `StripError::InvalidPeriod`: `period` が 0
    /// - `StripError::EmptyTagPattern`: パターンが空
    pub fn new(period: usize, pattern: Vec<u8>) -> Result<Self, StripError> {
        if period == 0 {
            return Err(StripError::InvalidPeriod);
        }
        if pattern.is_empty() {
            return Err(StripError::EmptyTagPattern);
        }
        Ok(TagConfig {
            period,
            pattern,
            verify_pattern: false,
        })
    }

    /// Base64 エンコードされたタグパターンから設定を構築する
    ///
    /// ホスト設定はバイナリのタグパターンを Base64 文字列で渡してくる。
    ///
    /// # エラー
    /// - `StripError::InvalidBase64`: デコード失敗
    /// - その他は [`TagConfig::new`] と同じ
    pub fn from_base64_pattern(period: usize, pattern_b64: &str) -> Result<Self, StripError> {
        use base64::Engine as _;
        let pattern = base64::engine::general_purpose::STANDARD
            .decode(pattern_b64)
            .map_err(|_| StripError::InvalidBase64)?;
        Self::new(period, pattern)
    }

    /// デフォルト設定（周期 100 バイト、32 バイトタグ）
    pub fn default_config() -> Self {
        TagConfig {
            period: DEFAULT_PERIOD,
            pattern: DEFAULT_TAG_PATTERN.to_vec(),
            verify_pattern: false,
        }
    }

    /// 照合モードを設定して返す
    ///
    /// 有効にすると、読み飛ばすタグバイトが設定パターンと一致するかを
    /// チャンク境界をまたぐタグも含めて検査する。
    pub fn with_verify_pattern(mut self, enabled: bool) -> Self {
        self.verify_pattern = enabled;
        self
    }

    /// 周期（バイト数）
    pub fn period(&self) -> usize {
        self.period
    }

    /// タグ長（バイト数）
    pub fn tag_len(&self) -> usize {
        self.pattern.len()
    }

    /// タグパターン
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// 照合モードが有効か
    pub fn verify_pattern(&self) -> bool {
        self.verify_pattern
    }
}
