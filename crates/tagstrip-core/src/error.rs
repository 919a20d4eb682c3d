//! tagstrip-core エラー型

/// タグ除去処理のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripError {
    /// 宣言されたチャンク長に対して実際に読めるバイトが足りない
    /// （トランスポート層の不整合。アプリケーションのエラーではない）
    SourceExhausted,
    /// 出力バッファの容量を超えて書き込もうとした
    OutputTooSmall,
    /// 照合モードで、読み飛ばすタグバイトがパターンと一致しなかった
    TagMismatch,
    /// 周期が 0（設定エラー）
    InvalidPeriod,
    /// タグパターンが空（設定エラー）
    EmptyTagPattern,
    /// タグパターンの Base64 デコードに失敗
    InvalidBase64,
}

impl core::fmt::Display for StripError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StripError::SourceExhausted => {
                write!(f, "Declared chunk length exceeds readable bytes")
            }
            StripError::OutputTooSmall => write!(f, "Output buffer capacity exceeded"),
            StripError::TagMismatch => write!(f, "Tag bytes do not match configured pattern"),
            StripError::InvalidPeriod => write!(f, "Period must be at least 1 byte"),
            StripError::EmptyTagPattern => write!(f, "Tag pattern must not be empty"),
            StripError::InvalidBase64 => write!(f, "Invalid Base64 encoding in tag pattern"),
        }
    }
}
