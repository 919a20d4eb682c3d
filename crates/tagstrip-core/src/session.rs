//! フローごとのセッション状態
//!
//! チャンク境界をまたぐタグ・周期の持ち越し状態と、フロー単位の
//! 統計カウンタを保持する。フローがフックに admit されたときに
//! 生成され、フローの終了とともに破棄される。
//!
//! 同一フローのチャンク処理は厳密に逐次なので、セッションへの
//! アクセスにロックは不要。

/// チャンク間の持ち越し状態
///
/// セッションは「タグの途中」か「周期の途中」のどちらか一方にしか
/// なれない。この相互排他を 2 本のカウンタの約束事ではなく型で表す。
///
/// ```text
/// Idle              : 周期の先頭（持ち越しなし）
/// MidTag { skipped }: タグの途中。skipped バイトを除去済みで、
///                     残り TAG_LEN - skipped バイトを次チャンクの
///                     先頭から読み飛ばす。0 <= skipped < TAG_LEN
/// MidPeriod{copied} : 周期の途中。copied バイトを出力済みで、
///                     残り PERIOD - copied バイトのデータが続く。
///                     0 < copied < PERIOD
/// ```
///
/// 周期がチャンク末尾でちょうど完結した場合は `MidTag { skipped: 0 }`
/// に正規化する（次チャンクはタグの先頭から始まる）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarryOver {
    /// 周期の先頭にいる（持ち越しなし）
    Idle,
    /// タグの途中（`skipped` バイト除去済み）
    MidTag {
        /// 既に読み飛ばしたタグのバイト数
        skipped: usize,
    },
    /// 周期の途中（`copied` バイト出力済み）
    MidPeriod {
        /// 既に出力した周期内のバイト数
        copied: usize,
    },
}

/// 1 フロー分のストリームセッション
///
/// 持ち越し状態に加えて、フロー単位の単調増加カウンタを持つ。
/// プロセス全体の統計は [`crate::stats::StripStats`] が別に担う。
#[derive(Debug)]
pub struct StreamSession {
    /// チャンク間の持ち越し状態
    carry: CarryOver,
    /// 処理したチャンク数
    chunks_processed: u64,
    /// トランスポートから受け取った総バイト数（宣言長ベース）
    bytes_received: u64,
    /// アプリケーションへ渡した総バイト数
    bytes_delivered: u64,
    /// 完全に除去したタグの数
    tags_stripped: u64,
}

impl StreamSession {
    /// ゼロ状態の新しいセッションを生成する
    pub fn new() -> Self {
        StreamSession {
            carry: CarryOver::Idle,
            chunks_processed: 0,
            bytes_received: 0,
            bytes_delivered: 0,
            tags_stripped: 0,
        }
    }

    /// 現在の持ち越し状態
    pub fn carry(&self) -> CarryOver {
        self.carry
    }

    /// タグの途中か
    pub fn is_mid_tag(&self) -> bool {
        matches!(self.carry, CarryOver::MidTag { .. })
    }

    /// 周期の途中か
    pub fn is_mid_period(&self) -> bool {
        matches!(self.carry, CarryOver::MidPeriod { .. })
    }

    /// 持ち越し状態を更新する（プロセッサ専用）
    pub(crate) fn set_carry(&mut self, carry: CarryOver) {
        self.carry = carry;
    }

    /// チャンク到着を記録する（宣言長ベース）
    pub(crate) fn note_chunk(&mut self, declared_len: usize) {
        self.chunks_processed += 1;
        self.bytes_received += declared_len as u64;
    }

    /// 出力とタグ除去を記録する
    pub(crate) fn note_delivered(&mut self, written: usize, tags: u64) {
        self.bytes_delivered += written as u64;
        self.tags_stripped += tags;
    }

    /// 処理したチャンク数
    pub fn chunks_processed(&self) -> u64 {
        self.chunks_processed
    }

    /// 受け取った総バイト数
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// アプリケーションへ渡した総バイト数
    pub fn bytes_delivered(&self) -> u64 {
        self.bytes_delivered
    }

    /// 完全に除去したタグ数
    pub fn tags_stripped(&self) -> u64 {
        self.tags_stripped
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = StreamSession::new();
        assert_eq!(session.carry(), CarryOver::Idle);
        assert!(!session.is_mid_tag());
        assert!(!session.is_mid_period());
        assert_eq!(session.chunks_processed(), 0);
        assert_eq!(session.bytes_received(), 0);
        assert_eq!(session.bytes_delivered(), 0);
        assert_eq!(session.tags_stripped(), 0);
    }

    #[test]
    fn test_carry_transitions() {
        let mut session = StreamSession::new();

        session.set_carry(CarryOver::MidTag { skipped: 3 });
        assert!(session.is_mid_tag());
        assert!(!session.is_mid_period());

        session.set_carry(CarryOver::MidPeriod { copied: 10 });
        assert!(session.is_mid_period());
        assert!(!session.is_mid_tag());

        session.set_carry(CarryOver::Idle);
        assert_eq!(session.carry(), CarryOver::Idle);
    }

    #[test]
    fn test_counters_accumulate() {
        let mut session = StreamSession::new();
        session.note_chunk(100);
        session.note_delivered(68, 1);
        session.note_chunk(50);
        session.note_delivered(50, 0);

        assert_eq!(session.chunks_processed(), 2);
        assert_eq!(session.bytes_received(), 150);
        assert_eq!(session.bytes_delivered(), 118);
        assert_eq!(session.tags_stripped(), 1);
    }
}
