//! 入力チャンクのカーソル
//!
//! トランスポートが届けた 1 チャンク分のバイト列を左から右へ一度だけ
//! 消費するための読み取りビュー。コピーを伴う読み出し（`copy_into`）と
//! 位置だけ進める読み飛ばし（`advance`）を区別する。
//!
//! トランスポートはチャンク長を別途宣言してくるため、宣言長が実際に
//! 読めるバイト数より大きい不整合がありうる。その場合 `copy_into` は
//! `StripError::SourceExhausted` を返す（`advance` は純粋な位置更新で
//! 失敗しない）。

use crate::error::StripError;

/// 1 チャンク分の入力ビュー
///
/// `data` が実際に読めるバイト列、`declared_len` がトランスポートの
/// 宣言するチャンク長。通常は両者が一致する。
#[derive(Debug)]
pub struct ChunkCursor<'a> {
    /// 実際に読めるバイト列
    data: &'a [u8],
    /// トランスポートが宣言したチャンク長
    declared_len: usize,
    /// 現在の読み取り位置
    pos: usize,
}

impl<'a> ChunkCursor<'a> {
    /// バイト列からカーソルを生成する（宣言長 = 実バイト数）
    pub fn new(data: &'a [u8]) -> Self {
        ChunkCursor {
            data,
            declared_len: data.len(),
            pos: 0,
        }
    }

    /// 宣言長を明示してカーソルを生成する
    ///
    /// 宣言長が `data.len()` を超えるカーソルはトランスポート不整合を
    /// 表し、超過領域への `copy_into` は `SourceExhausted` になる。
    pub fn with_declared_len(data: &'a [u8], declared_len: usize) -> Self {
        ChunkCursor {
            data,
            declared_len,
            pos: 0,
        }
    }

    /// 宣言されたチャンク長
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    /// 現在の読み取り位置
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// 宣言長ベースの未消費バイト数
    pub fn remaining(&self) -> usize {
        self.declared_len.saturating_sub(self.pos)
    }

    /// 位置だけを `n` バイト進める（コピーなしの読み飛ばし）
    ///
    /// 実際に読めるバイト数の検査は行わない。読めない領域へ進めた場合、
    /// 以後の `copy_into` / `peek` が失敗する。
    pub fn advance(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n);
    }

    /// 現在位置から `n` バイトを覗き見る（位置は進めない）
    ///
    /// 実バイト列に `n` バイト残っていなければ `None`。
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(n)?;
        self.data.get(self.pos..end)
    }

    /// 現在位置から `out.len()` バイトをコピーし、位置を進める
    ///
    /// # エラー
    /// - `StripError::SourceExhausted`: 実バイト列に要求分が残っていない
    pub fn copy_into(&mut self, out: &mut [u8]) -> Result<(), StripError> {
        let n = out.len();
        let end = self
            .pos
            .checked_add(n)
            .ok_or(StripError::SourceExhausted)?;
        let src = self
            .data
            .get(self.pos..end)
            .ok_or(StripError::SourceExhausted)?;
        out.copy_from_slice(src);
        self.pos = end;
        Ok(())
    }
}
