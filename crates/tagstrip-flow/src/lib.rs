//! # tagstrip-flow
//!
//! フローセレクタのマッチングと登録シム。
//!
//! タグ除去モジュールは特定のフロー（L4 プロトコル + 送信元/宛先の
//! アドレス・ポート + タスク名）にだけ適用される。このクレートは
//! そのマッチング条件と、外部フレームワークへ登録するノードの表現、
//! 登録の台帳を提供する。
//!
//! ## ライフタイム
//!
//! ```text
//! モジュールロード   → register(node)   （失敗はロード自体の失敗）
//! フロー照合         → selector.matches(descriptor)
//! モジュールアンロード → unregister(id)  （失敗してもアンロードは続行）
//! ```

#![no_std]
extern crate alloc;

pub mod registration;
pub mod selector;

pub use registration::{FlowRegistry, RegistrationError, RegistrationNode};
pub use selector::{FlowDescriptor, FlowSelector};

/// デフォルトのモジュール識別子
pub const DEFAULT_MODULE_ID: u32 = 78;

/// デフォルトの受信バッファサイズのヒント（バイト）
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65536 * 2;

/// デフォルトの送信バッファサイズのヒント（0 = フレームワーク既定値）
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 0;
