//! モジュール登録の台帳
//!
//! 外部フレームワーク側の登録操作を表す。登録はモジュールロード時に
//! 一度だけ行い、失敗したらロード自体を失敗させる。解除はアンロード
//! 時に一度だけ行い、失敗してもアンロードは続行する。

use alloc::collections::BTreeMap;

use crate::selector::{FlowDescriptor, FlowSelector};
use crate::{DEFAULT_MODULE_ID, DEFAULT_RECV_BUFFER_SIZE, DEFAULT_SEND_BUFFER_SIZE};

/// 同時に登録できるモジュール数の上限
pub const MAX_REGISTRATIONS: usize = 32;

/// 登録操作のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// 同じモジュール ID が登録済み
    DuplicateModuleId(u32),
    /// 同一のセレクタが別モジュールで登録済み
    DuplicateSelector(u32),
    /// 登録数が上限に達している
    Exhausted,
    /// 指定されたモジュール ID が未登録
    NotRegistered(u32),
}

impl core::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RegistrationError::DuplicateModuleId(id) => {
                write!(f, "Module id {} is already registered", id)
            }
            RegistrationError::DuplicateSelector(id) => {
                write!(f, "Flow selector already registered by module id {}", id)
            }
            RegistrationError::Exhausted => write!(f, "Registration table is full"),
            RegistrationError::NotRegistered(id) => {
                write!(f, "Module id {} is not registered", id)
            }
        }
    }
}

/// フレームワークへ渡す登録ノード
///
/// セレクタとバッファサイズのヒント、モジュール ID をまとめる。
/// フック関数そのものはホスト側のバインディングが持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationNode {
    /// モジュール識別子
    pub module_id: u32,
    /// 適用するフローの条件
    pub selector: FlowSelector,
    /// 受信バッファサイズのヒント（バイト）
    pub recv_buffer_size: usize,
    /// 送信バッファサイズのヒント（0 = フレームワーク既定値）
    pub send_buffer_size: usize,
}

impl RegistrationNode {
    /// セレクタとデフォルトのヒントからノードを作る
    pub fn new(selector: FlowSelector) -> Self {
        RegistrationNode {
            module_id: DEFAULT_MODULE_ID,
            selector,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
        }
    }
}

/// 登録済みモジュールの台帳
///
/// モジュール ID からノードを引く。フロー到着時には登録順で最初に
/// マッチしたノードが選ばれる。
pub struct FlowRegistry {
    /// module_id → ノード
    nodes: BTreeMap<u32, RegistrationNode>,
}

impl FlowRegistry {
    /// 空の台帳を生成する
    pub fn new() -> Self {
        FlowRegistry {
            nodes: BTreeMap::new(),
        }
    }

    /// ノードを登録する
    ///
    /// # エラー
    /// - `RegistrationError::DuplicateModuleId`: 同じ ID が登録済み
    /// - `RegistrationError::DuplicateSelector`: 同一セレクタが登録済み
    /// - `RegistrationError::Exhausted`: 台帳が満杯
    pub fn register(&mut self, node: RegistrationNode) -> Result<(), RegistrationError> {
        if self.nodes.contains_key(&node.module_id) {
            return Err(RegistrationError::DuplicateModuleId(node.module_id));
        }
        if let Some(existing) = self
            .nodes
            .values()
            .find(|n| n.selector == node.selector)
        {
            return Err(RegistrationError::DuplicateSelector(existing.module_id));
        }
        if self.nodes.len() >= MAX_REGISTRATIONS {
            return Err(RegistrationError::Exhausted);
        }
        self.nodes.insert(node.module_id, node);
        Ok(())
    }

    /// ノードの登録を解除し、登録されていたノードを返す
    ///
    /// # エラー
    /// - `RegistrationError::NotRegistered`: 指定 ID が未登録
    pub fn unregister(&mut self, module_id: u32) -> Result<RegistrationNode, RegistrationError> {
        self.nodes
            .remove(&module_id)
            .ok_or(RegistrationError::NotRegistered(module_id))
    }

    /// フローにマッチする最初のノードを返す
    pub fn lookup(&self, flow: &FlowDescriptor) -> Option<&RegistrationNode> {
        self.nodes.values().find(|n| n.selector.matches(flow))
    }

    /// 指定 ID が登録済みか
    pub fn contains(&self, module_id: u32) -> bool {
        self.nodes.contains_key(&module_id)
    }

    /// 登録済みノード数
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 台帳が空か
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
