//! フローセレクタとマッチング
//!
//! モジュールを適用するフローを選ぶ条件。各フィールドはゼロ値
//! （アドレス 0.0.0.0、ポート 0、空文字列）でワイルドカードになる。

use alloc::string::String;
use core::net::Ipv4Addr;

/// L4 プロトコル番号: TCP
pub const PROTO_TCP: u16 = 6;

/// L4 プロトコル番号: UDP
pub const PROTO_UDP: u16 = 17;

/// フローの選択条件
///
/// すべての条件を満たしたフローだけがモジュールに admit される。
/// ゼロ値のフィールドは「任意」を意味する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSelector {
    /// L4 プロトコル番号（0 = 任意、6 = TCP、17 = UDP）
    pub protocol: u16,
    /// 送信元 IP アドレス（0.0.0.0 = 任意）
    pub source_ip: Ipv4Addr,
    /// 宛先 IP アドレス（0.0.0.0 = 任意）
    pub dest_ip: Ipv4Addr,
    /// 送信元ポート（0 = 任意）
    pub source_port: u16,
    /// 宛先ポート（0 = 任意）
    pub dest_port: u16,
    /// スレッド名（空 = 任意）
    pub thread_name: String,
    /// プロセス（アプリケーション）名（空 = 任意）
    pub process_name: String,
}

impl FlowSelector {
    /// すべてワイルドカードのセレクタ
    pub fn any() -> Self {
        FlowSelector {
            protocol: 0,
            source_ip: Ipv4Addr::UNSPECIFIED,
            dest_ip: Ipv4Addr::UNSPECIFIED,
            source_port: 0,
            dest_port: 0,
            thread_name: String::new(),
            process_name: String::new(),
        }
    }

    /// フローが条件を満たすか判定する
    pub fn matches(&self, flow: &FlowDescriptor) -> bool {
        if self.protocol != 0 && self.protocol != flow.protocol {
            return false;
        }
        if !self.source_ip.is_unspecified() && self.source_ip != flow.source_ip {
            return false;
        }
        if !self.dest_ip.is_unspecified() && self.dest_ip != flow.dest_ip {
            return false;
        }
        if self.source_port != 0 && self.source_port != flow.source_port {
            return false;
        }
        if self.dest_port != 0 && self.dest_port != flow.dest_port {
            return false;
        }
        if !self.thread_name.is_empty() && self.thread_name != flow.thread_name {
            return false;
        }
        if !self.process_name.is_empty() && self.process_name != flow.process_name {
            return false;
        }
        true
    }
}

impl Default for FlowSelector {
    fn default() -> Self {
        Self::any()
    }
}

/// 照合対象となる具体的なフロー
///
/// 外部フレームワークがソケットごとに構築して渡してくる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDescriptor {
    /// L4 プロトコル番号
    pub protocol: u16,
    /// 送信元 IP アドレス
    pub source_ip: Ipv4Addr,
    /// 宛先 IP アドレス
    pub dest_ip: Ipv4Addr,
    /// 送信元ポート
    pub source_port: u16,
    /// 宛先ポート
    pub dest_port: u16,
    /// ソケットを開いたスレッドの名前
    pub thread_name: String,
    /// ソケットを開いたプロセスの名前
    pub process_name: String,
}
