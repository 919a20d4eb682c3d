//! TagStripModule wasm-bindgen エクスポート
//!
//! ホストの interposition フレームワーク（Node.js）から呼び出す
//! モジュール本体。フローの照合・受信フック・送信フック・統計レポートを
//! 統合する。

use core::net::Ipv4Addr;
use std::sync::Arc;

use js_sys::Uint8Array;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use tagstrip_core::{
    ChunkCursor, ChunkProcessor, StreamSession, StripStats, TagConfig, DEFAULT_PERIOD,
    DEFAULT_TAG_PATTERN,
};
use tagstrip_flow::{
    FlowDescriptor, FlowSelector, RegistrationNode, DEFAULT_MODULE_ID,
    DEFAULT_RECV_BUFFER_SIZE, DEFAULT_SEND_BUFFER_SIZE,
};

/// ホスト設定（JSON で受け取る）
///
/// 省略したフィールドはモジュールの既定値になる。
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ModuleConfig {
    /// マッチする宛先 IP
    destination_ip: String,
    /// マッチする送信元 IP（"0.0.0.0" = 任意）
    source_ip: String,
    /// マッチする宛先ポート
    destination_port: u16,
    /// マッチする送信元ポート（0 = 任意）
    source_port: u16,
    /// L4 プロトコル番号
    protocol: u16,
    /// マッチするスレッド名（空 = 任意）
    thread_name: String,
    /// マッチするプロセス名（空 = 任意）
    process_name: String,
    /// モジュール識別子
    module_id: u32,
    /// タグ間のデータバイト数
    period: usize,
    /// タグのバイトパターン（Base64）。省略時は既定パターン
    tag_pattern_base64: Option<String>,
    /// 読み飛ばすタグバイトをパターンと照合するか
    verify_pattern: bool,
    /// 受信バッファサイズのヒント
    recv_buffer_size: usize,
    /// 送信バッファサイズのヒント（0 = フレームワーク既定値）
    send_buffer_size: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        ModuleConfig {
            destination_ip: "10.0.0.20".into(),
            source_ip: "0.0.0.0".into(),
            destination_port: 8080,
            source_port: 0,
            protocol: tagstrip_flow::selector::PROTO_TCP,
            thread_name: "curl".into(),
            process_name: "curl".into(),
            module_id: DEFAULT_MODULE_ID,
            period: DEFAULT_PERIOD,
            tag_pattern_base64: None,
            verify_pattern: false,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
        }
    }
}

/// フロー記述子（JSON で受け取る）
#[derive(Debug, Deserialize)]
struct FlowDescriptorJson {
    protocol: u16,
    source_ip: String,
    dest_ip: String,
    source_port: u16,
    dest_port: u16,
    #[serde(default)]
    thread_name: String,
    #[serde(default)]
    process_name: String,
}

/// 統計レポート（JSON で返す）
#[derive(Debug, Serialize)]
struct StatsReport {
    module_id: u32,
    chunks_processed: u64,
    bytes_received: u64,
    bytes_delivered: u64,
    tags_stripped: u64,
    copy_failures: u64,
    tag_mismatches: u64,
    tag_only_chunks: u64,
}

fn parse_ip(s: &str, field: &str) -> Result<Ipv4Addr, JsError> {
    s.parse::<Ipv4Addr>()
        .map_err(|_| JsError::new(&format!("Invalid IPv4 address in {}: {}", field, s)))
}

/// タグ除去モジュール
///
/// 1 インスタンス = 1 フロー条件への適用。ホストのフレームワークが
/// フローを照合して admit し、受信チャンクごとに `onReceive` を呼ぶ。
///
/// ## 内部アーキテクチャ
///
/// ```text
/// TagStripModule
///   ├── RegistrationNode (tagstrip-flow) - フロー条件とバッファヒント
///   ├── ChunkProcessor   (tagstrip-core) - タグ除去の状態機械
///   ├── StreamSession    (tagstrip-core) - チャンク間の持ち越し状態
///   └── StripStats       (tagstrip-core) - プロセス全体の統計ハンドル
/// ```
///
/// ## スレッド安全性
///
/// WASM はシングルスレッドで、同一フローの受信処理は逐次に呼ばれる
/// 前提。セッションにロックは不要。
#[wasm_bindgen]
pub struct TagStripModule {
    /// フレームワークへ渡す登録ノード
    node: RegistrationNode,
    /// タグ除去プロセッサ
    processor: ChunkProcessor,
    /// このフローの持ち越し状態
    session: StreamSession,
    /// 統計ハンドル（プロセッサと共有）
    stats: Arc<StripStats>,
}

#[wasm_bindgen]
impl TagStripModule {
    /// モジュールを初期化する
    ///
    /// # 引数
    /// - `config_json`: 設定の JSON 文字列。省略時はすべて既定値。
    ///
    /// # 例（TypeScript）
    /// ```typescript
    /// const module = new TagStripModule(JSON.stringify({
    ///     destination_ip: "10.0.0.20",
    ///     destination_port: 8080,
    ///     period: 100,
    /// }));
    /// ```
    ///
    /// # エラー
    /// - JSON の構文エラー
    /// - IP アドレスの形式エラー
    /// - 周期 0・空パターンなどの設定エラー
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<TagStripModule, JsError> {
        let config: ModuleConfig = match config_json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| JsError::new(&format!("Invalid module config: {}", e)))?,
            None => ModuleConfig::default(),
        };

        let selector = FlowSelector {
            protocol: config.protocol,
            source_ip: parse_ip(&config.source_ip, "source_ip")?,
            dest_ip: parse_ip(&config.destination_ip, "destination_ip")?,
            source_port: config.source_port,
            dest_port: config.destination_port,
            thread_name: config.thread_name,
            process_name: config.process_name,
        };

        let tag_config = match &config.tag_pattern_base64 {
            Some(b64) => TagConfig::from_base64_pattern(config.period, b64),
            None => TagConfig::new(config.period, DEFAULT_TAG_PATTERN.to_vec()),
        }
        .map_err(|e| JsError::new(&format!("Invalid tag config: {}", e)))?
        .with_verify_pattern(config.verify_pattern);

        let stats = Arc::new(StripStats::new());

        let mut node = RegistrationNode::new(selector);
        node.module_id = config.module_id;
        node.recv_buffer_size = config.recv_buffer_size;
        node.send_buffer_size = config.send_buffer_size;

        Ok(TagStripModule {
            node,
            processor: ChunkProcessor::new(tag_config, Arc::clone(&stats)),
            session: StreamSession::new(),
            stats,
        })
    }

    /// フローがこのモジュールの条件を満たすか判定する
    ///
    /// # 引数
    /// - `descriptor_json`: フロー記述子の JSON 文字列
    ///   （protocol / source_ip / dest_ip / source_port / dest_port /
    ///   thread_name / process_name）
    #[wasm_bindgen(js_name = "matchesFlow")]
    pub fn matches_flow(&self, descriptor_json: &str) -> Result<bool, JsError> {
        let flow = parse_descriptor(descriptor_json)?;
        Ok(self.node.selector.matches(&flow))
    }

    /// 受信フック: 1 チャンクを処理し、タグを除いたバイト列を返す
    ///
    /// フレームワークは L4 から受け取ったチャンクをアプリケーションへ
    /// 渡す前にここへ通す。戻り値がアプリケーションに渡される。
    ///
    /// 処理に失敗した場合（照合モードでのタグ不一致など）は出力を抑止
    /// して長さ 0 を返し、持ち越し状態は呼び出し前のまま保つ。失敗は
    /// 統計カウンタにのみ現れる。
    ///
    /// # 引数
    /// - `chunk`: このフローに届いた受信チャンク
    #[wasm_bindgen(js_name = "onReceive")]
    pub fn on_receive(&mut self, chunk: &[u8]) -> Uint8Array {
        let mut out = vec![0u8; chunk.len()];
        let mut cursor = ChunkCursor::new(chunk);

        let written = self
            .processor
            .process(&mut cursor, &mut self.session, &mut out)
            .unwrap_or(0);

        let arr = Uint8Array::new_with_length(written as u32);
        arr.copy_from(&out[..written]);
        arr
    }

    /// 送信フック: 意図的な no-op スタブ
    ///
    /// 送信方向の変換は行わない。常に長さ 0 を返し、フレームワークに
    /// 元のデータをそのまま送らせる。
    #[wasm_bindgen(js_name = "onSend")]
    pub fn on_send(&mut self, _data: &[u8]) -> Uint8Array {
        Uint8Array::new_with_length(0)
    }

    /// 統計レポートを JSON 文字列で返す
    ///
    /// # 戻り値
    /// ```json
    /// {
    ///   "module_id": 78,
    ///   "chunks_processed": 42,
    ///   "bytes_received": 135168,
    ///   "bytes_delivered": 102400,
    ///   "tags_stripped": 1024,
    ///   "copy_failures": 0,
    ///   "tag_mismatches": 0,
    ///   "tag_only_chunks": 1
    /// }
    /// ```
    #[wasm_bindgen(js_name = "getStats")]
    pub fn get_stats(&self) -> Result<String, JsError> {
        let snap = self.stats.snapshot();
        let report = StatsReport {
            module_id: self.node.module_id,
            chunks_processed: self.session.chunks_processed(),
            bytes_received: snap.bytes_received,
            bytes_delivered: snap.bytes_delivered,
            tags_stripped: snap.tags_stripped,
            copy_failures: snap.copy_failures,
            tag_mismatches: snap.tag_mismatches,
            tag_only_chunks: snap.tag_only_chunks,
        };
        serde_json::to_string(&report)
            .map_err(|e| JsError::new(&format!("Stats serialization failed: {}", e)))
    }

    /// 統計カウンタをゼロに戻す（ロード時に呼ぶ）
    #[wasm_bindgen(js_name = "resetStats")]
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// モジュール識別子
    #[wasm_bindgen(js_name = "moduleId")]
    pub fn module_id(&self) -> u32 {
        self.node.module_id
    }

    /// 受信バッファサイズのヒント
    #[wasm_bindgen(js_name = "recvBufferSize")]
    pub fn recv_buffer_size(&self) -> usize {
        self.node.recv_buffer_size
    }

    /// 送信バッファサイズのヒント
    #[wasm_bindgen(js_name = "sendBufferSize")]
    pub fn send_buffer_size(&self) -> usize {
        self.node.send_buffer_size
    }
}

impl TagStripModule {
    /// 登録ノードへの参照（レジストリ用）
    fn node(&self) -> &RegistrationNode {
        &self.node
    }
}

fn parse_descriptor(descriptor_json: &str) -> Result<FlowDescriptor, JsError> {
    let d: FlowDescriptorJson = serde_json::from_str(descriptor_json)
        .map_err(|e| JsError::new(&format!("Invalid flow descriptor: {}", e)))?;
    Ok(FlowDescriptor {
        protocol: d.protocol,
        source_ip: parse_ip(&d.source_ip, "source_ip")?,
        dest_ip: parse_ip(&d.dest_ip, "dest_ip")?,
        source_port: d.source_port,
        dest_port: d.dest_port,
        thread_name: d.thread_name,
        process_name: d.process_name,
    })
}

/// モジュール登録の台帳（フレームワーク側シム）
///
/// ロード時に `register` し、失敗したらロード自体を失敗させる。
/// アンロード時に `unregister` し、失敗してもアンロードは続行する
/// （そのため `unregister` は例外を投げず bool を返す）。
#[wasm_bindgen]
pub struct FlowRegistry {
    inner: tagstrip_flow::FlowRegistry,
}

#[wasm_bindgen]
impl FlowRegistry {
    /// 空の台帳を生成する
    #[wasm_bindgen(constructor)]
    pub fn new() -> FlowRegistry {
        FlowRegistry {
            inner: tagstrip_flow::FlowRegistry::new(),
        }
    }

    /// モジュールを登録する
    ///
    /// # エラー
    /// - ID またはセレクタの重複、台帳の満杯。ロード失敗として扱うこと。
    pub fn register(&mut self, module: &TagStripModule) -> Result<(), JsError> {
        self.inner
            .register(module.node().clone())
            .map_err(|e| JsError::new(&format!("Registration failed: {}", e)))
    }

    /// モジュールの登録を解除する
    ///
    /// # 戻り値
    /// 解除できたら `true`。未登録なら `false`（アンロードは続行してよい）。
    pub fn unregister(&mut self, module_id: u32) -> bool {
        self.inner.unregister(module_id).is_ok()
    }

    /// フローにマッチするモジュール ID を返す
    ///
    /// # 引数
    /// - `descriptor_json`: フロー記述子の JSON 文字列
    #[wasm_bindgen(js_name = "lookupModuleId")]
    pub fn lookup_module_id(&self, descriptor_json: &str) -> Result<Option<u32>, JsError> {
        let flow = parse_descriptor(descriptor_json)?;
        Ok(self.inner.lookup(&flow).map(|n| n.module_id))
    }

    /// 登録済みモジュール数
    #[wasm_bindgen(js_name = "registeredCount")]
    pub fn registered_count(&self) -> usize {
        self.inner.len()
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
