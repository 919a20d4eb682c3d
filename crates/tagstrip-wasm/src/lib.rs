//! # tagstrip-wasm
//!
//! wasm-bindgen エクスポート：ホストの transport interposition
//! フレームワーク（Node.js）から呼び出す公開 API。
//!
//! フレームワークはソケットごとにフローを照合し、マッチしたフローの
//! 受信チャンクを `onReceive` に通してからアプリケーションへ渡す。
//!
//! ## 使用方法（TypeScript）
//!
//! ```typescript
//! import { TagStripModule, FlowRegistry, init_panic_hook } from '../tagstrip-wasm-pkg/tagstrip_wasm';
//!
//! // パニック時のスタックトレースを有効化（開発時）
//! init_panic_hook();
//!
//! // モジュール初期化と登録（登録失敗はロード失敗）
//! const module = new TagStripModule(JSON.stringify({
//!     destination_ip: "10.0.0.20",
//!     destination_port: 8080,
//!     period: 100,
//! }));
//! const registry = new FlowRegistry();
//! registry.register(module);
//!
//! // 受信パスに割り込む
//! socket.on('data', (buf) => {
//!     const sanitized = module.onReceive(buf);
//!     if (sanitized.length > 0) {
//!         app.deliver(Buffer.from(sanitized));
//!     }
//! });
//!
//! // 定期レポート
//! console.log(module.getStats());
//!
//! // アンロード時（解除失敗でもアンロードは続行）
//! registry.unregister(module.moduleId());
//! ```

use wasm_bindgen::prelude::*;

pub mod module;

pub use module::{FlowRegistry, TagStripModule};

/// パニック時にコンソールにスタックトレースを出力する
///
/// 開発時に必ず呼び出すこと。本番ビルドでは feature flag で無効化可能。
#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
