//! 設定管理
//!
//! TOML設定ファイルの読み込みとDomain型への変換。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{DomainError, DomainResult, InjectionMethod, InjectionPolicy};

/// 入力方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InputMethodKind {
    /// Telex方式（デフォルト）
    #[default]
    Telex,
    /// VNI方式
    Vni,
}

impl InputMethodKind {
    /// エンジンFFIに渡す1バイト値
    pub fn to_engine_value(self) -> u8 {
        match self {
            Self::Telex => 0,
            Self::Vni => 1,
        }
    }
}

/// 注入方式（設定ファイル用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMethodKind {
    /// バックスペース削除 + 高速タイミング
    Fast,
    /// バックスペース削除 + 低速タイミング
    Slow,
    /// Shift+Leftによる選択上書き
    Selection,
}

impl From<InjectionMethodKind> for InjectionMethod {
    fn from(kind: InjectionMethodKind) -> Self {
        match kind {
            InjectionMethodKind::Fast => InjectionMethod::Fast,
            InjectionMethodKind::Slow => InjectionMethod::Slow,
            InjectionMethodKind::Selection => InjectionMethod::Selection,
        }
    }
}

/// アプリケーション設定のルート構造
#[allow(dead_code)]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// 変換エンジン設定
    pub engine: EngineConfig,
    /// フォアグラウンド分類設定
    pub classifier: ClassifierConfig,
    /// テキスト注入設定
    ///
    /// [injection]セクションは省略可能（上書きなし）
    #[serde(default)]
    pub injection: InjectionConfig,
    /// ワーカースレッド設定
    pub worker: WorkerConfig,
    /// パイプライン設定
    pub pipeline: PipelineConfig,
}

/// 変換エンジン設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    /// エンジンDLLのファイル名またはパス
    ///
    /// デフォルト: "gonhanh_core.dll"（実行ファイルと同じディレクトリから解決）
    #[serde(default = "default_engine_library")]
    pub library: String,

    /// 入力方式
    ///
    /// 選択肢: "telex", "vni"
    #[serde(default)]
    pub method: InputMethodKind,

    /// 現代的な声調位置（hoà / hòa）
    #[serde(default = "default_true")]
    pub modern_tone: bool,

    /// 自由声調入力を許可
    #[serde(default)]
    pub free_tone: bool,

    /// Escキーで変換前の文字列に復元
    #[serde(default = "default_true")]
    pub esc_restore: bool,

    /// 英単語の自動復元
    #[serde(default = "default_true")]
    pub english_auto_restore: bool,

    /// 文頭の自動大文字化
    #[serde(default)]
    pub auto_capitalize: bool,

    /// 角括弧ショートカット（[ ] → ư ơ）
    #[serde(default)]
    pub bracket_shortcut: bool,

    /// wショートカットのスキップ
    #[serde(default)]
    pub skip_w_shortcut: bool,

    /// テキストショートカット（略語展開）
    #[serde(default)]
    pub shortcuts: Vec<ShortcutConfig>,
}

fn default_engine_library() -> String {
    "gonhanh_core.dll".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library: default_engine_library(),
            method: InputMethodKind::Telex,
            modern_tone: true,
            free_tone: false,
            esc_restore: true,
            english_auto_restore: true,
            auto_capitalize: false,
            bracket_shortcut: false,
            skip_w_shortcut: false,
            shortcuts: Vec::new(),
        }
    }
}

/// テキストショートカット（略語 → 展開文字列）
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShortcutConfig {
    /// トリガー文字列（例: "vn"）
    pub trigger: String,
    /// 展開文字列（例: "Việt Nam"）
    pub replacement: String,
}

/// フォアグラウンド分類設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassifierConfig {
    /// 分類キャッシュのTTL（ミリ秒）
    ///
    /// この時間内の同一プロセスへの連続キーストロークは
    /// 再分類なしでキャッシュ済みポリシーを使う。
    /// デフォルト: 200ms
    pub ttl_ms: u64,
}

impl ClassifierConfig {
    /// デフォルトのキャッシュTTL（ミリ秒）
    pub const DEFAULT_TTL_MS: u64 = 200;

    /// TTLをDurationとして取得
    #[allow(dead_code)]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ttl_ms: Self::DEFAULT_TTL_MS,
        }
    }
}

/// テキスト注入設定
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InjectionConfig {
    /// プロセス名ごとのポリシー上書き
    ///
    /// 静的分類テーブルより優先される。Selection方式は
    /// ここからのみ有効化できる（自動検出は行わない）。
    #[serde(default)]
    pub overrides: Vec<InjectionOverride>,
}

/// プロセス名単位の注入ポリシー上書き
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InjectionOverride {
    /// 対象プロセスの実行ファイル名（例: "chrome.exe"、大文字小文字は無視）
    pub process: String,

    /// 注入方式
    pub method: InjectionMethodKind,

    /// バックスペース1打ごとの遅延（マイクロ秒）
    pub backspace_delay_us: u64,

    /// 削除からテキスト挿入までの待機（マイクロ秒）
    pub wait_delay_us: u64,

    /// 挿入文字間の遅延（マイクロ秒）
    pub char_delay_us: u64,
}

impl InjectionOverride {
    /// InjectionPolicyへ変換
    pub fn to_policy(&self) -> InjectionPolicy {
        InjectionPolicy::new(
            self.method.into(),
            self.backspace_delay_us,
            self.wait_delay_us,
            self.char_delay_us,
        )
    }
}

/// ワーカースレッド設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerConfig {
    /// キューが空のときのスリープ時間（ミリ秒）
    ///
    /// アイドル時のCPU使用を抑えつつ、次のキーストロークへの
    /// 応答遅延の上限を決める。デフォルト: 1ms
    pub idle_sleep_ms: u64,

    /// ワーカースレッドをTIME_CRITICAL優先度に昇格するか
    pub time_critical: bool,
}

impl WorkerConfig {
    /// デフォルトのアイドルスリープ（ミリ秒）
    pub const DEFAULT_IDLE_SLEEP_MS: u64 = 1;

    /// アイドルスリープをDurationとして取得
    #[allow(dead_code)]
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_sleep_ms: Self::DEFAULT_IDLE_SLEEP_MS,
            time_critical: true,
        }
    }
}

/// パイプライン設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    /// 統計情報の出力間隔（秒）
    pub stats_interval_sec: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stats_interval_sec: 10,
        }
    }
}

impl PipelineConfig {
    /// 統計出力間隔をDurationとして取得
    #[allow(dead_code)]
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_sec)
    }
}

/// 遅延設定の上限（1秒 = 1_000_000マイクロ秒）
///
/// これを超える遅延は入力体験を壊すため設定ミスとして弾く。
const MAX_DELAY_US: u64 = 1_000_000;

impl AppConfig {
    /// TOMLファイルから設定を読み込む
    #[allow(dead_code)]
    pub fn from_file<P: AsRef<Path>>(path: P) -> DomainResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| DomainError::Configuration(format!("Failed to parse config file: {}", e)))
    }

    /// デフォルト設定をTOMLファイルに書き出す
    #[allow(dead_code)]
    pub fn write_default<P: AsRef<Path>>(path: P) -> DomainResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config).map_err(|e| {
            DomainError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)
            .map_err(|e| DomainError::Configuration(format!("Failed to write config file: {}", e)))
    }

    /// 設定の妥当性を検証
    #[allow(dead_code)]
    pub fn validate(&self) -> DomainResult<()> {
        // エンジンDLL名の検証
        if self.engine.library.is_empty() {
            return Err(DomainError::Configuration(
                "Engine library path must not be empty".to_string(),
            ));
        }

        // ショートカットの検証
        for shortcut in &self.engine.shortcuts {
            if shortcut.trigger.is_empty() || shortcut.replacement.is_empty() {
                return Err(DomainError::Configuration(
                    "Shortcut trigger and replacement must not be empty".to_string(),
                ));
            }
        }

        // TTLの検証
        if self.classifier.ttl_ms == 0 {
            return Err(DomainError::Configuration(
                "Classifier TTL must be greater than 0".to_string(),
            ));
        }

        // 注入上書きの検証
        for ov in &self.injection.overrides {
            if ov.process.is_empty() {
                return Err(DomainError::Configuration(
                    "Injection override process name must not be empty".to_string(),
                ));
            }
            if ov.backspace_delay_us > MAX_DELAY_US
                || ov.wait_delay_us > MAX_DELAY_US
                || ov.char_delay_us > MAX_DELAY_US
            {
                return Err(DomainError::Configuration(format!(
                    "Injection delays for '{}' exceed 1 second",
                    ov.process
                )));
            }
        }

        // ワーカースリープの検証
        if self.worker.idle_sleep_ms == 0 {
            return Err(DomainError::Configuration(
                "Worker idle sleep must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
