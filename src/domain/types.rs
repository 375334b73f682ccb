/// コア型定義
///
/// Domain層の中心となるデータ構造。
/// フック・ワーカー・注入器のすべてで共有される不変の型。

use std::time::Instant;

/// 自プロセスが合成したキーイベントに付与するマーカー
///
/// SendInputのdwExtraInfoに設定され、フック側で自己生成イベントを
/// 識別するために使用される（フィードバックループ防止）。
/// OSはこの値を解釈しない。
pub const INJECTED_KEY_MARKER: usize = 0x474E_4820;

/// フックが捕捉した物理キーイベント
///
/// フックコールバックで1回だけ生成され、ワーカースレッドで
/// ちょうど1回消費される。生成後は不変。
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    /// Windows仮想キーコード
    pub vk_code: u16,
    /// キー押下ならtrue、解放ならfalse
    pub key_down: bool,
    /// CapsLockのトグル状態
    pub caps: bool,
    /// Ctrl修飾キーの押下状態
    pub ctrl: bool,
    /// Shift修飾キーの押下状態
    pub shift: bool,
    /// 捕捉時刻（レイテンシ計測用）
    pub timestamp: Instant,
}

impl KeyEvent {
    /// 新しいKeyEventを作成（捕捉時刻は現在時刻）
    pub fn new(vk_code: u16, key_down: bool, caps: bool, ctrl: bool, shift: bool) -> Self {
        Self {
            vk_code,
            key_down,
            caps,
            ctrl,
            shift,
            timestamp: Instant::now(),
        }
    }
}

/// エンジンが要求するアクション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAction {
    /// 編集なし（元のキーストロークをそのまま通す）
    None,
    /// 変換結果の送出（バックスペース + Unicode挿入）
    Send,
    /// 直前の単語の復元（送出と同じ注入経路を使う）
    Restore,
}

impl EngineAction {
    /// FFIのaction値（1バイト）から変換
    ///
    /// 未知の値はNoneとして扱う（編集を発生させない方が安全）。
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Send,
            2 => Self::Restore,
            _ => Self::None,
        }
    }
}

/// エンジン結果の所有コピー
///
/// FFIの生ポインタから必要な値をコピーした後、元の結果は
/// エンジンクライアント内で即座に解放される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEdit {
    /// 要求されたアクション
    pub action: EngineAction,
    /// 削除する文字数（0-255）
    pub backspace: u8,
    /// 挿入するUnicodeコードポイント列
    pub chars: Vec<u32>,
}

impl EngineEdit {
    /// テキスト注入が必要か（SendまたはRestore）
    #[inline]
    pub fn requires_injection(&self) -> bool {
        self.action != EngineAction::None && (self.backspace > 0 || !self.chars.is_empty())
    }
}

/// テキスト注入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionMethod {
    /// バックスペース削除 + 高速タイミング（デフォルト）
    Fast,
    /// バックスペース削除 + 低速タイミング（ターミナル等、取りこぼしやすいアプリ向け）
    Slow,
    /// Shift+Leftで前方テキストを選択してから上書き
    /// （バックスペースがナビゲーションになるアドレスバー等で使用）
    Selection,
}

/// アプリ別の注入ポリシー
///
/// 方式と3つの遅延（すべてマイクロ秒）の組。
/// 遅延値は実アプリでの取りこぼし実測から調整された経験値。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionPolicy {
    /// 注入方式
    pub method: InjectionMethod,
    /// バックスペース（またはShift+Left）1打ごとの遅延
    pub backspace_delay_us: u64,
    /// 削除完了からテキスト挿入開始までの待機
    pub wait_delay_us: u64,
    /// 挿入文字間の遅延
    pub char_delay_us: u64,
}

impl InjectionPolicy {
    /// 新しいポリシーを作成
    pub fn new(
        method: InjectionMethod,
        backspace_delay_us: u64,
        wait_delay_us: u64,
        char_delay_us: u64,
    ) -> Self {
        Self {
            method,
            backspace_delay_us,
            wait_delay_us,
            char_delay_us,
        }
    }

    /// デフォルトの高速ポリシー（未分類アプリ向け: 200/800/500µs）
    pub fn fast_default() -> Self {
        Self::new(InjectionMethod::Fast, 200, 800, 500)
    }
}

impl Default for InjectionPolicy {
    fn default() -> Self {
        Self::fast_default()
    }
}

/// 合成キーイベントのコード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticCode {
    /// 仮想キーコード（VK_BACK, VK_LEFT, VK_SHIFT等）
    Virtual(u16),
    /// UTF-16コード単位（KEYEVENTF_UNICODE相当）
    Unicode(u16),
}

/// 1つの合成キーイベント記述子
///
/// 注入バーストはこの記述子の列として純粋に構築され、
/// InputSinkPort実装がOS固有のイベント形式に変換する。
/// すべての合成イベントにはINJECTED_KEY_MARKERが付与される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticKey {
    /// コード種別
    pub code: SyntheticCode,
    /// キー解放イベントならtrue
    pub key_up: bool,
}

impl SyntheticKey {
    /// 仮想キーの押下/解放ペアを作成
    pub fn virtual_pair(vk: u16) -> [Self; 2] {
        [
            Self {
                code: SyntheticCode::Virtual(vk),
                key_up: false,
            },
            Self {
                code: SyntheticCode::Virtual(vk),
                key_up: true,
            },
        ]
    }

    /// UTF-16コード単位の押下/解放ペアを作成
    pub fn unicode_pair(unit: u16) -> [Self; 2] {
        [
            Self {
                code: SyntheticCode::Unicode(unit),
                key_up: false,
            },
            Self {
                code: SyntheticCode::Unicode(unit),
                key_up: true,
            },
        ]
    }
}

/// フォアグラウンドプロセスの識別情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    /// プロセスID
    pub pid: u32,
    /// 実行ファイル名（パスを除いた小文字、例: "cmd.exe"）
    pub name: String,
}

impl AppIdentity {
    /// 新しいAppIdentityを作成（名前は小文字に正規化）
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into().to_lowercase(),
        }
    }
}
