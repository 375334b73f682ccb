/// Port定義（Clean Architectureのインターフェース）
///
/// Domain層が外部実装に依存するための抽象trait。
/// Infrastructure層がこれらを実装し、Application層がDIで注入する。

use crate::domain::{AppIdentity, DomainResult, EngineEdit, SyntheticKey};

/// 変換エンジンポート: キーストローク変換を抽象化
///
/// 実装はFFI経由で外部エンジンDLLを呼び出す。結果の生ポインタの
/// 解放は実装側の責務であり、呼び出し側には所有コピーのみが渡る。
pub trait EnginePort: Send {
    /// 1キーストロークをエンジンに渡し、編集要求を受け取る
    ///
    /// # Arguments
    /// - `keycode`: エンジンのキーコード空間に変換済みのコード
    /// - `caps`: CapsLockのトグル状態
    /// - `ctrl`: Ctrl修飾キーの押下状態
    /// - `shift`: Shift修飾キーの押下状態
    ///
    /// # Returns
    /// - `Some(EngineEdit)`: エンジンからの応答（action=Noneを含む）
    /// - `None`: エンジンが結果を返さなかった（パススルー）
    fn process_key(&mut self, keycode: u16, caps: bool, ctrl: bool, shift: bool)
        -> Option<EngineEdit>;

    /// 現在の単語合成バッファをクリア
    ///
    /// フォーカス切り替え時に呼び出され、前のウィンドウで入力途中
    /// だった単語が次のウィンドウへ波及するのを防ぐ。
    fn clear(&mut self);
}

/// フォアグラウンド検出ポート: 前面アプリの識別を抽象化
pub trait ForegroundPort: Send + Sync {
    /// 現在のフォアグラウンドプロセスを取得
    ///
    /// # Returns
    /// - `Some(AppIdentity)`: プロセスID + 実行ファイル名（小文字）
    /// - `None`: 取得失敗（呼び出し側はデフォルトポリシーへフォールバック）
    fn current(&self) -> Option<AppIdentity>;
}

/// 入力シンクポート: 合成キーイベントの送出を抽象化
///
/// 実装はすべてのイベントにINJECTED_KEY_MARKERを付与する。
pub trait InputSinkPort: Send {
    /// 合成イベントのバッチを送出
    ///
    /// # Returns
    /// - `Ok(accepted)`: OSが受理したイベント数。要求数未満の場合は
    ///   UIPI（権限昇格ウィンドウ）によるブロックを示す。
    ///   呼び出し側はログのみでリトライしない。
    /// - `Err(DomainError)`: 送出自体の失敗
    fn send(&mut self, keys: &[SyntheticKey]) -> DomainResult<usize>;
}
