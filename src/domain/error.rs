/// エラー型定義
///
/// Domain層の統一エラー型。thiserrorを使用して型安全なエラー処理を提供します。
///
/// # 設計方針
/// - unwrap()の使用を禁止し、明示的なエラーハンドリングを強制
/// - Result型でエラー伝播を明示化
/// - 致命的エラー（フック登録失敗）と継続可能エラー（部分的なSendInput受理）を呼び出し側で区別

use thiserror::Error;

/// Domain層の統一エラー型
#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum DomainError {
    /// キーボードフック関連のエラー
    ///
    /// フック登録失敗は起動時の致命的エラー。
    /// 他のIMEがフックを保持している場合やセキュリティソフトによる
    /// ブロックが典型的な原因。
    #[error("Hook error: {0}")]
    Hook(String),

    /// 変換エンジン（FFI）関連のエラー
    #[error("Engine error: {0}")]
    Engine(String),

    /// テキスト注入（SendInput）関連のエラー
    #[error("Injection error: {0}")]
    Injection(String),

    /// フォアグラウンドアプリ分類関連のエラー
    #[error("Classification error: {0}")]
    Classification(String),

    /// 設定関連のエラー
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 初期化エラー
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// その他のエラー
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Domain層の統一Result型
pub type DomainResult<T> = Result<T, DomainError>;
