//! Infrastructure層: 外部技術の統合
//!
//! Domain層のtraitを実装し、OS（フック/SendInput/WinEvent）と
//! エンジンDLLに接続する。Windows固有のアダプタはcfg(windows)で
//! 分離され、モックアダプタはどの環境でも使える。

pub mod engine;
pub mod mock_engine;
pub mod mock_foreground;
pub mod mock_sink;

#[cfg(windows)]
pub mod foreground;
#[cfg(windows)]
pub mod hook;
#[cfg(windows)]
pub mod sender;
