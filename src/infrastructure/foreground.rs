//! Windowsフォアグラウンド検出実装（Infrastructure層）
//!
//! 前面ウィンドウのプロセス識別（ForegroundPort実装）と、
//! フォアグラウンド/フォーカス変更のWinEvent購読を提供します。

use crate::domain::ports::ForegroundPort;
use crate::domain::types::AppIdentity;
use crate::domain::{DomainError, DomainResult};
use std::sync::{Mutex, OnceLock};
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowThreadProcessId, EVENT_OBJECT_FOCUS, EVENT_SYSTEM_FOREGROUND,
    WINEVENT_OUTOFCONTEXT,
};

/// Windowsフォアグラウンド検出アダプタ
///
/// プロセス名の解決（OpenProcess + QueryFullProcessImageNameW）は
/// PIDが変わらない限りキャッシュを返す。分類器のTTLキャッシュとは
/// 独立した、名前解決コストだけのキャッシュ。
pub struct WindowsForegroundAdapter {
    name_cache: Mutex<Option<(u32, String)>>,
}

impl WindowsForegroundAdapter {
    /// 新しいWindowsForegroundAdapterを作成
    pub fn new() -> Self {
        Self {
            name_cache: Mutex::new(None),
        }
    }
}

impl Default for WindowsForegroundAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundPort for WindowsForegroundAdapter {
    fn current(&self) -> Option<AppIdentity> {
        let hwnd: HWND = unsafe { GetForegroundWindow() };
        if hwnd.0 == 0 {
            return None;
        }

        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
        if pid == 0 {
            return None;
        }

        let mut cache = match self.name_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some((cached_pid, name)) = cache.as_ref() {
            if *cached_pid == pid {
                return Some(AppIdentity::new(pid, name.clone()));
            }
        }

        let name = read_process_image_name(pid)?;
        *cache = Some((pid, name.clone()));
        Some(AppIdentity::new(pid, name))
    }
}

/// プロセスIDから実行ファイル名を取得
fn read_process_image_name(pid: u32) -> Option<String> {
    let handle: HANDLE =
        unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;

    let mut buf = [0u16; 260];
    let mut size = buf.len() as u32;
    let result = unsafe {
        QueryFullProcessImageNameW(handle, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut size)
    };
    let _ = unsafe { CloseHandle(handle) };
    result.ok()?;

    let path = String::from_utf16_lossy(&buf[..size as usize]);
    path.rsplit('\\').next().map(|name| name.to_string())
}

/// フォーカス変更時に呼ばれるコールバック
type FocusCallback = Box<dyn Fn() + Send + Sync>;

/// WinEventコールバックから参照されるプロセスグローバルなコールバック
static FOCUS_CALLBACK: OnceLock<FocusCallback> = OnceLock::new();

/// フォーカス変更ウォッチャー
///
/// EVENT_SYSTEM_FOREGROUND（前面ウィンドウ変更）とEVENT_OBJECT_FOCUS
/// （入力フォーカス変更）を購読する。WINEVENT_OUTOFCONTEXTのコールバックは
/// 登録スレッドのメッセージループ上で配送されるため、メインスレッドで
/// 登録しメッセージループを回すこと。
pub struct FocusWatcher {
    hooks: Vec<HWINEVENTHOOK>,
}

impl FocusWatcher {
    /// ウォッチャーを登録
    ///
    /// # Arguments
    /// - `on_change`: 変更検出時に呼ぶコールバック
    ///   （分類キャッシュの無効化とフォーカス変更フラグの設定）
    pub fn install(on_change: impl Fn() + Send + Sync + 'static) -> DomainResult<Self> {
        FOCUS_CALLBACK
            .set(Box::new(on_change))
            .map_err(|_| DomainError::Hook("Focus watcher already installed".to_string()))?;

        let mut hooks = Vec::with_capacity(2);
        for event in [EVENT_SYSTEM_FOREGROUND, EVENT_OBJECT_FOCUS] {
            let hook = unsafe {
                SetWinEventHook(
                    event,
                    event,
                    windows::Win32::Foundation::HMODULE::default(),
                    Some(win_event_proc),
                    0, // すべてのプロセス
                    0, // すべてのスレッド
                    WINEVENT_OUTOFCONTEXT,
                )
            };
            if hook.0 == 0 {
                // 片方だけでも分類キャッシュはTTLで守られるため続行
                tracing::warn!("SetWinEventHook failed for event {:#x}", event);
            } else {
                hooks.push(hook);
            }
        }

        if hooks.is_empty() {
            return Err(DomainError::Hook(
                "Failed to install any focus-change hook".to_string(),
            ));
        }

        tracing::info!("Focus watcher installed ({} hooks)", hooks.len());
        Ok(Self { hooks })
    }
}

impl Drop for FocusWatcher {
    fn drop(&mut self) {
        for hook in self.hooks.drain(..) {
            let _ = unsafe { UnhookWinEvent(hook) };
        }
    }
}

/// WinEventのコールバック
unsafe extern "system" fn win_event_proc(
    _hook: HWINEVENTHOOK,
    _event: u32,
    _hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _event_thread: u32,
    _event_time: u32,
) {
    if let Some(callback) = FOCUS_CALLBACK.get() {
        callback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 注: GetForegroundWindowは対話セッションが必要なため、
    // 自動テストではなく手動テストとして残す。

    #[test]
    #[ignore] // 手動テスト用
    fn test_current_foreground() {
        let adapter = WindowsForegroundAdapter::new();
        let app = adapter.current();
        println!("foreground: {:?}", app);
    }
}
