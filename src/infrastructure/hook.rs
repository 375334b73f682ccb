//! Windows低レベルキーボードフック実装（Infrastructure層）
//!
//! SetWindowsHookExW(WH_KEYBOARD_LL)によるシステムワイドフックの登録と、
//! OSコールバックからApplication層のHookFilterへの橋渡しを行う。
//!
//! # トランポリン
//! OSのフックAPIはコンテキスト引数を持たないCコールバックを要求するため、
//! プロセスグローバルに登録された1つのフィルタをコールバック冒頭で
//! 引くしかない。生ポインタ/グローバルが避けられないのはこの1箇所だけで、
//! そこから先はすべて型付きの所有状態で動く。

use crate::application::listener::{HookFilter, RawKeyInput};
use crate::application::pipeline::PipelineShared;
use crate::domain::{DomainError, DomainResult};
use std::sync::{Arc, OnceLock};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyState, VK_CAPITAL, VK_CONTROL, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, SetWindowsHookExW, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT,
    LLKHF_INJECTED, WH_KEYBOARD_LL, WM_KEYDOWN, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

/// コールバックから参照されるプロセスグローバルなフィルタ
static HOOK_FILTER: OnceLock<HookFilter> = OnceLock::new();

/// キーボードフックアダプタ
///
/// Dropで自動的に登録解除される。ワーカー停止より先にDropすること
/// （新規イベントの生産を止めてから消費を止める）。
pub struct KeyboardHookAdapter {
    hook: HHOOK,
}

impl KeyboardHookAdapter {
    /// システムワイドフックを登録
    ///
    /// # Errors
    /// 登録失敗は起動時の致命的エラー。他のIME（UniKey/OpenKey/EVKey等）が
    /// フックを保持している場合やセキュリティソフトのブロックが典型要因。
    pub fn install(shared: Arc<PipelineShared>) -> DomainResult<Self> {
        HOOK_FILTER
            .set(HookFilter::new(shared))
            .map_err(|_| DomainError::Hook("Keyboard hook already installed".to_string()))?;

        let hinstance: HINSTANCE = unsafe { GetModuleHandleW(None) }
            .map_err(|e| DomainError::Hook(format!("GetModuleHandleW failed: {}", e)))?
            .into();

        // dwThreadId = 0 でシステムワイド
        let hook = unsafe {
            SetWindowsHookExW(WH_KEYBOARD_LL, Some(low_level_keyboard_proc), hinstance, 0)
        }
        .map_err(|e| {
            DomainError::Hook(format!(
                "SetWindowsHookExW failed: {} (another IME or security software may hold the hook)",
                e
            ))
        })?;

        tracing::info!("Low-level keyboard hook installed");
        Ok(Self { hook })
    }
}

impl Drop for KeyboardHookAdapter {
    fn drop(&mut self) {
        if unsafe { UnhookWindowsHookEx(self.hook) }.is_err() {
            tracing::warn!("UnhookWindowsHookEx failed");
        } else {
            tracing::info!("Keyboard hook uninstalled");
        }
    }
}

/// 低レベルキーボードフックのコールバック
///
/// OSのフックチェーン上で実行されるため、ここでの仕事は
/// KBDLLHOOKSTRUCTのRawKeyInputへの写像とフィルタ呼び出しのみ。
/// いかなる判定結果でもイベントは必ず次のフックへ流す
/// （このIMEはキーを握りつぶさず、削除はバックスペース注入で行う）。
unsafe extern "system" fn low_level_keyboard_proc(
    code: i32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if code == HC_ACTION as i32 {
        if let Some(filter) = HOOK_FILTER.get() {
            let kbd = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
            let msg = wparam.0 as u32;

            let raw = RawKeyInput {
                vk_code: kbd.vkCode as u16,
                key_down: msg == WM_KEYDOWN || msg == WM_SYSKEYDOWN,
                system_transition: msg == WM_SYSKEYDOWN || msg == WM_SYSKEYUP,
                os_injected: kbd.flags.contains(LLKHF_INJECTED),
                extra_info: kbd.dwExtraInfo,
                // GetKeyStateの最下位ビットはトグル状態、最上位ビットは押下状態
                caps: (GetKeyState(VK_CAPITAL.0 as i32) & 0x0001) != 0,
                ctrl: (GetKeyState(VK_CONTROL.0 as i32) & 0x8000u16 as i16) != 0,
                shift: (GetKeyState(VK_SHIFT.0 as i32) & 0x8000u16 as i16) != 0,
            };

            let _ = filter.process(raw);
        }
    }

    CallNextHookEx(HHOOK::default(), code, wparam, lparam)
}
