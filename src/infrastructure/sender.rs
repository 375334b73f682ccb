//! Windows合成入力実装（Infrastructure層）
//!
//! SendInput APIを使用してInputSinkPort traitを実装します。
//! すべての合成イベントのdwExtraInfoにINJECTED_KEY_MARKERを設定し、
//! フック側が自己生成イベントを識別できるようにする。

use crate::domain::ports::InputSinkPort;
use crate::domain::types::{SyntheticCode, SyntheticKey, INJECTED_KEY_MARKER};
use crate::domain::DomainResult;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
    KEYEVENTF_UNICODE, VIRTUAL_KEY,
};

/// Windows合成入力アダプタ
pub struct SendInputAdapter;

impl SendInputAdapter {
    /// 新しいSendInputAdapterを作成
    pub fn new() -> Self {
        Self
    }
}

impl Default for SendInputAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// SyntheticKeyをINPUT構造体へ変換
fn to_input(key: &SyntheticKey) -> INPUT {
    let (vk, scan, mut flags) = match key.code {
        SyntheticCode::Virtual(vk) => (VIRTUAL_KEY(vk), 0u16, KEYBD_EVENT_FLAGS(0)),
        SyntheticCode::Unicode(unit) => (VIRTUAL_KEY(0), unit, KEYEVENTF_UNICODE),
    };
    if key.key_up {
        flags |= KEYEVENTF_KEYUP;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: INJECTED_KEY_MARKER,
            },
        },
    }
}

impl InputSinkPort for SendInputAdapter {
    fn send(&mut self, keys: &[SyntheticKey]) -> DomainResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let inputs: Vec<INPUT> = keys.iter().map(to_input).collect();

        // 受理数が要求数を下回るのはUIPIブロック（昇格ウィンドウ）。
        // GetLastErrorは0を返すことがあり、エラーとしては扱わない。
        let accepted = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        Ok(accepted as usize)
    }
}
