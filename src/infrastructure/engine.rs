//! 変換エンジンFFIクライアント（Infrastructure層）
//!
//! 外部エンジンDLL（gonhanh_core.dll）をEnginePort traitの背後に隠す。
//! ABI構造体と結果変換はプラットフォーム非依存で、DLLロードと
//! シンボル解決だけがWindows固有になる。
//!
//! # 結果の所有権
//! エンジンが返す生ポインタの寿命はエンジン側が管理する。
//! クライアントは値をコピーした直後にime_freeでちょうど1回解放し、
//! 生ポインタをイテレーションをまたいで保持しない。

use crate::domain::types::{EngineAction, EngineEdit};

/// エンジン結果が保持できる最大コードポイント数（ABI固定）
pub const ENGINE_MAX_CHARS: usize = 16;

/// エンジン結果のC互換レイアウト
///
/// エンジンDLLの公開レイアウトとバイト単位で一致する必要がある。
/// 下のコンパイル時検証が一致を保証する（実測74バイト → アライメントで80）。
#[allow(dead_code)]
#[repr(C)]
pub struct EngineRawResult {
    /// 0=None, 1=Send, 2=Restore
    pub action: u8,
    /// 削除する文字数
    pub backspace: u8,
    /// 挿入するUTF-32コードポイント（ゼロ終端の場合あり）
    pub chars: [u32; ENGINE_MAX_CHARS],
    /// charsの有効要素数（0-16）
    pub count: i64,
}

// ABIのコンパイル時検証。エンジン側のレイアウト変更はここで即座に検出される。
const _: () = assert!(std::mem::size_of::<EngineRawResult>() == 80);
const _: () = assert!(std::mem::offset_of!(EngineRawResult, action) == 0);
const _: () = assert!(std::mem::offset_of!(EngineRawResult, backspace) == 1);
const _: () = assert!(std::mem::offset_of!(EngineRawResult, chars) == 4);
const _: () = assert!(std::mem::offset_of!(EngineRawResult, count) == 72);

/// 生のエンジン結果を所有コピーへ変換
///
/// countを配列境界にクランプし、ゼロのコードポイントを終端として扱う。
#[allow(dead_code)]
pub fn convert_raw_result(raw: &EngineRawResult) -> EngineEdit {
    let count = raw.count.clamp(0, ENGINE_MAX_CHARS as i64) as usize;

    let mut chars = Vec::with_capacity(count);
    for &cp in &raw.chars[..count] {
        if cp == 0 {
            break;
        }
        chars.push(cp);
    }

    EngineEdit {
        action: EngineAction::from_raw(raw.action),
        backspace: raw.backspace,
        chars,
    }
}

#[cfg(windows)]
pub use dll_client::EngineDllClient;

/// エンジンDLLクライアント（Windows実装）
#[cfg(windows)]
mod dll_client {
    use super::{convert_raw_result, EngineRawResult};
    use crate::domain::config::EngineConfig;
    use crate::domain::ports::EnginePort;
    use crate::domain::types::EngineEdit;
    use crate::domain::{DomainError, DomainResult};
    use std::ffi::{CStr, CString};
    use std::os::raw::c_char;
    use windows::core::{PCSTR, PCWSTR};
    use windows::Win32::Foundation::HMODULE;
    use windows::Win32::System::LibraryLoader::{FreeLibrary, GetProcAddress, LoadLibraryW};

    type InitFn = unsafe extern "C" fn();
    type KeyExtFn = unsafe extern "C" fn(u16, bool, bool, bool) -> *mut EngineRawResult;
    type FreeFn = unsafe extern "C" fn(*mut EngineRawResult);
    type VoidFn = unsafe extern "C" fn();
    type BoolFn = unsafe extern "C" fn(bool);
    type MethodFn = unsafe extern "C" fn(u8);
    type StrFn = unsafe extern "C" fn(*const c_char);
    type Str2Fn = unsafe extern "C" fn(*const c_char, *const c_char);

    /// エンジンDLLクライアント
    ///
    /// すべてのエントリポイントはOption。シンボルが欠けているDLLでも
    /// プロセスは落とさず、該当呼び出しをno-opにして継続する
    /// （欠落はロード時に1回だけ警告される）。
    pub struct EngineDllClient {
        module: HMODULE,
        ime_init: Option<InitFn>,
        ime_key_ext: Option<KeyExtFn>,
        ime_free: Option<FreeFn>,
        ime_clear: Option<VoidFn>,
        ime_clear_all: Option<VoidFn>,
        ime_method: Option<MethodFn>,
        ime_enabled: Option<BoolFn>,
        ime_modern: Option<BoolFn>,
        ime_free_tone: Option<BoolFn>,
        ime_skip_w_shortcut: Option<BoolFn>,
        ime_bracket_shortcut: Option<BoolFn>,
        ime_esc_restore: Option<BoolFn>,
        ime_english_auto_restore: Option<BoolFn>,
        ime_auto_capitalize: Option<BoolFn>,
        ime_add_shortcut: Option<Str2Fn>,
        ime_remove_shortcut: Option<StrFn>,
        ime_clear_shortcuts: Option<VoidFn>,
        ime_restore_word: Option<StrFn>,
    }

    // SAFETY: エンジンDLLの状態はプロセスグローバルで、クライアントは
    // ワーカースレッド1つが専有する（EnginePort: Sendのみ要求）。
    unsafe impl Send for EngineDllClient {}

    /// シンボルを解決してfnポインタ型へ変換
    ///
    /// 欠落シンボルは警告ログを出してNoneを返す（呼び出し側はno-op）。
    fn resolve<T: Copy>(module: HMODULE, name: &'static CStr) -> Option<T> {
        let addr = unsafe { GetProcAddress(module, PCSTR(name.as_ptr() as *const u8)) };
        match addr {
            Some(f) => {
                // SAFETY: TはエンジンAPI仕様に一致するextern "C" fnポインタ型に限る
                Some(unsafe { std::mem::transmute_copy(&f) })
            }
            None => {
                tracing::warn!(
                    "Engine symbol not found: {} (calls will be no-ops)",
                    name.to_string_lossy()
                );
                None
            }
        }
    }

    impl EngineDllClient {
        /// エンジンDLLをロードしてシンボルを解決
        ///
        /// DLL自体が見つからない場合のみエラー。個々のシンボル欠落は
        /// 警告にとどめ、デグレード動作で継続する。
        pub fn load(library: &str) -> DomainResult<Self> {
            let wide: Vec<u16> = library.encode_utf16().chain(Some(0)).collect();
            let module = unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }.map_err(|e| {
                DomainError::Initialization(format!(
                    "Failed to load engine library '{}': {}",
                    library, e
                ))
            })?;

            tracing::info!("Engine library loaded: {}", library);

            Ok(Self {
                module,
                ime_init: resolve(module, c"ime_init"),
                ime_key_ext: resolve(module, c"ime_key_ext"),
                ime_free: resolve(module, c"ime_free"),
                ime_clear: resolve(module, c"ime_clear"),
                ime_clear_all: resolve(module, c"ime_clear_all"),
                ime_method: resolve(module, c"ime_method"),
                ime_enabled: resolve(module, c"ime_enabled"),
                ime_modern: resolve(module, c"ime_modern"),
                ime_free_tone: resolve(module, c"ime_free_tone"),
                ime_skip_w_shortcut: resolve(module, c"ime_skip_w_shortcut"),
                ime_bracket_shortcut: resolve(module, c"ime_bracket_shortcut"),
                ime_esc_restore: resolve(module, c"ime_esc_restore"),
                ime_english_auto_restore: resolve(module, c"ime_english_auto_restore"),
                ime_auto_capitalize: resolve(module, c"ime_auto_capitalize"),
                ime_add_shortcut: resolve(module, c"ime_add_shortcut"),
                ime_remove_shortcut: resolve(module, c"ime_remove_shortcut"),
                ime_clear_shortcuts: resolve(module, c"ime_clear_shortcuts"),
                ime_restore_word: resolve(module, c"ime_restore_word"),
            })
        }

        /// エンジンを初期化し、設定を適用
        pub fn initialize(&self, config: &EngineConfig) {
            if let Some(f) = self.ime_init {
                unsafe { f() };
            }
            if let Some(f) = self.ime_enabled {
                unsafe { f(true) };
            }
            if let Some(f) = self.ime_method {
                unsafe { f(config.method.to_engine_value()) };
            }
            if let Some(f) = self.ime_modern {
                unsafe { f(config.modern_tone) };
            }
            if let Some(f) = self.ime_free_tone {
                unsafe { f(config.free_tone) };
            }
            if let Some(f) = self.ime_skip_w_shortcut {
                unsafe { f(config.skip_w_shortcut) };
            }
            if let Some(f) = self.ime_bracket_shortcut {
                unsafe { f(config.bracket_shortcut) };
            }
            if let Some(f) = self.ime_esc_restore {
                unsafe { f(config.esc_restore) };
            }
            if let Some(f) = self.ime_english_auto_restore {
                unsafe { f(config.english_auto_restore) };
            }
            if let Some(f) = self.ime_auto_capitalize {
                unsafe { f(config.auto_capitalize) };
            }

            self.sync_shortcuts(config);
        }

        /// 設定ファイルのショートカットをエンジンへ同期
        fn sync_shortcuts(&self, config: &EngineConfig) {
            let Some(add) = self.ime_add_shortcut else {
                return;
            };
            if let Some(clear) = self.ime_clear_shortcuts {
                unsafe { clear() };
            }

            for shortcut in &config.shortcuts {
                let (Ok(trigger), Ok(replacement)) = (
                    CString::new(shortcut.trigger.as_str()),
                    CString::new(shortcut.replacement.as_str()),
                ) else {
                    tracing::warn!("Skipping shortcut with interior NUL: {}", shortcut.trigger);
                    continue;
                };
                unsafe { add(trigger.as_ptr(), replacement.as_ptr()) };
            }

            if !config.shortcuts.is_empty() {
                tracing::info!("Synced {} engine shortcuts", config.shortcuts.len());
            }
        }

        /// すべてのバッファと状態をクリア
        #[allow(dead_code)]
        pub fn clear_all(&self) {
            if let Some(f) = self.ime_clear_all {
                unsafe { f() };
            }
        }

        /// 完成済みの単語をエンジンの復元バッファへ渡す
        ///
        /// バックスペースで単語境界を戻った際の復元ヒューリスティック用。
        /// 復元の発火自体はエンジン内部の判断に委ねる。
        #[allow(dead_code)]
        pub fn restore_word(&self, word: &str) {
            let Some(f) = self.ime_restore_word else {
                return;
            };
            let Ok(word) = CString::new(word) else {
                return;
            };
            unsafe { f(word.as_ptr()) };
        }

        /// 1つのショートカットを削除
        #[allow(dead_code)]
        pub fn remove_shortcut(&self, trigger: &str) {
            let Some(f) = self.ime_remove_shortcut else {
                return;
            };
            let Ok(trigger) = CString::new(trigger) else {
                return;
            };
            unsafe { f(trigger.as_ptr()) };
        }
    }

    impl EnginePort for EngineDllClient {
        fn process_key(
            &mut self,
            keycode: u16,
            caps: bool,
            ctrl: bool,
            shift: bool,
        ) -> Option<EngineEdit> {
            let key_fn = self.ime_key_ext?;

            let raw = unsafe { key_fn(keycode, caps, ctrl, shift) };
            if raw.is_null() {
                // 結果なし = パススルー（エラーではない）
                return None;
            }

            // コピーしてから即座に解放。生ポインタは保持しない。
            let edit = convert_raw_result(unsafe { &*raw });
            if let Some(free_fn) = self.ime_free {
                unsafe { free_fn(raw) };
            }

            Some(edit)
        }

        fn clear(&mut self) {
            if let Some(f) = self.ime_clear {
                unsafe { f() };
            }
        }
    }

    impl Drop for EngineDllClient {
        fn drop(&mut self) {
            let _ = unsafe { FreeLibrary(self.module) };
        }
    }
}
