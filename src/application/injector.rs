//! テキスト注入モジュール
//!
//! エンジンの編集要求（削除数 + コードポイント列）を合成キーイベントの
//! バーストへ展開し、ポリシーのタイミングで送出します。
//!
//! バーストの構築（plan_burst）は純粋関数で、送出と遅延だけが
//! InputSinkPort越しの副作用になる。テストはプランを直接検証できる。

use crate::domain::keymap::{VK_BACK, VK_LEFT, VK_SHIFT};
use crate::domain::ports::InputSinkPort;
use crate::domain::types::{InjectionMethod, InjectionPolicy, SyntheticKey};
use crate::domain::DomainResult;
use std::sync::Mutex;
use std::time::Duration;

/// 注入バーストの1ステップ
///
/// 1回のシンク送出単位と、その後に挟む待機時間。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionStep {
    /// このステップで送出する合成イベント列
    pub keys: Vec<SyntheticKey>,
    /// 送出後の待機時間
    pub pause_after: Duration,
}

/// 1コードポイントを合成イベント列へ変換
///
/// - U+FFFF以下: Unicode down/upの2イベント
/// - U+10000以上: UTF-16サロゲートペアとして
///   high down/up + low down/upの4イベント
pub fn encode_code_point(cp: u32) -> Vec<SyntheticKey> {
    if cp > 0xFFFF {
        let reduced = cp - 0x10000;
        let high = 0xD800 + ((reduced >> 10) & 0x3FF) as u16;
        let low = 0xDC00 + (reduced & 0x3FF) as u16;

        let [high_down, high_up] = SyntheticKey::unicode_pair(high);
        let [low_down, low_up] = SyntheticKey::unicode_pair(low);
        vec![high_down, high_up, low_down, low_up]
    } else {
        SyntheticKey::unicode_pair(cp as u16).to_vec()
    }
}

/// 編集要求をタイミング付きステップ列へ展開
///
/// # 展開規則
/// - Fast/Slow: バックスペースdown/upペアをbackspace_delay間隔で並べる
/// - Selection: Shift押下 → Left down/upペア列 → Shift解放。
///   バックスペースがナビゲーションになるアプリ（アドレスバー等）で
///   前方テキストを削除する代わりに選択し、挿入で上書きする
/// - 削除フェーズの最後にwait_delayを置いてから挿入フェーズへ
/// - 挿入文字の間にchar_delayを挟む（最後の文字の後には挟まない）
/// - U+10FFFF超および0のコードポイントはスキップ
pub fn plan_burst(
    backspace_count: u8,
    chars: &[u32],
    policy: &InjectionPolicy,
) -> Vec<InjectionStep> {
    let mut steps = Vec::new();
    let backspace_delay = Duration::from_micros(policy.backspace_delay_us);
    let wait_delay = Duration::from_micros(policy.wait_delay_us);
    let char_delay = Duration::from_micros(policy.char_delay_us);

    if backspace_count > 0 {
        match policy.method {
            InjectionMethod::Fast | InjectionMethod::Slow => {
                for _ in 0..backspace_count {
                    steps.push(InjectionStep {
                        keys: SyntheticKey::virtual_pair(VK_BACK).to_vec(),
                        pause_after: backspace_delay,
                    });
                }
            }
            InjectionMethod::Selection => {
                steps.push(InjectionStep {
                    keys: vec![SyntheticKey {
                        code: crate::domain::types::SyntheticCode::Virtual(VK_SHIFT),
                        key_up: false,
                    }],
                    pause_after: Duration::ZERO,
                });
                for _ in 0..backspace_count {
                    steps.push(InjectionStep {
                        keys: SyntheticKey::virtual_pair(VK_LEFT).to_vec(),
                        pause_after: backspace_delay,
                    });
                }
                steps.push(InjectionStep {
                    keys: vec![SyntheticKey {
                        code: crate::domain::types::SyntheticCode::Virtual(VK_SHIFT),
                        key_up: true,
                    }],
                    pause_after: Duration::ZERO,
                });
            }
        }

        // 削除からテキスト挿入までの待機
        if let Some(last) = steps.last_mut() {
            last.pause_after = wait_delay;
        }
    }

    let valid_chars: Vec<u32> = chars
        .iter()
        .copied()
        .filter(|&cp| cp != 0 && cp <= 0x10FFFF)
        .collect();

    for (i, &cp) in valid_chars.iter().enumerate() {
        let is_last = i + 1 == valid_chars.len();
        steps.push(InjectionStep {
            keys: encode_code_point(cp),
            pause_after: if is_last { Duration::ZERO } else { char_delay },
        });
    }

    steps
}

/// テキスト注入器
///
/// 内部Mutexにより、注入バーストは常に高々1つしか実行されない。
pub struct TextInjector<S: InputSinkPort> {
    sink: Mutex<S>,
}

impl<S: InputSinkPort> TextInjector<S> {
    /// 新しいTextInjectorを作成
    pub fn new(sink: S) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// 編集要求を合成入力として送出
    ///
    /// OSが要求数より少ないイベントしか受理しなかった場合
    /// （権限昇格ウィンドウによるUIPIブロック）は警告ログのみで、
    /// リトライせず致命的エラーにもしない。
    pub fn inject(
        &self,
        backspace_count: u8,
        chars: &[u32],
        policy: &InjectionPolicy,
    ) -> DomainResult<()> {
        let steps = plan_burst(backspace_count, chars, policy);
        if steps.is_empty() {
            return Ok(());
        }

        let mut sink = match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for step in &steps {
            let accepted = sink.send(&step.keys)?;
            if accepted < step.keys.len() {
                // UIPI: 権限昇格ウィンドウは合成入力をブロックする
                tracing::warn!(
                    "Synthetic input partially accepted: {}/{} events (elevated target window?)",
                    accepted,
                    step.keys.len()
                );
            }

            if !step.pause_after.is_zero() {
                std::thread::sleep(step.pause_after);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SyntheticCode;

    fn flatten(steps: &[InjectionStep]) -> Vec<SyntheticKey> {
        steps.iter().flat_map(|s| s.keys.iter().copied()).collect()
    }

    #[test]
    fn test_encode_bmp_code_point_is_two_events() {
        let keys = encode_code_point(0x1EA1); // ạ
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].code, SyntheticCode::Unicode(0x1EA1));
        assert!(!keys[0].key_up);
        assert_eq!(keys[1].code, SyntheticCode::Unicode(0x1EA1));
        assert!(keys[1].key_up);
    }

    #[test]
    fn test_encode_supplementary_code_point_is_surrogate_pair() {
        // U+1F600 → high 0xD83D, low 0xDE00
        let keys = encode_code_point(0x1F600);
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0].code, SyntheticCode::Unicode(0xD83D));
        assert!(!keys[0].key_up);
        assert_eq!(keys[1].code, SyntheticCode::Unicode(0xD83D));
        assert!(keys[1].key_up);
        assert_eq!(keys[2].code, SyntheticCode::Unicode(0xDE00));
        assert!(!keys[2].key_up);
        assert_eq!(keys[3].code, SyntheticCode::Unicode(0xDE00));
        assert!(keys[3].key_up);
    }

    #[test]
    fn test_encode_boundary_code_points() {
        // BMP境界: U+FFFFは2イベント、U+10000は4イベント
        assert_eq!(encode_code_point(0xFFFF).len(), 2);

        let keys = encode_code_point(0x10000);
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0].code, SyntheticCode::Unicode(0xD800));
        assert_eq!(keys[2].code, SyntheticCode::Unicode(0xDC00));
    }

    #[test]
    fn test_plan_send_scenario_default_fast() {
        // エンジン結果 {Send, backspace:2, chars:[U+1EA1]} をデフォルトアプリで展開
        let policy = InjectionPolicy::fast_default();
        let steps = plan_burst(2, &[0x1EA1], &policy);

        // バックスペース2ステップ + 文字1ステップ
        assert_eq!(steps.len(), 3);

        let keys = flatten(&steps);
        assert_eq!(keys.len(), 6); // バックスペース4イベント + 文字2イベント
        for key in &keys[0..4] {
            assert_eq!(key.code, SyntheticCode::Virtual(VK_BACK));
        }
        assert_eq!(keys[4].code, SyntheticCode::Unicode(0x1EA1));
        assert_eq!(keys[5].code, SyntheticCode::Unicode(0x1EA1));

        // タイミング: バックスペース間200µs、削除→挿入800µs、末尾は待機なし
        assert_eq!(steps[0].pause_after, Duration::from_micros(200));
        assert_eq!(steps[1].pause_after, Duration::from_micros(800));
        assert_eq!(steps[2].pause_after, Duration::ZERO);
    }

    #[test]
    fn test_plan_selection_method_uses_shift_left() {
        let policy = InjectionPolicy::new(InjectionMethod::Selection, 500, 1500, 800);
        let steps = plan_burst(3, &[], &policy);

        // Shift押下 + Leftペア3つ + Shift解放
        assert_eq!(steps.len(), 5);

        let keys = flatten(&steps);
        assert_eq!(keys.len(), 8);
        assert_eq!(keys[0].code, SyntheticCode::Virtual(VK_SHIFT));
        assert!(!keys[0].key_up);
        for pair in keys[1..7].chunks(2) {
            assert_eq!(pair[0].code, SyntheticCode::Virtual(VK_LEFT));
            assert!(!pair[0].key_up);
            assert_eq!(pair[1].code, SyntheticCode::Virtual(VK_LEFT));
            assert!(pair[1].key_up);
        }
        assert_eq!(keys[7].code, SyntheticCode::Virtual(VK_SHIFT));
        assert!(keys[7].key_up);

        // 削除フェーズ最終ステップ（Shift解放）後にwait_delay
        assert_eq!(steps[4].pause_after, Duration::from_micros(1500));
    }

    #[test]
    fn test_plan_char_delay_between_characters() {
        let policy = InjectionPolicy::new(InjectionMethod::Fast, 200, 800, 500);
        let steps = plan_burst(0, &[0x0061, 0x1EA1, 0x0063], &policy);

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].pause_after, Duration::from_micros(500));
        assert_eq!(steps[1].pause_after, Duration::from_micros(500));
        // 最後の文字の後には遅延を挟まない
        assert_eq!(steps[2].pause_after, Duration::ZERO);
    }

    #[test]
    fn test_plan_skips_invalid_code_points() {
        let policy = InjectionPolicy::fast_default();
        let steps = plan_burst(0, &[0, 0x61, 0x110000], &policy);

        let keys = flatten(&steps);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].code, SyntheticCode::Unicode(0x61));
    }

    #[test]
    fn test_plan_empty_edit_is_empty() {
        let policy = InjectionPolicy::fast_default();
        assert!(plan_burst(0, &[], &policy).is_empty());
    }

    #[test]
    fn test_plan_backspace_only_still_waits() {
        let policy = InjectionPolicy::fast_default();
        let steps = plan_burst(1, &[], &policy);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].keys.len(), 2);
        assert_eq!(steps[0].pause_after, Duration::from_micros(800));
    }
}
