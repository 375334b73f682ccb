/// キーコード変換テーブル
///
/// Windows仮想キーコード（VK）を変換エンジンの期待するキーコード空間へ
/// 変換する静的テーブル。エンジンはmacOS系のキーコードを期待するため、
/// Windows側でこの変換を行う。未知のコードはNoneを返し、ワーカーが
/// そのままスキップする。
///
/// 定数はWinUser.hのVK_*値。Domain層を特定プラットフォームの
/// クレートに依存させないため、ここで直接定義する。

/// 修飾キー
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12;
pub const VK_LSHIFT: u16 = 0xA0;
pub const VK_RSHIFT: u16 = 0xA1;
pub const VK_LCONTROL: u16 = 0xA2;
pub const VK_RCONTROL: u16 = 0xA3;
pub const VK_LMENU: u16 = 0xA4;
pub const VK_RMENU: u16 = 0xA5;
pub const VK_LWIN: u16 = 0x5B;
pub const VK_RWIN: u16 = 0x5C;

/// ロック・システムキー
pub const VK_CAPITAL: u16 = 0x14;
pub const VK_NUMLOCK: u16 = 0x90;
pub const VK_SCROLL: u16 = 0x91;
pub const VK_PAUSE: u16 = 0x13;
pub const VK_SNAPSHOT: u16 = 0x2C;

/// 編集・制御キー
pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;

/// 矢印キー
pub const VK_LEFT: u16 = 0x25;
pub const VK_UP: u16 = 0x26;
pub const VK_RIGHT: u16 = 0x27;
pub const VK_DOWN: u16 = 0x28;

/// ファンクションキー範囲
const VK_F1: u16 = 0x70;
const VK_F24: u16 = 0x87;

/// OEM記号キー
const VK_OEM_1: u16 = 0xBA; // ;:
const VK_OEM_PLUS: u16 = 0xBB; // =+
const VK_OEM_COMMA: u16 = 0xBC; // ,<
const VK_OEM_MINUS: u16 = 0xBD; // -_
const VK_OEM_PERIOD: u16 = 0xBE; // .>
const VK_OEM_2: u16 = 0xBF; // /?
const VK_OEM_3: u16 = 0xC0; // `~
const VK_OEM_4: u16 = 0xDB; // [{
const VK_OEM_5: u16 = 0xDC; // \|
const VK_OEM_6: u16 = 0xDD; // ]}
const VK_OEM_7: u16 = 0xDE; // '"

/// VKコードをエンジンのキーコードへ変換
///
/// # Returns
/// - `Some(code)`: エンジンが認識するキーコード
/// - `None`: エンジンの対象外のキー（ワーカーはスキップする）
pub fn vk_to_engine_keycode(vk: u16) -> Option<u16> {
    let code = match vk {
        // 英字（QWERTY配列）
        v if v == b'A' as u16 => 0x00,
        v if v == b'S' as u16 => 0x01,
        v if v == b'D' as u16 => 0x02,
        v if v == b'F' as u16 => 0x03,
        v if v == b'H' as u16 => 0x04,
        v if v == b'G' as u16 => 0x05,
        v if v == b'Z' as u16 => 0x06,
        v if v == b'X' as u16 => 0x07,
        v if v == b'C' as u16 => 0x08,
        v if v == b'V' as u16 => 0x09,
        v if v == b'B' as u16 => 0x0B,
        v if v == b'Q' as u16 => 0x0C,
        v if v == b'W' as u16 => 0x0D,
        v if v == b'E' as u16 => 0x0E,
        v if v == b'R' as u16 => 0x0F,
        v if v == b'Y' as u16 => 0x10,
        v if v == b'T' as u16 => 0x11,
        v if v == b'O' as u16 => 0x1F,
        v if v == b'U' as u16 => 0x20,
        v if v == b'I' as u16 => 0x22,
        v if v == b'P' as u16 => 0x23,
        v if v == b'L' as u16 => 0x25,
        v if v == b'J' as u16 => 0x26,
        v if v == b'K' as u16 => 0x28,
        v if v == b'N' as u16 => 0x2D,
        v if v == b'M' as u16 => 0x2E,

        // 数字
        v if v == b'1' as u16 => 0x12,
        v if v == b'2' as u16 => 0x13,
        v if v == b'3' as u16 => 0x14,
        v if v == b'4' as u16 => 0x15,
        v if v == b'5' as u16 => 0x17,
        v if v == b'6' as u16 => 0x16,
        v if v == b'7' as u16 => 0x1A,
        v if v == b'8' as u16 => 0x1C,
        v if v == b'9' as u16 => 0x19,
        v if v == b'0' as u16 => 0x1D,

        // 制御キー
        VK_SPACE => 0x31,
        VK_BACK => 0x33,
        VK_TAB => 0x30,
        VK_RETURN => 0x24,
        VK_ESCAPE => 0x35,

        // 矢印キー
        VK_LEFT => 0x7B,
        VK_RIGHT => 0x7C,
        VK_DOWN => 0x7D,
        VK_UP => 0x7E,

        // 記号
        VK_OEM_PERIOD => 0x2F,
        VK_OEM_COMMA => 0x2B,
        VK_OEM_2 => 0x2C,
        VK_OEM_1 => 0x29,
        VK_OEM_7 => 0x27,
        VK_OEM_4 => 0x21,
        VK_OEM_6 => 0x1E,
        VK_OEM_5 => 0x2A,
        VK_OEM_MINUS => 0x1B,
        VK_OEM_PLUS => 0x18,
        VK_OEM_3 => 0x32,

        _ => return None,
    };
    Some(code)
}

/// フックが無視すべきVKコードか判定
///
/// 修飾キー単体、Winキー、ファンクションキー、ロックキー、
/// システムキーはエンジンに渡さない。
pub fn should_ignore_vk(vk: u16) -> bool {
    matches!(
        vk,
        VK_SHIFT
            | VK_CONTROL
            | VK_MENU
            | VK_LSHIFT
            | VK_RSHIFT
            | VK_LCONTROL
            | VK_RCONTROL
            | VK_LMENU
            | VK_RMENU
            | VK_LWIN
            | VK_RWIN
            | VK_CAPITAL
            | VK_NUMLOCK
            | VK_SCROLL
            | VK_PAUSE
            | VK_SNAPSHOT
    ) || (VK_F1..=VK_F24).contains(&vk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_mapping() {
        assert_eq!(vk_to_engine_keycode(b'A' as u16), Some(0x00));
        assert_eq!(vk_to_engine_keycode(b'W' as u16), Some(0x0D));
        assert_eq!(vk_to_engine_keycode(b'M' as u16), Some(0x2E));
    }

    #[test]
    fn test_number_mapping() {
        assert_eq!(vk_to_engine_keycode(b'1' as u16), Some(0x12));
        // 5と6は連番にならない（歴史的な配列）
        assert_eq!(vk_to_engine_keycode(b'5' as u16), Some(0x17));
        assert_eq!(vk_to_engine_keycode(b'6' as u16), Some(0x16));
        assert_eq!(vk_to_engine_keycode(b'0' as u16), Some(0x1D));
    }

    #[test]
    fn test_control_key_mapping() {
        assert_eq!(vk_to_engine_keycode(VK_SPACE), Some(0x31));
        assert_eq!(vk_to_engine_keycode(VK_BACK), Some(0x33));
        assert_eq!(vk_to_engine_keycode(VK_RETURN), Some(0x24));
    }

    #[test]
    fn test_unknown_vk_is_none() {
        // Insertキーはエンジン対象外
        assert_eq!(vk_to_engine_keycode(0x2D), None);
        assert_eq!(vk_to_engine_keycode(0xFF), None);
    }

    #[test]
    fn test_should_ignore_modifiers() {
        assert!(should_ignore_vk(VK_SHIFT));
        assert!(should_ignore_vk(VK_LCONTROL));
        assert!(should_ignore_vk(VK_RMENU));
        assert!(should_ignore_vk(VK_LWIN));
    }

    #[test]
    fn test_should_ignore_function_and_lock_keys() {
        assert!(should_ignore_vk(VK_F1));
        assert!(should_ignore_vk(0x7A)); // F11
        assert!(should_ignore_vk(VK_F24));
        assert!(should_ignore_vk(VK_CAPITAL));
        assert!(should_ignore_vk(VK_NUMLOCK));
        assert!(should_ignore_vk(VK_SNAPSHOT));
    }

    #[test]
    fn test_should_not_ignore_text_keys() {
        assert!(!should_ignore_vk(b'A' as u16));
        assert!(!should_ignore_vk(VK_SPACE));
        assert!(!should_ignore_vk(VK_BACK));
    }
}
