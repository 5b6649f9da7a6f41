//! Value Object 定義
//!
//! 文字列の識別子をそのまま扱わず、生成時にバリデーションを行う型として定義します。

use std::fmt;

use super::error::ValueObjectError;

/// 識別子の最大長（文字数）
pub const MAX_ID_LENGTH: usize = 128;

/// 言語タグの最大長（`ja`, `vi`, `en-US` など）
pub const MAX_LANGUAGE_LENGTH: usize = 16;

fn validate(kind: &'static str, value: &str, max_len: usize) -> Result<(), ValueObjectError> {
    if value.trim().is_empty() {
        return Err(ValueObjectError::Empty(kind));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(ValueObjectError::TooLong {
            kind,
            max: max_len,
            actual: len,
        });
    }
    Ok(())
}

macro_rules! string_value_object {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                validate($kind, &value, $max)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValueObjectError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_value_object!(
    /// チャットルームの識別子
    RoomId,
    "room_id",
    MAX_ID_LENGTH
);

string_value_object!(
    /// ユーザー（購読者）の識別子
    UserId,
    "user_id",
    MAX_ID_LENGTH
);

string_value_object!(
    /// 会話セッションの識別子
    SessionId,
    "session_id",
    MAX_ID_LENGTH
);

string_value_object!(
    /// 学習対象の言語タグ
    Language,
    "language",
    MAX_LANGUAGE_LENGTH
);

impl UserId {
    /// システムメッセージの送信者 ID
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

/// 推論サービスの利用プラン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Plan {
    #[default]
    Lite,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Lite => "lite",
            Plan::Premium => "premium",
        }
    }
}

impl TryFrom<&str> for Plan {
    type Error = ValueObjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "lite" | "plan_lite" => Ok(Plan::Lite),
            "premium" | "plan_premium" => Ok(Plan::Premium),
            _ => Err(ValueObjectError::Unknown {
                kind: "plan",
                value: value.to_string(),
            }),
        }
    }
}
