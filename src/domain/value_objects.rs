use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ValidationError;

/// 空白のみの文字列を拒否する
///
/// 空白の判定にのみ前後の空白を除く。値そのものは渡されたまま保持する。
fn non_blank(field: &'static str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(value)
}

/// 文字列を包む自然キー型を定義する
///
/// いずれも空白のみの値を作成できない。
macro_rules! natural_key {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                non_blank($field, value.into()).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

natural_key!(
    /// 作品タイトル - 作品の自然キー（大文字小文字を区別する）
    FilmTitle,
    "title"
);

natural_key!(
    /// 複本ID - 全作品を通して一意
    CopyId,
    "copy_id"
);

natural_key!(
    /// 会員番号 - 会員の自然キー
    MembershipNumber,
    "membership_number"
);

natural_key!(
    /// 会員名
    MemberName,
    "name"
);

/// 貸出ID - 貸出履歴の保存用ハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 在庫検索の下限値
///
/// 不変条件：0以上。負の値は型で作成できない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MinAvailable(usize);

impl MinAvailable {
    pub fn value(&self) -> usize {
        self.0
    }
}

impl TryFrom<i64> for MinAvailable {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .map(Self)
            .map_err(|_| ValidationError::NegativeThreshold(value))
    }
}
