use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// コマンド：作品を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFilm {
    pub title: String,
}

/// コマンド：作品に複本を追加する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCopy {
    pub film_title: String,
    pub copy_id: String,
}

/// コマンド：会員を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMember {
    pub membership_number: String,
    pub name: String,
}

/// コマンド：会員名を変更する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameMember {
    pub membership_number: String,
    pub name: String,
}

/// コマンド：複本を貸し出す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowCopy {
    pub copy_id: String,
    pub membership_number: String,
    pub borrow_date: NaiveDate,
}

/// コマンド：複本を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnCopy {
    pub copy_id: String,
    pub return_date: NaiveDate,
}
