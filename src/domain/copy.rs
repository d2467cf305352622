use serde::{Deserialize, Serialize};

use super::{CopyId, FilmTitle, MembershipNumber};

/// 複本集約 - 貸出の単位となる物理的な複本
///
/// 所属作品は作成時に固定され、変更されない。
/// 貸出状態は貸出記録と常に同期させる（呼び出し側の責務）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilmCopy {
    id: CopyId,
    film: FilmTitle,
    on_loan: bool,
    borrower: Option<MembershipNumber>,
}

impl FilmCopy {
    /// 新しい複本（貸出可能状態）
    pub fn new(id: CopyId, film: FilmTitle) -> Self {
        Self {
            id,
            film,
            on_loan: false,
            borrower: None,
        }
    }

    /// 永続化層から復元する
    pub fn restore(id: CopyId, film: FilmTitle, borrower: Option<MembershipNumber>) -> Self {
        Self {
            id,
            film,
            on_loan: borrower.is_some(),
            borrower,
        }
    }

    pub fn id(&self) -> &CopyId {
        &self.id
    }

    pub fn film(&self) -> &FilmTitle {
        &self.film
    }

    pub fn is_on_loan(&self) -> bool {
        self.on_loan
    }

    pub fn borrower(&self) -> Option<&MembershipNumber> {
        self.borrower.as_ref()
    }

    pub fn mark_borrowed(&mut self, member: &MembershipNumber) {
        self.on_loan = true;
        self.borrower = Some(member.clone());
    }

    pub fn mark_returned(&mut self) {
        self.on_loan = false;
        self.borrower = None;
    }
}
