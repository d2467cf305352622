use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{CloseLoanError, CopyId, FilmCopy, FilmTitle, LoanId, Member, MembershipNumber};

/// 貸出期間（日数）
pub const LOAN_PERIOD_DAYS: i64 = 3;

/// Loan集約 - 1枚の複本の1回の貸出
///
/// 論理的な同一性は（複本、会員、貸出日）で決まる。
/// 返却期限は作成時に一度だけ計算し、再計算しない。
/// 返却済みの貸出も履歴として削除しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    id: LoanId,

    // 他の集約への参照（自然キーのみ）
    copy_id: CopyId,
    film_title: FilmTitle,
    member: MembershipNumber,

    borrow_date: NaiveDate,
    due_date: NaiveDate,
    return_date: Option<NaiveDate>,
}

impl Loan {
    /// 新しい貸出を開始する
    ///
    /// 返却期限は貸出日 + 3日。
    pub fn open(copy: &FilmCopy, member: &Member, borrow_date: NaiveDate) -> Self {
        Self {
            id: LoanId::new(),
            copy_id: copy.id().clone(),
            film_title: copy.film().clone(),
            member: member.number().clone(),
            borrow_date,
            due_date: borrow_date + Duration::days(LOAN_PERIOD_DAYS),
            return_date: None,
        }
    }

    /// 永続化層から復元する
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: LoanId,
        copy_id: CopyId,
        film_title: FilmTitle,
        member: MembershipNumber,
        borrow_date: NaiveDate,
        due_date: NaiveDate,
        return_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id,
            copy_id,
            film_title,
            member,
            borrow_date,
            due_date,
            return_date,
        }
    }

    pub fn id(&self) -> LoanId {
        self.id
    }

    pub fn copy_id(&self) -> &CopyId {
        &self.copy_id
    }

    pub fn film_title(&self) -> &FilmTitle {
        &self.film_title
    }

    pub fn member(&self) -> &MembershipNumber {
        &self.member
    }

    pub fn borrow_date(&self) -> NaiveDate {
        self.borrow_date
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    pub fn is_returned(&self) -> bool {
        self.return_date.is_some()
    }

    /// 延滞判定：未返却かつ基準日が返却期限を過ぎている
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.is_returned() && as_of > self.due_date
    }

    /// 延滞日数（延滞していなければ0）
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        if self.is_overdue(as_of) {
            (as_of - self.due_date).num_days()
        } else {
            0
        }
    }

    /// 返却日を記録して貸出を閉じる
    ///
    /// 返却済みの貸出は再度閉じられない（返却日は上書きしない）。
    pub fn close(&mut self, return_date: NaiveDate) -> Result<(), CloseLoanError> {
        if self.is_returned() {
            return Err(CloseLoanError::AlreadyClosed);
        }
        self.return_date = Some(return_date);
        Ok(())
    }
}
