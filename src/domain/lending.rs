use chrono::NaiveDate;

use super::{BorrowError, FilmCopy, Loan, Member, ReturnError};

/// 貸出遷移の結果
///
/// 複本・会員・貸出記録の3集約を常に揃えて返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub copy: FilmCopy,
    pub member: Member,
    pub loan: Loan,
}

/// 純粋関数：複本を貸し出す
///
/// ビジネスルール（この順に検査する）：
/// - 複本が貸出中でないこと
/// - 会員の貸出数が上限未満であること
///
/// 副作用なし。検査に失敗した場合、渡された値は呼び出し側に何も反映されない。
pub fn borrow(
    mut copy: FilmCopy,
    mut member: Member,
    borrow_date: NaiveDate,
) -> Result<Transition, BorrowError> {
    if copy.is_on_loan() {
        return Err(BorrowError::AlreadyOnLoan);
    }

    if !member.can_borrow() {
        return Err(BorrowError::LoanLimitExceeded);
    }

    let loan = Loan::open(&copy, &member, borrow_date);

    if !member.attach_loan(&loan) {
        return Err(BorrowError::LoanRejected);
    }
    copy.mark_borrowed(member.number());

    Ok(Transition { copy, member, loan })
}

/// 純粋関数：複本を返却する
///
/// ビジネスルール：
/// - 複本が貸出中であること
/// - 貸出記録がこの複本とこの会員のものであること
/// - 貸出記録が未返却であること
/// - 延滞していても返却は受け付ける
///
/// 副作用なし。閉じた貸出記録と、貸出可能に戻した複本、紐付けを外した会員を返す。
pub fn give_back(
    mut copy: FilmCopy,
    mut member: Member,
    mut loan: Loan,
    return_date: NaiveDate,
) -> Result<Transition, ReturnError> {
    if !copy.is_on_loan() {
        return Err(ReturnError::NotOnLoan);
    }

    if loan.copy_id() != copy.id() || loan.member() != member.number() {
        return Err(ReturnError::LoanMismatch);
    }

    loan.close(return_date)?;
    copy.mark_returned();
    member.detach_loan(loan.id());

    Ok(Transition { copy, member, loan })
}
