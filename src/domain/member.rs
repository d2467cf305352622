use serde::{Deserialize, Serialize};

use super::{Loan, LoanId, MemberName, MembershipNumber};

/// 会員1人あたりの同時貸出上限
pub const MAX_LOANS: usize = 6;

/// Member集約 - 複本を借りる会員
///
/// 不変条件：`open_loans`の件数は、この会員を参照する未返却の貸出記録の件数と常に一致し、
/// `MAX_LOANS`を超えない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    number: MembershipNumber,
    name: MemberName,
    open_loans: Vec<LoanId>,
}

impl Member {
    pub fn new(number: MembershipNumber, name: MemberName) -> Self {
        Self {
            number,
            name,
            open_loans: Vec::new(),
        }
    }

    /// 永続化層から復元する
    pub fn restore(number: MembershipNumber, name: MemberName, open_loans: Vec<LoanId>) -> Self {
        Self {
            number,
            name,
            open_loans,
        }
    }

    pub fn number(&self) -> &MembershipNumber {
        &self.number
    }

    pub fn name(&self) -> &MemberName {
        &self.name
    }

    pub fn rename(&mut self, name: MemberName) {
        self.name = name;
    }

    pub fn open_loans(&self) -> &[LoanId] {
        &self.open_loans
    }

    pub fn open_loan_count(&self) -> usize {
        self.open_loans.len()
    }

    pub fn can_borrow(&self) -> bool {
        self.open_loans.len() < MAX_LOANS
    }

    /// 貸出を紐付ける
    ///
    /// 上限未満かつ貸出記録の会員がこの会員である場合のみ追加し、`true`を返す。
    pub fn attach_loan(&mut self, loan: &Loan) -> bool {
        if !self.can_borrow() || loan.member() != &self.number {
            return false;
        }
        self.open_loans.push(loan.id());
        true
    }

    /// 貸出の紐付けを外す（存在しない場合は何もしない）
    pub fn detach_loan(&mut self, loan_id: LoanId) {
        self.open_loans.retain(|id| *id != loan_id);
    }
}
