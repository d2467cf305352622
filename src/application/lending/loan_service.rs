use crate::domain::{
    self, BorrowError, CopyId, FilmCopy, Loan, LoanId, Member, MembershipNumber, ReturnError,
    commands::{BorrowCopy, ReturnCopy},
};
use crate::ports::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::errors::{EntityKind, LendingError, Result};

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 各操作は純粋な関数に依存関係を渡して実行する。
///
/// `serial`は貸出サービス全体を1つの排他区間にするためのロック。
/// 貸出・返却は複本・会員・貸出記録の3集約にまたがる検査と更新を行うため、
/// 複数の呼び出し元から同時に使う場合でも、各操作は完了まで他の操作と重ならない。
/// クローンしたものは同じロックを共有する。
///
/// 複数集約をまとめて変更する書き込みは、すべて`ledger`を通す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub films: Arc<dyn FilmStore>,
    pub copies: Arc<dyn CopyStore>,
    pub members: Arc<dyn MemberStore>,
    pub loans: Arc<dyn LoanStore>,
    pub ledger: Arc<dyn LendingLedger>,
    serial: Arc<Mutex<()>>,
}

impl ServiceDependencies {
    pub fn new(
        films: Arc<dyn FilmStore>,
        copies: Arc<dyn CopyStore>,
        members: Arc<dyn MemberStore>,
        loans: Arc<dyn LoanStore>,
        ledger: Arc<dyn LendingLedger>,
    ) -> Self {
        Self {
            films,
            copies,
            members,
            loans,
            ledger,
            serial: Arc::new(Mutex::new(())),
        }
    }

    /// 4種のストアと一括書き込みをすべて持つゲートウェイから構築する
    pub fn from_gateway<G>(gateway: Arc<G>) -> Self
    where
        G: LibraryGateway + 'static,
    {
        Self::new(
            gateway.clone(),
            gateway.clone(),
            gateway.clone(),
            gateway.clone(),
            gateway,
        )
    }

    /// 排他区間に入る
    ///
    /// 区間内で呼ぶ内部関数は、このロックを再取得してはならない。
    pub(super) async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.serial.lock().await
    }
}

/// 複本を取得するヘルパー関数（見つからなければNotFound）
pub(super) async fn load_copy(deps: &ServiceDependencies, copy_id: &CopyId) -> Result<FilmCopy> {
    deps.copies
        .find_copy_by_id(copy_id)
        .await
        .map_err(LendingError::Gateway)?
        .ok_or_else(|| LendingError::not_found(EntityKind::Copy, copy_id))
}

/// 会員を取得するヘルパー関数（見つからなければNotFound）
pub(super) async fn load_member(
    deps: &ServiceDependencies,
    number: &MembershipNumber,
) -> Result<Member> {
    deps.members
        .find_member_by_number(number)
        .await
        .map_err(LendingError::Gateway)?
        .ok_or_else(|| LendingError::not_found(EntityKind::Member, number))
}

/// 複本を貸し出す
///
/// ビジネスルール（この順に検査する）：
/// - 複本と会員が存在すること
/// - 複本が貸出中でないこと
/// - 会員の貸出数が上限（6枚）未満であること
///
/// 返却期限は貸出日 + 3日。
/// いずれかの検査、または書き込みに失敗した場合、状態は一切変更しない。
///
/// # 戻り値
/// 作成された貸出記録
pub async fn borrow_copy(deps: &ServiceDependencies, cmd: BorrowCopy) -> Result<Loan> {
    // 1. 入力値の検証（状態に触れる前）
    let copy_id = CopyId::new(cmd.copy_id)?;
    let number = MembershipNumber::new(cmd.membership_number)?;

    let _guard = deps.exclusive().await;

    // 2. 集約の取得
    let copy = load_copy(deps, &copy_id).await?;
    let member = load_member(deps, &number).await?;

    // 3. ドメイン層の純粋関数を呼び出し
    let transition =
        domain::lending::borrow(copy, member, cmd.borrow_date).map_err(|e| match e {
            BorrowError::AlreadyOnLoan => {
                tracing::warn!(copy_id = %copy_id, "Borrow rejected: copy already on loan");
                LendingError::AlreadyOnLoan(copy_id.clone())
            }
            BorrowError::LoanLimitExceeded => {
                tracing::warn!(member = %number, "Borrow rejected: loan limit reached");
                LendingError::limit_exceeded(number.clone())
            }
            BorrowError::LoanRejected => LendingError::inconsistent(format!(
                "member {} rejected a loan that passed the limit check",
                number
            )),
        })?;

    // 4. 複本は空いているのに未返却の記録がある場合は不整合
    let stale = deps
        .loans
        .find_open_loan_for_copy(&copy_id)
        .await
        .map_err(LendingError::Gateway)?;
    if let Some(stale) = stale {
        return Err(LendingError::inconsistent(format!(
            "copy {} is marked available but loan {} is still open",
            copy_id,
            stale.id()
        )));
    }

    // 5. 貸出記録・複本・会員を一括で書き込む
    let loan = transition.loan;
    deps.ledger
        .record_borrow(loan.clone(), transition.copy, transition.member)
        .await
        .map_err(LendingError::Gateway)?;

    tracing::info!(
        copy_id = %loan.copy_id(),
        member = %loan.member(),
        due_date = %loan.due_date(),
        "Copy borrowed"
    );

    Ok(loan)
}

/// 複本を返却する
///
/// ビジネスルール：
/// - 複本が存在すること
/// - 複本が貸出中であること
/// - 複本の未返却の貸出記録がゲートウェイから見つかること（見つからなければ不整合）
/// - 延滞していても返却は受け付ける
///
/// 貸出記録を閉じ、複本を貸出可能に戻し、会員から紐付けを外したうえで、
/// 3集約の更新を一括でゲートウェイに書き戻す。
///
/// # 戻り値
/// 閉じた貸出記録
pub async fn return_copy(deps: &ServiceDependencies, cmd: ReturnCopy) -> Result<Loan> {
    // 1. 入力値の検証
    let copy_id = CopyId::new(cmd.copy_id)?;

    let _guard = deps.exclusive().await;

    // 2. 複本の状態確認
    let copy = load_copy(deps, &copy_id).await?;
    if !copy.is_on_loan() {
        tracing::warn!(copy_id = %copy_id, "Return rejected: copy not on loan");
        return Err(LendingError::NotOnLoan(copy_id));
    }

    // 3. 未返却の貸出記録と会員を取得
    let loan = deps
        .loans
        .find_open_loan_for_copy(&copy_id)
        .await
        .map_err(LendingError::Gateway)?
        .ok_or_else(|| {
            LendingError::inconsistent(format!(
                "copy {} is on loan but has no open loan record",
                copy_id
            ))
        })?;

    let member = deps
        .members
        .find_member_by_number(loan.member())
        .await
        .map_err(LendingError::Gateway)?
        .ok_or_else(|| {
            LendingError::inconsistent(format!(
                "loan {} references unknown member {}",
                loan.id(),
                loan.member()
            ))
        })?;

    // 4. ドメイン層の純粋関数を呼び出し
    let loan_id = loan.id();
    let transition =
        domain::lending::give_back(copy, member, loan, cmd.return_date).map_err(|e| match e {
            ReturnError::NotOnLoan => LendingError::NotOnLoan(copy_id.clone()),
            ReturnError::LoanMismatch => LendingError::inconsistent(format!(
                "open loan {} does not match copy {}",
                loan_id, copy_id
            )),
            ReturnError::AlreadyReturned => LendingError::inconsistent(format!(
                "loan {} was reported open but is already returned",
                loan_id
            )),
        })?;

    // 5. 貸出記録・複本・会員を一括で書き戻す
    let loan = transition.loan;
    deps.ledger
        .record_return(loan.clone(), transition.copy, transition.member)
        .await
        .map_err(LendingError::Gateway)?;

    tracing::info!(
        copy_id = %loan.copy_id(),
        member = %loan.member(),
        was_overdue = cmd.return_date > loan.due_date(),
        "Copy returned"
    );

    Ok(loan)
}

/// 会員の未返却の貸出を取得する
///
/// 会員が保持する貸出IDの順に返す。返却済みの記録は念のため除外する。
pub async fn list_loans_for_member(
    deps: &ServiceDependencies,
    membership_number: &str,
) -> Result<Vec<Loan>> {
    let number = MembershipNumber::new(membership_number)?;

    let _guard = deps.exclusive().await;

    let member = load_member(deps, &number).await?;
    let mut by_id: HashMap<LoanId, Loan> = deps
        .loans
        .list_loans()
        .await
        .map_err(LendingError::Gateway)?
        .into_iter()
        .map(|loan| (loan.id(), loan))
        .collect();

    Ok(member
        .open_loans()
        .iter()
        .filter_map(|id| by_id.remove(id))
        .filter(|loan| !loan.is_returned() && loan.member() == &number)
        .collect())
}

/// 未返却の貸出記録をすべて取得する（保存順）
pub async fn list_active_loans(deps: &ServiceDependencies) -> Result<Vec<Loan>> {
    let _guard = deps.exclusive().await;

    let loans = deps.loans.list_loans().await.map_err(LendingError::Gateway)?;
    Ok(loans.into_iter().filter(|loan| !loan.is_returned()).collect())
}

/// 返却済みを含む全貸出履歴を取得する（保存順）
pub async fn list_loans(deps: &ServiceDependencies) -> Result<Vec<Loan>> {
    let _guard = deps.exclusive().await;

    deps.loans.list_loans().await.map_err(LendingError::Gateway)
}
