use chrono::NaiveDate;

use crate::domain::Loan;

use super::errors::{LendingError, Result};
use super::loan_service::ServiceDependencies;

/// 延滞中の貸出を検出する
///
/// ビジネスルール：
/// - 基準日が返却期限を過ぎた未返却の貸出を延滞とする
/// - 返却済みの貸出は対象外
/// - 延滞料金は扱わない
///
/// 返却期限の古い順に返す。
pub async fn find_overdue_loans(deps: &ServiceDependencies, as_of: NaiveDate) -> Result<Vec<Loan>> {
    let _guard = deps.exclusive().await;

    let mut overdue: Vec<Loan> = deps
        .loans
        .list_loans()
        .await
        .map_err(LendingError::Gateway)?
        .into_iter()
        .filter(|loan| loan.is_overdue(as_of))
        .collect();
    overdue.sort_by_key(|loan| loan.due_date());

    tracing::debug!(as_of = %as_of, count = overdue.len(), "Overdue loans detected");
    Ok(overdue)
}
