use crate::domain::{CopyId, Loan};
use async_trait::async_trait;

use super::Result;

/// 貸出ストアポート
///
/// 貸出記録は削除されない。返却済みの記録も履歴として保持する。
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// 新しい貸出記録を追加する
    async fn save_loan(&self, loan: Loan) -> Result<()>;

    /// 変更された貸出記録を書き戻す
    ///
    /// 値渡しのため、この呼び出しがないと変更は反映されない。
    /// 返却処理では`LendingLedger::record_return`の一部として行われる。
    async fn mark_loan_updated(&self, loan: Loan) -> Result<()>;

    /// 複本の未返却の貸出記録を取得する
    ///
    /// 1枚の複本につき未返却の記録は高々1件。
    async fn find_open_loan_for_copy(&self, copy_id: &CopyId) -> Result<Option<Loan>>;

    /// すべての貸出記録を保存順に取得する
    async fn list_loans(&self) -> Result<Vec<Loan>>;
}
