use crate::domain::{Film, FilmCopy, Loan, Member};
use async_trait::async_trait;

use super::Result;

/// 複数集約をまとめて書き込むポート
///
/// 貸出・返却・複本追加は2〜3集約を同時に更新する。
/// 各メソッドはすべて反映されるか、何も反映されないかのどちらか。
/// エラー時にゲートウェイの状態は呼び出し前のまま。
#[async_trait]
pub trait LendingLedger: Send + Sync {
    /// 新しい複本を保存し、複本一覧を更新した作品を書き戻す
    ///
    /// 既に存在する複本IDの場合はエラー。
    async fn record_new_copy(&self, film: Film, copy: FilmCopy) -> Result<()>;

    /// 貸出を記録する
    ///
    /// `save_loan`・`save_copy`・`save_member`を1つの単位として行う。
    /// 既に保存された貸出IDの場合はエラー。
    async fn record_borrow(&self, loan: Loan, copy: FilmCopy, member: Member) -> Result<()>;

    /// 返却を記録する
    ///
    /// `mark_loan_updated`・`save_copy`・`save_member`を1つの単位として行う。
    /// 保存されていない貸出記録の場合はエラー。
    async fn record_return(&self, loan: Loan, copy: FilmCopy, member: Member) -> Result<()>;
}
