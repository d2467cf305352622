use crate::domain::{Member, MembershipNumber};
use async_trait::async_trait;

use super::Result;

/// 会員ストアポート
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// 会員を保存する（既存の場合は上書き）
    async fn save_member(&self, member: Member) -> Result<()>;

    /// 会員番号で会員を取得する
    async fn find_member_by_number(&self, number: &MembershipNumber) -> Result<Option<Member>>;

    /// すべての会員を取得する
    async fn list_members(&self) -> Result<Vec<Member>>;
}
