use crate::domain::{CopyId, FilmCopy};
use async_trait::async_trait;

use super::Result;

/// 複本ストアポート
#[async_trait]
pub trait CopyStore: Send + Sync {
    /// 複本を保存する（既存の場合は上書き）
    async fn save_copy(&self, copy: FilmCopy) -> Result<()>;

    /// IDで複本を取得する
    async fn find_copy_by_id(&self, id: &CopyId) -> Result<Option<FilmCopy>>;

    /// すべての複本を取得する
    async fn list_copies(&self) -> Result<Vec<FilmCopy>>;
}
