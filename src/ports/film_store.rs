use crate::domain::{Film, FilmTitle};
use async_trait::async_trait;

use super::Result;

/// 作品ストアポート
#[async_trait]
pub trait FilmStore: Send + Sync {
    /// 作品を保存する（既存の場合は上書き）
    async fn save_film(&self, film: Film) -> Result<()>;

    /// タイトル（完全一致、大文字小文字を区別）で作品を取得する
    ///
    /// 見つからない場合は`None`を返す。エラーではない。
    async fn find_film_by_title(&self, title: &FilmTitle) -> Result<Option<Film>>;

    /// すべての作品を取得する
    async fn list_films(&self) -> Result<Vec<Film>>;
}
