use crate::domain::{
    CopyId, Film, FilmCopy, FilmTitle, Member, MemberName, MembershipNumber, MinAvailable,
    commands::{AddCopy, AddFilm, AddMember, RenameMember},
};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashMap;

use super::errors::{EntityKind, LendingError, Result};
use super::loan_service::{ServiceDependencies, load_member};

/// 作品の在庫状況
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilmAvailability {
    pub title: FilmTitle,
    pub total_copies: usize,
    pub number_available: usize,
}

/// 作品を取得するヘルパー関数（見つからなければNotFound）
async fn load_film(deps: &ServiceDependencies, title: &FilmTitle) -> Result<Film> {
    deps.films
        .find_film_by_title(title)
        .await
        .map_err(LendingError::Gateway)?
        .ok_or_else(|| LendingError::not_found(EntityKind::Film, title))
}

fn missing_copy(film: &Film, id: &CopyId) -> LendingError {
    LendingError::inconsistent(format!(
        "film {} lists copy {} which does not exist",
        film.title(),
        id
    ))
}

/// 作品の貸出可能な複本数を数えるヘルパー関数
///
/// 複本の現在状態をまとめて取得してから数える。
/// 作品に登録された複本がゲートウェイに存在しない場合は不整合とする。
async fn count_available(deps: &ServiceDependencies, film: &Film) -> Result<usize> {
    let found = try_join_all(
        film.copy_ids()
            .iter()
            .map(|id| deps.copies.find_copy_by_id(id)),
    )
    .await
    .map_err(LendingError::Gateway)?;

    let mut copies = Vec::with_capacity(found.len());
    for (id, copy) in film.copy_ids().iter().zip(found) {
        copies.push(copy.ok_or_else(|| missing_copy(film, id))?);
    }

    Ok(film.number_available(&copies))
}

/// 全複本を一度に読み込み、IDで引ける索引にする
///
/// 複数の作品の在庫を数えるときに使う。
async fn load_copy_index(deps: &ServiceDependencies) -> Result<HashMap<CopyId, FilmCopy>> {
    let copies = deps
        .copies
        .list_copies()
        .await
        .map_err(LendingError::Gateway)?;

    Ok(copies
        .into_iter()
        .map(|copy| (copy.id().clone(), copy))
        .collect())
}

/// 索引から作品の貸出可能な複本数を数える
fn count_available_in(film: &Film, index: &HashMap<CopyId, FilmCopy>) -> Result<usize> {
    let copies = film
        .copy_ids()
        .iter()
        .map(|id| index.get(id).ok_or_else(|| missing_copy(film, id)))
        .collect::<Result<Vec<_>>>()?;

    Ok(film.number_available(copies))
}

async fn all_films(deps: &ServiceDependencies) -> Result<Vec<Film>> {
    deps.films.list_films().await.map_err(LendingError::Gateway)
}

/// 大文字小文字を区別しない部分一致
fn title_matches(film: &Film, normalized_term: &str) -> bool {
    film.title().as_str().to_lowercase().contains(normalized_term)
}

/// 下限以上の在庫がある作品に絞り込む（排他区間内で呼ぶ）
async fn filter_by_availability(
    deps: &ServiceDependencies,
    films: Vec<Film>,
    min: MinAvailable,
) -> Result<Vec<Film>> {
    let index = load_copy_index(deps).await?;

    let mut matched = Vec::new();
    for film in films {
        if count_available_in(&film, &index)? >= min.value() {
            matched.push(film);
        }
    }
    Ok(matched)
}

/// 作品を登録する
///
/// ビジネスルール：
/// - タイトルが空白のみでないこと
/// - 同じタイトル（大文字小文字を区別する完全一致）の作品が存在しないこと
pub async fn add_film(deps: &ServiceDependencies, cmd: AddFilm) -> Result<Film> {
    let title = FilmTitle::new(cmd.title)?;

    let _guard = deps.exclusive().await;

    let existing = deps
        .films
        .find_film_by_title(&title)
        .await
        .map_err(LendingError::Gateway)?;
    if existing.is_some() {
        return Err(LendingError::duplicate(EntityKind::Film, &title));
    }

    let film = Film::new(title);
    deps.films
        .save_film(film.clone())
        .await
        .map_err(LendingError::Gateway)?;

    tracing::info!(title = %film.title(), "Film added");
    Ok(film)
}

/// 作品に複本を追加する
///
/// ビジネスルール：
/// - 作品が存在すること
/// - 複本IDが全作品を通して一意であること
///
/// 新しい複本は貸出可能状態で作成される。
pub async fn add_copy(deps: &ServiceDependencies, cmd: AddCopy) -> Result<FilmCopy> {
    let title = FilmTitle::new(cmd.film_title)?;
    let copy_id = CopyId::new(cmd.copy_id)?;

    let _guard = deps.exclusive().await;

    let mut film = load_film(deps, &title).await?;

    let existing = deps
        .copies
        .find_copy_by_id(&copy_id)
        .await
        .map_err(LendingError::Gateway)?;
    if existing.is_some() {
        return Err(LendingError::duplicate(EntityKind::Copy, &copy_id));
    }

    let copy = FilmCopy::new(copy_id, film.title().clone());
    if !film.add_copy(&copy) {
        return Err(LendingError::inconsistent(format!(
            "film {} refused its own copy {}",
            film.title(),
            copy.id()
        )));
    }

    deps.ledger
        .record_new_copy(film, copy.clone())
        .await
        .map_err(LendingError::Gateway)?;

    tracing::info!(film = %copy.film(), copy_id = %copy.id(), "Copy added");
    Ok(copy)
}

/// 会員を登録する
pub async fn add_member(deps: &ServiceDependencies, cmd: AddMember) -> Result<Member> {
    let number = MembershipNumber::new(cmd.membership_number)?;
    let name = MemberName::new(cmd.name)?;

    let _guard = deps.exclusive().await;

    let existing = deps
        .members
        .find_member_by_number(&number)
        .await
        .map_err(LendingError::Gateway)?;
    if existing.is_some() {
        return Err(LendingError::duplicate(EntityKind::Member, &number));
    }

    let member = Member::new(number, name);
    deps.members
        .save_member(member.clone())
        .await
        .map_err(LendingError::Gateway)?;

    tracing::info!(member = %member.number(), "Member added");
    Ok(member)
}

/// 会員名を変更する
pub async fn rename_member(deps: &ServiceDependencies, cmd: RenameMember) -> Result<Member> {
    let number = MembershipNumber::new(cmd.membership_number)?;
    let name = MemberName::new(cmd.name)?;

    let _guard = deps.exclusive().await;

    let mut member = load_member(deps, &number).await?;
    member.rename(name);
    deps.members
        .save_member(member.clone())
        .await
        .map_err(LendingError::Gateway)?;

    tracing::info!(member = %member.number(), "Member renamed");
    Ok(member)
}

/// タイトルで作品を取得する（空白のみのタイトルは`None`）
pub async fn find_film_by_title(deps: &ServiceDependencies, title: &str) -> Result<Option<Film>> {
    let Ok(title) = FilmTitle::new(title) else {
        return Ok(None);
    };

    let _guard = deps.exclusive().await;

    deps.films
        .find_film_by_title(&title)
        .await
        .map_err(LendingError::Gateway)
}

/// IDで複本を取得する（空白のみのIDは`None`）
pub async fn find_copy_by_id(deps: &ServiceDependencies, copy_id: &str) -> Result<Option<FilmCopy>> {
    let Ok(copy_id) = CopyId::new(copy_id) else {
        return Ok(None);
    };

    let _guard = deps.exclusive().await;

    deps.copies
        .find_copy_by_id(&copy_id)
        .await
        .map_err(LendingError::Gateway)
}

/// 会員番号で会員を取得する（空白のみの番号は`None`）
pub async fn find_member_by_number(
    deps: &ServiceDependencies,
    membership_number: &str,
) -> Result<Option<Member>> {
    let Ok(number) = MembershipNumber::new(membership_number) else {
        return Ok(None);
    };

    let _guard = deps.exclusive().await;

    deps.members
        .find_member_by_number(&number)
        .await
        .map_err(LendingError::Gateway)
}

/// すべての作品を取得する
pub async fn list_films(deps: &ServiceDependencies) -> Result<Vec<Film>> {
    let _guard = deps.exclusive().await;

    all_films(deps).await
}

/// すべての会員を取得する
pub async fn list_members(deps: &ServiceDependencies) -> Result<Vec<Member>> {
    let _guard = deps.exclusive().await;

    deps.members
        .list_members()
        .await
        .map_err(LendingError::Gateway)
}

/// タイトルの部分一致（大文字小文字を区別しない）で作品を検索する
///
/// 検索語が空白のみの場合は空の結果を返す（全件ではない）。
pub async fn search_by_title(deps: &ServiceDependencies, term: &str) -> Result<Vec<Film>> {
    let normalized = term.trim().to_lowercase();
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    let _guard = deps.exclusive().await;

    Ok(all_films(deps)
        .await?
        .into_iter()
        .filter(|film| title_matches(film, &normalized))
        .collect())
}

/// 貸出可能な複本数が下限以上の作品を検索する
///
/// 下限が負の場合は`Validation`エラー。
pub async fn search_by_availability(
    deps: &ServiceDependencies,
    min_available: i64,
) -> Result<Vec<Film>> {
    let min = MinAvailable::try_from(min_available)?;

    let _guard = deps.exclusive().await;

    let films = all_films(deps).await?;
    filter_by_availability(deps, films, min).await
}

/// タイトルと在庫数の両方で作品を検索する
///
/// 検索語が空白のみの場合は在庫数のみで検索する。
pub async fn search_combined(
    deps: &ServiceDependencies,
    term: &str,
    min_available: i64,
) -> Result<Vec<Film>> {
    let min = MinAvailable::try_from(min_available)?;
    let normalized = term.trim().to_lowercase();

    let _guard = deps.exclusive().await;

    let mut films = all_films(deps).await?;
    if !normalized.is_empty() {
        films.retain(|film| title_matches(film, &normalized));
    }
    filter_by_availability(deps, films, min).await
}

/// 作品の貸出可能な複本数
pub async fn number_available(deps: &ServiceDependencies, title: &str) -> Result<usize> {
    Ok(film_availability(deps, title).await?.number_available)
}

/// 作品の在庫状況（総数と貸出可能数）
pub async fn film_availability(
    deps: &ServiceDependencies,
    title: &str,
) -> Result<FilmAvailability> {
    let title = FilmTitle::new(title)?;

    let _guard = deps.exclusive().await;

    let film = load_film(deps, &title).await?;
    let number_available = count_available(deps, &film).await?;

    tracing::debug!(title = %title, number_available, "Availability computed");
    Ok(FilmAvailability {
        title,
        total_copies: film.total_copies(),
        number_available,
    })
}

/// 複数の作品の在庫状況をまとめて取得する
///
/// 検索結果の表示に使用する。
pub async fn availability_of(
    deps: &ServiceDependencies,
    films: &[Film],
) -> Result<Vec<FilmAvailability>> {
    let _guard = deps.exclusive().await;

    let index = load_copy_index(deps).await?;

    films
        .iter()
        .map(|film| {
            Ok(FilmAvailability {
                title: film.title().clone(),
                total_copies: film.total_copies(),
                number_available: count_available_in(film, &index)?,
            })
        })
        .collect()
}
