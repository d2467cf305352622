use crate::application::lending::{self, EntityKind, LendingError, ServiceDependencies};
use crate::domain::commands::{AddCopy, AddFilm, AddMember, BorrowCopy, RenameMember, ReturnCopy};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use super::{
    error::ApiError,
    types::{
        AddCopyRequest, AddFilmRequest, AddMemberRequest, BorrowRequest, CopyResponse,
        FilmResponse, LoanResponse, MemberResponse, OverdueLoanResponse, OverdueQuery,
        RenameMemberRequest, ReturnRequest, SearchFilmsQuery,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn not_found(kind: EntityKind, key: String) -> ApiError {
    ApiError::from(LendingError::NotFound { kind, key })
}

// ============================================================================
// Films
// ============================================================================

/// POST /films - 作品を登録
pub async fn add_film(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddFilmRequest>,
) -> Result<(StatusCode, Json<FilmResponse>), ApiError> {
    let film = lending::add_film(&state.service_deps, AddFilm { title: req.title }).await?;
    let summary = lending::film_availability(&state.service_deps, film.title().as_str()).await?;

    Ok((StatusCode::CREATED, Json(FilmResponse::from(summary))))
}

/// GET /films - 作品の一覧・検索
///
/// クエリパラメータ:
/// - title: タイトルの部分一致（大文字小文字を区別しない）
/// - min_available: 貸出可能な複本数の下限
///
/// どちらも指定されない場合は全作品を返す。
pub async fn search_films(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchFilmsQuery>,
) -> Result<Json<Vec<FilmResponse>>, ApiError> {
    let deps = &state.service_deps;
    let films = match (query.title.as_deref(), query.min_available) {
        (None, None) => lending::list_films(deps).await?,
        (Some(term), None) => lending::search_by_title(deps, term).await?,
        (None, Some(min)) => lending::search_by_availability(deps, min).await?,
        (Some(term), Some(min)) => lending::search_combined(deps, term, min).await?,
    };

    let summaries = lending::availability_of(deps, &films).await?;
    Ok(Json(summaries.into_iter().map(FilmResponse::from).collect()))
}

/// GET /films/:title - 作品の在庫状況
pub async fn get_film(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<Json<FilmResponse>, ApiError> {
    let summary = lending::film_availability(&state.service_deps, &title).await?;
    Ok(Json(FilmResponse::from(summary)))
}

/// POST /films/:title/copies - 作品に複本を追加
pub async fn add_copy(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
    Json(req): Json<AddCopyRequest>,
) -> Result<(StatusCode, Json<CopyResponse>), ApiError> {
    let cmd = AddCopy {
        film_title: title,
        copy_id: req.copy_id,
    };
    let copy = lending::add_copy(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(CopyResponse::from(copy))))
}

/// GET /copies/:id - 複本の状態
pub async fn get_copy(
    State(state): State<Arc<AppState>>,
    Path(copy_id): Path<String>,
) -> Result<Json<CopyResponse>, ApiError> {
    let copy = lending::find_copy_by_id(&state.service_deps, &copy_id)
        .await?
        .ok_or_else(|| not_found(EntityKind::Copy, copy_id))?;

    Ok(Json(CopyResponse::from(copy)))
}

// ============================================================================
// Members
// ============================================================================

/// POST /members - 会員を登録
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    let cmd = AddMember {
        membership_number: req.membership_number,
        name: req.name,
    };
    let member = lending::add_member(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(MemberResponse::from(member))))
}

/// GET /members - 会員一覧
pub async fn list_members(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    let members = lending::list_members(&state.service_deps).await?;
    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// GET /members/:number - 会員詳細
pub async fn get_member(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<MemberResponse>, ApiError> {
    let member = lending::find_member_by_number(&state.service_deps, &number)
        .await?
        .ok_or_else(|| not_found(EntityKind::Member, number))?;

    Ok(Json(MemberResponse::from(member)))
}

/// PUT /members/:number - 会員名を変更
pub async fn rename_member(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
    Json(req): Json<RenameMemberRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    let cmd = RenameMember {
        membership_number: number,
        name: req.name,
    };
    let member = lending::rename_member(&state.service_deps, cmd).await?;

    Ok(Json(MemberResponse::from(member)))
}

/// GET /members/:number/loans - 会員の未返却の貸出
pub async fn member_loans(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let loans = lending::list_loans_for_member(&state.service_deps, &number).await?;
    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

// ============================================================================
// Loans
// ============================================================================

/// POST /loans - 複本を貸し出す
///
/// 強制されるビジネスルール:
/// - 複本が貸出中でないこと
/// - 会員の貸出数が上限（6枚）を超えないこと
pub async fn borrow_copy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BorrowRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let cmd = BorrowCopy {
        copy_id: req.copy_id,
        membership_number: req.membership_number,
        borrow_date: req.borrow_date.unwrap_or_else(today),
    };
    let loan = lending::borrow_copy(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(LoanResponse::from(loan))))
}

/// POST /copies/:id/return - 複本を返却する
///
/// 延滞中の複本も返却可能（延滞料金なし）。
pub async fn return_copy(
    State(state): State<Arc<AppState>>,
    Path(copy_id): Path<String>,
    Json(req): Json<ReturnRequest>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = ReturnCopy {
        copy_id,
        return_date: req.return_date.unwrap_or_else(today),
    };
    let loan = lending::return_copy(&state.service_deps, cmd).await?;

    Ok(Json(LoanResponse::from(loan)))
}

/// GET /loans - 返却済みを含む全貸出履歴
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let loans = lending::list_loans(&state.service_deps).await?;
    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

/// GET /loans/active - 未返却の貸出
pub async fn list_active_loans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let loans = lending::list_active_loans(&state.service_deps).await?;
    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}

/// GET /loans/overdue - 延滞中の貸出
///
/// 各貸出に基準日時点の延滞日数を付けて返す。
pub async fn list_overdue_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OverdueQuery>,
) -> Result<Json<Vec<OverdueLoanResponse>>, ApiError> {
    let as_of = query.as_of.unwrap_or_else(today);
    let loans = lending::find_overdue_loans(&state.service_deps, as_of).await?;
    Ok(Json(
        loans
            .into_iter()
            .map(|loan| OverdueLoanResponse::new(loan, as_of))
            .collect(),
    ))
}
