use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::lending::FilmAvailability;
use crate::domain::{FilmCopy, Loan, Member};

/// 作品登録リクエスト（POST /films）
#[derive(Debug, Deserialize)]
pub struct AddFilmRequest {
    pub title: String,
}

/// 複本追加リクエスト（POST /films/:title/copies）
#[derive(Debug, Deserialize)]
pub struct AddCopyRequest {
    pub copy_id: String,
}

/// 会員登録リクエスト（POST /members）
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub membership_number: String,
    pub name: String,
}

/// 会員名変更リクエスト（PUT /members/:number）
#[derive(Debug, Deserialize)]
pub struct RenameMemberRequest {
    pub name: String,
}

/// 貸出リクエスト（POST /loans）
///
/// 貸出日を省略した場合は当日。
#[derive(Debug, Deserialize)]
pub struct BorrowRequest {
    pub copy_id: String,
    pub membership_number: String,
    pub borrow_date: Option<NaiveDate>,
}

/// 返却リクエスト（POST /copies/:id/return）
///
/// 返却日を省略した場合は当日。
#[derive(Debug, Default, Deserialize)]
pub struct ReturnRequest {
    pub return_date: Option<NaiveDate>,
}

/// 作品検索のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct SearchFilmsQuery {
    /// タイトルの部分一致
    pub title: Option<String>,
    /// 貸出可能な複本数の下限
    pub min_available: Option<i64>,
}

/// 延滞一覧のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct OverdueQuery {
    /// 基準日（省略時は当日）
    pub as_of: Option<NaiveDate>,
}

/// 作品レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct FilmResponse {
    pub title: String,
    pub total_copies: usize,
    pub number_available: usize,
}

impl From<FilmAvailability> for FilmResponse {
    fn from(summary: FilmAvailability) -> Self {
        Self {
            title: summary.title.into(),
            total_copies: summary.total_copies,
            number_available: summary.number_available,
        }
    }
}

/// 複本レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct CopyResponse {
    pub copy_id: String,
    pub film_title: String,
    pub on_loan: bool,
    pub borrower: Option<String>,
}

impl From<FilmCopy> for CopyResponse {
    fn from(copy: FilmCopy) -> Self {
        Self {
            copy_id: copy.id().to_string(),
            film_title: copy.film().to_string(),
            on_loan: copy.is_on_loan(),
            borrower: copy.borrower().map(ToString::to_string),
        }
    }
}

/// 会員レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub membership_number: String,
    pub name: String,
    pub open_loans: usize,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            membership_number: member.number().to_string(),
            name: member.name().to_string(),
            open_loans: member.open_loan_count(),
        }
    }
}

/// 貸出レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub copy_id: String,
    pub film_title: String,
    pub membership_number: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    /// "open" または "returned"
    pub status: String,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        let status = if loan.is_returned() { "returned" } else { "open" };
        Self {
            loan_id: loan.id().value(),
            copy_id: loan.copy_id().to_string(),
            film_title: loan.film_title().to_string(),
            membership_number: loan.member().to_string(),
            borrow_date: loan.borrow_date(),
            due_date: loan.due_date(),
            return_date: loan.return_date(),
            status: status.to_string(),
        }
    }
}

/// 延滞貸出レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct OverdueLoanResponse {
    #[serde(flatten)]
    pub loan: LoanResponse,
    /// 基準日時点の延滞日数
    pub days_overdue: i64,
}

impl OverdueLoanResponse {
    pub fn new(loan: Loan, as_of: NaiveDate) -> Self {
        let days_overdue = loan.days_overdue(as_of);
        Self {
            loan: LoanResponse::from(loan),
            days_overdue,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
