use chrono::NaiveDate;
use film_lending::adapters::memory::InMemoryLibraryStore;
use film_lending::application::lending::*;
use film_lending::domain::commands::*;
use film_lending::domain::*;
use async_trait::async_trait;
use film_lending::ports::{
    CopyStore, FilmStore, GatewayError, LendingLedger, LoanStore, MemberStore,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

// ============================================================================
// テスト用ヘルパー
// ============================================================================

fn setup() -> (ServiceDependencies, Arc<InMemoryLibraryStore>) {
    let store = Arc::new(InMemoryLibraryStore::new());
    let deps = ServiceDependencies::from_gateway(store.clone());
    (deps, store)
}

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(n as i64)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn film_with_copies(deps: &ServiceDependencies, title: &str, copy_ids: &[&str]) {
    add_film(
        deps,
        AddFilm {
            title: title.to_string(),
        },
    )
    .await
    .unwrap();

    for id in copy_ids {
        add_copy(
            deps,
            AddCopy {
                film_title: title.to_string(),
                copy_id: id.to_string(),
            },
        )
        .await
        .unwrap();
    }
}

async fn member(deps: &ServiceDependencies, number: &str) {
    add_member(
        deps,
        AddMember {
            membership_number: number.to_string(),
            name: format!("Member {}", number),
        },
    )
    .await
    .unwrap();
}

async fn borrow(
    deps: &ServiceDependencies,
    copy_id: &str,
    number: &str,
    on: NaiveDate,
) -> Result<Loan> {
    borrow_copy(
        deps,
        BorrowCopy {
            copy_id: copy_id.to_string(),
            membership_number: number.to_string(),
            borrow_date: on,
        },
    )
    .await
}

async fn give_back(deps: &ServiceDependencies, copy_id: &str, on: NaiveDate) -> Result<Loan> {
    return_copy(
        deps,
        ReturnCopy {
            copy_id: copy_id.to_string(),
            return_date: on,
        },
    )
    .await
}

/// 複本・会員・貸出記録の相互整合性を検査する
///
/// - 複本が貸出中 ⟺ その複本を参照する未返却の貸出がちょうど1件
/// - 会員の未返却貸出数 == その会員を参照する未返却の貸出の数（上限6）
async fn assert_consistent(store: &InMemoryLibraryStore) {
    let loans = store.list_loans().await.unwrap();
    let open: Vec<&Loan> = loans.iter().filter(|l| !l.is_returned()).collect();

    for copy in store.list_copies().await.unwrap() {
        let open_for_copy = open.iter().filter(|l| l.copy_id() == copy.id()).count();
        if copy.is_on_loan() {
            assert_eq!(open_for_copy, 1, "copy {} on loan", copy.id());
            let loan = open.iter().find(|l| l.copy_id() == copy.id()).unwrap();
            assert_eq!(copy.borrower(), Some(loan.member()));
        } else {
            assert_eq!(open_for_copy, 0, "copy {} available", copy.id());
            assert_eq!(copy.borrower(), None);
        }
    }

    for member in store.list_members().await.unwrap() {
        let open_for_member = open.iter().filter(|l| l.member() == member.number()).count();
        assert_eq!(member.open_loan_count(), open_for_member);
        assert!(member.open_loan_count() <= MAX_LOANS);
    }
}

/// 書き込みの失敗と複本の個別取得回数を制御・観測できるゲートウェイ
///
/// 読み取りは常に内側のストアへ委譲する。`fail_writes` が立っている間、
/// すべての書き込みは内側に触れずにエラーを返す。
struct InstrumentedStore {
    inner: Arc<InMemoryLibraryStore>,
    fail_writes: AtomicBool,
    copy_lookups: AtomicUsize,
}

type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl InstrumentedStore {
    fn new(inner: Arc<InMemoryLibraryStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            copy_lookups: AtomicUsize::new(0),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn copy_lookups(&self) -> usize {
        self.copy_lookups.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> GatewayResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::from("storage unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl FilmStore for InstrumentedStore {
    async fn save_film(&self, film: Film) -> GatewayResult<()> {
        self.check_write()?;
        self.inner.save_film(film).await
    }

    async fn find_film_by_title(&self, title: &FilmTitle) -> GatewayResult<Option<Film>> {
        self.inner.find_film_by_title(title).await
    }

    async fn list_films(&self) -> GatewayResult<Vec<Film>> {
        self.inner.list_films().await
    }
}

#[async_trait]
impl CopyStore for InstrumentedStore {
    async fn save_copy(&self, copy: FilmCopy) -> GatewayResult<()> {
        self.check_write()?;
        self.inner.save_copy(copy).await
    }

    async fn find_copy_by_id(&self, id: &CopyId) -> GatewayResult<Option<FilmCopy>> {
        self.copy_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_copy_by_id(id).await
    }

    async fn list_copies(&self) -> GatewayResult<Vec<FilmCopy>> {
        self.inner.list_copies().await
    }
}

#[async_trait]
impl MemberStore for InstrumentedStore {
    async fn save_member(&self, member: Member) -> GatewayResult<()> {
        self.check_write()?;
        self.inner.save_member(member).await
    }

    async fn find_member_by_number(
        &self,
        number: &MembershipNumber,
    ) -> GatewayResult<Option<Member>> {
        self.inner.find_member_by_number(number).await
    }

    async fn list_members(&self) -> GatewayResult<Vec<Member>> {
        self.inner.list_members().await
    }
}

#[async_trait]
impl LoanStore for InstrumentedStore {
    async fn save_loan(&self, loan: Loan) -> GatewayResult<()> {
        self.check_write()?;
        self.inner.save_loan(loan).await
    }

    async fn mark_loan_updated(&self, loan: Loan) -> GatewayResult<()> {
        self.check_write()?;
        self.inner.mark_loan_updated(loan).await
    }

    async fn find_open_loan_for_copy(&self, copy_id: &CopyId) -> GatewayResult<Option<Loan>> {
        self.inner.find_open_loan_for_copy(copy_id).await
    }

    async fn list_loans(&self) -> GatewayResult<Vec<Loan>> {
        self.inner.list_loans().await
    }
}

#[async_trait]
impl LendingLedger for InstrumentedStore {
    async fn record_new_copy(&self, film: Film, copy: FilmCopy) -> GatewayResult<()> {
        self.check_write()?;
        self.inner.record_new_copy(film, copy).await
    }

    async fn record_borrow(
        &self,
        loan: Loan,
        copy: FilmCopy,
        member: Member,
    ) -> GatewayResult<()> {
        self.check_write()?;
        self.inner.record_borrow(loan, copy, member).await
    }

    async fn record_return(
        &self,
        loan: Loan,
        copy: FilmCopy,
        member: Member,
    ) -> GatewayResult<()> {
        self.check_write()?;
        self.inner.record_return(loan, copy, member).await
    }
}

fn setup_instrumented() -> (ServiceDependencies, Arc<InstrumentedStore>, Arc<InMemoryLibraryStore>) {
    let inner = Arc::new(InMemoryLibraryStore::new());
    let failing = Arc::new(InstrumentedStore::new(inner.clone()));
    let deps = ServiceDependencies::from_gateway(failing.clone());
    (deps, failing, inner)
}

// ============================================================================
// 登録・重複
// ============================================================================

#[tokio::test]
async fn test_add_film_twice_keeps_single_film() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "X", &[]).await;

    let result = add_film(
        &deps,
        AddFilm {
            title: "X".to_string(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LendingError::DuplicateKey {
            kind: EntityKind::Film,
            ..
        })
    ));
    let films = list_films(&deps).await.unwrap();
    assert_eq!(films.len(), 1);
    assert_eq!(films[0].title().as_str(), "X");
}

#[tokio::test]
async fn test_film_titles_are_case_sensitive() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "Alien", &[]).await;
    film_with_copies(&deps, "alien", &[]).await;

    assert_eq!(list_films(&deps).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_copy_ids_are_unique_across_films() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    film_with_copies(&deps, "Heat", &[]).await;

    let result = add_copy(
        &deps,
        AddCopy {
            film_title: "Heat".to_string(),
            copy_id: "D1".to_string(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LendingError::DuplicateKey {
            kind: EntityKind::Copy,
            ..
        })
    ));
    let heat = find_film_by_title(&deps, "Heat").await.unwrap().unwrap();
    assert_eq!(heat.total_copies(), 0);
}

#[tokio::test]
async fn test_add_copy_to_unknown_film_is_not_found() {
    let (deps, store) = setup();

    let result = add_copy(
        &deps,
        AddCopy {
            film_title: "Ghost".to_string(),
            copy_id: "G1".to_string(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LendingError::NotFound {
            kind: EntityKind::Film,
            ..
        })
    ));
    assert!(store.list_copies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_member_is_rejected() {
    let (deps, _store) = setup();
    member(&deps, "M1").await;

    let result = add_member(
        &deps,
        AddMember {
            membership_number: "M1".to_string(),
            name: "Someone Else".to_string(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LendingError::DuplicateKey {
            kind: EntityKind::Member,
            ..
        })
    ));
    let m1 = find_member_by_number(&deps, "M1").await.unwrap().unwrap();
    assert_eq!(m1.name().as_str(), "Member M1");
}

// ============================================================================
// 入力値の検証
// ============================================================================

#[tokio::test]
async fn test_blank_inputs_are_rejected_without_mutation() {
    let (deps, store) = setup();

    let film = add_film(
        &deps,
        AddFilm {
            title: "   ".to_string(),
        },
    )
    .await;
    assert!(matches!(film, Err(LendingError::Validation(_))));

    let member = add_member(
        &deps,
        AddMember {
            membership_number: "M1".to_string(),
            name: "\t".to_string(),
        },
    )
    .await;
    assert!(matches!(member, Err(LendingError::Validation(_))));

    let loan = borrow(&deps, "", "M1", day(0)).await;
    assert!(matches!(loan, Err(LendingError::Validation(_))));

    assert!(store.list_films().await.unwrap().is_empty());
    assert!(store.list_members().await.unwrap().is_empty());
    assert!(store.list_loans().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_film_titles_are_exact_match() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "X", &[]).await;
    film_with_copies(&deps, "X ", &[" H1 "]).await;

    assert_eq!(list_films(&deps).await.unwrap().len(), 2);

    let padded = find_film_by_title(&deps, "X ").await.unwrap().unwrap();
    assert_eq!(padded.title().as_str(), "X ");
    assert_eq!(padded.copy_ids()[0].as_str(), " H1 ");

    let plain = find_film_by_title(&deps, "X").await.unwrap().unwrap();
    assert_eq!(plain.total_copies(), 0);
    assert!(find_copy_by_id(&deps, "H1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_negative_threshold_is_validation_error() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;

    let by_availability = search_by_availability(&deps, -1).await;
    assert!(matches!(
        by_availability,
        Err(LendingError::Validation(ValidationError::NegativeThreshold(-1)))
    ));

    let combined = search_combined(&deps, "", -3).await;
    assert!(matches!(combined, Err(LendingError::Validation(_))));
}

// ============================================================================
// 検索
// ============================================================================

#[tokio::test]
async fn test_search_by_title_is_case_insensitive_substring() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "The Matrix", &[]).await;
    film_with_copies(&deps, "Inception", &[]).await;

    let found = search_by_title(&deps, "mat").await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title().as_str(), "The Matrix");
}

#[tokio::test]
async fn test_blank_search_term_yields_nothing() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "The Matrix", &[]).await;

    assert!(search_by_title(&deps, "  ").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_by_availability_and_combined() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "The Matrix", &["X1", "X2"]).await;
    film_with_copies(&deps, "The Matrix Reloaded", &["R1"]).await;
    film_with_copies(&deps, "Inception", &["D1", "D2", "D3"]).await;
    member(&deps, "M1").await;
    borrow(&deps, "X1", "M1", day(0)).await.unwrap();

    let titles = |films: Vec<Film>| -> Vec<String> {
        films.iter().map(|f| f.title().to_string()).collect()
    };

    assert_eq!(
        titles(search_by_availability(&deps, 2).await.unwrap()),
        vec!["Inception"]
    );
    assert_eq!(search_by_availability(&deps, 0).await.unwrap().len(), 3);
    assert_eq!(
        titles(search_combined(&deps, "matrix", 1).await.unwrap()),
        vec!["The Matrix", "The Matrix Reloaded"]
    );
    assert_eq!(
        titles(search_combined(&deps, "matrix", 2).await.unwrap()),
        Vec::<String>::new()
    );
    // 空白の検索語は在庫数のみの検索になる
    assert_eq!(
        titles(search_combined(&deps, " ", 3).await.unwrap()),
        vec!["Inception"]
    );
}

#[tokio::test]
async fn test_find_by_key_reports_absence_as_none() {
    let (deps, _store) = setup();

    assert!(find_film_by_title(&deps, "Nope").await.unwrap().is_none());
    assert!(find_copy_by_id(&deps, "Nope").await.unwrap().is_none());
    assert!(find_member_by_number(&deps, "Nope").await.unwrap().is_none());
    assert!(find_member_by_number(&deps, "").await.unwrap().is_none());
}

#[tokio::test]
async fn test_number_available_of_unknown_film_is_not_found() {
    let (deps, _store) = setup();

    let result = number_available(&deps, "Nope").await;
    assert!(matches!(result, Err(LendingError::NotFound { .. })));
}

// ============================================================================
// 貸出・返却
// ============================================================================

#[tokio::test]
async fn test_end_to_end_borrow_and_return() {
    let (deps, store) = setup();
    film_with_copies(&deps, "Inception", &["D1", "D2"]).await;
    member(&deps, "M1").await;

    // 0日目に貸出 → 3日目が期限
    let loan = borrow(&deps, "D1", "M1", day(0)).await.unwrap();
    assert_eq!(loan.due_date(), day(3));
    assert_eq!(number_available(&deps, "Inception").await.unwrap(), 1);
    assert_consistent(&store).await;

    // 2日目に返却
    let closed = give_back(&deps, "D1", day(2)).await.unwrap();
    assert_eq!(closed.return_date(), Some(day(2)));
    assert_eq!(number_available(&deps, "Inception").await.unwrap(), 2);

    let m1 = find_member_by_number(&deps, "M1").await.unwrap().unwrap();
    assert_eq!(m1.open_loan_count(), 0);

    let history = list_loans(&deps).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].borrow_date(), day(0));
    assert_eq!(history[0].return_date(), Some(day(2)));
    assert!(list_active_loans(&deps).await.unwrap().is_empty());
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_due_date_crosses_month_and_year_boundaries() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "Inception", &["D1", "D2", "D3"]).await;
    member(&deps, "M1").await;

    let feb = borrow(&deps, "D1", "M1", date(2024, 2, 28)).await.unwrap();
    assert_eq!(feb.due_date(), date(2024, 3, 2));

    let dec = borrow(&deps, "D2", "M1", date(2023, 12, 30)).await.unwrap();
    assert_eq!(dec.due_date(), date(2024, 1, 2));

    let non_leap = borrow(&deps, "D3", "M1", date(2023, 2, 27)).await.unwrap();
    assert_eq!(non_leap.due_date(), date(2023, 3, 2));
}

#[tokio::test]
async fn test_borrowing_copy_on_loan_fails() {
    let (deps, store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;
    member(&deps, "M2").await;
    borrow(&deps, "D1", "M1", day(0)).await.unwrap();

    let result = borrow(&deps, "D1", "M2", day(1)).await;

    assert!(matches!(result, Err(LendingError::AlreadyOnLoan(_))));
    let m2 = find_member_by_number(&deps, "M2").await.unwrap().unwrap();
    assert_eq!(m2.open_loan_count(), 0);
    assert_eq!(store.list_loans().await.unwrap().len(), 1);
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_seventh_loan_exceeds_limit_without_mutation() {
    let (deps, store) = setup();
    let ids = ["C1", "C2", "C3", "C4", "C5", "C6", "C7"];
    film_with_copies(&deps, "Inception", &ids).await;
    member(&deps, "M1").await;

    for id in &ids[..6] {
        borrow(&deps, id, "M1", day(0)).await.unwrap();
    }

    let result = borrow(&deps, "C7", "M1", day(0)).await;

    assert!(matches!(
        result,
        Err(LendingError::LoanLimitExceeded { limit: 6, .. })
    ));
    let c7 = find_copy_by_id(&deps, "C7").await.unwrap().unwrap();
    assert!(!c7.is_on_loan());
    assert_eq!(list_active_loans(&deps).await.unwrap().len(), 6);
    assert_consistent(&store).await;

    // 1枚返却すれば再び借りられる
    give_back(&deps, "C3", day(1)).await.unwrap();
    borrow(&deps, "C7", "M1", day(1)).await.unwrap();
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_already_on_loan_is_checked_before_limit() {
    let (deps, _store) = setup();
    let ids = ["C1", "C2", "C3", "C4", "C5", "C6"];
    film_with_copies(&deps, "Inception", &ids).await;
    member(&deps, "M1").await;
    for id in &ids {
        borrow(&deps, id, "M1", day(0)).await.unwrap();
    }

    let result = borrow(&deps, "C1", "M1", day(0)).await;
    assert!(matches!(result, Err(LendingError::AlreadyOnLoan(_))));
}

#[tokio::test]
async fn test_borrow_with_unknown_copy_or_member_is_not_found() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;

    let unknown_copy = borrow(&deps, "ZZ", "M1", day(0)).await;
    assert!(matches!(
        unknown_copy,
        Err(LendingError::NotFound {
            kind: EntityKind::Copy,
            ..
        })
    ));

    let unknown_member = borrow(&deps, "D1", "M9", day(0)).await;
    assert!(matches!(
        unknown_member,
        Err(LendingError::NotFound {
            kind: EntityKind::Member,
            ..
        })
    ));
    assert!(list_loans(&deps).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_return_of_available_copy_fails_without_mutation() {
    let (deps, store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;
    borrow(&deps, "D1", "M1", day(0)).await.unwrap();
    give_back(&deps, "D1", day(1)).await.unwrap();

    let result = give_back(&deps, "D1", day(2)).await;

    assert!(matches!(result, Err(LendingError::NotOnLoan(_))));
    let history = list_loans(&deps).await.unwrap();
    assert_eq!(history[0].return_date(), Some(day(1)));
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_copy_on_loan_without_open_loan_is_inconsistent() {
    let (deps, store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;

    // 貸出記録を作らずに複本だけを貸出中にする
    let broken = FilmCopy::restore(
        CopyId::new("D1").unwrap(),
        FilmTitle::new("Inception").unwrap(),
        Some(MembershipNumber::new("M1").unwrap()),
    );
    store.save_copy(broken).await.unwrap();

    let result = give_back(&deps, "D1", day(1)).await;

    assert!(matches!(result, Err(LendingError::InconsistentState(_))));
    let d1 = find_copy_by_id(&deps, "D1").await.unwrap().unwrap();
    assert!(d1.is_on_loan());
}

#[tokio::test]
async fn test_overdue_copy_can_still_be_returned() {
    let (deps, store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;
    borrow(&deps, "D1", "M1", day(0)).await.unwrap();

    let closed = give_back(&deps, "D1", day(10)).await.unwrap();

    assert_eq!(closed.return_date(), Some(day(10)));
    assert!(!closed.is_overdue(day(11)));
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_same_copy_can_be_borrowed_again_after_return() {
    let (deps, store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;
    member(&deps, "M2").await;

    borrow(&deps, "D1", "M1", day(0)).await.unwrap();
    give_back(&deps, "D1", day(1)).await.unwrap();
    let second = borrow(&deps, "D1", "M2", day(1)).await.unwrap();

    assert_eq!(second.member().as_str(), "M2");
    assert_eq!(list_loans(&deps).await.unwrap().len(), 2);
    assert_eq!(list_active_loans(&deps).await.unwrap().len(), 1);
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_list_loans_for_member_returns_only_open_loans() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "Inception", &["D1", "D2", "D3"]).await;
    member(&deps, "M1").await;
    member(&deps, "M2").await;

    borrow(&deps, "D1", "M1", day(0)).await.unwrap();
    borrow(&deps, "D2", "M1", day(1)).await.unwrap();
    borrow(&deps, "D3", "M2", day(1)).await.unwrap();
    give_back(&deps, "D1", day(2)).await.unwrap();

    let loans = list_loans_for_member(&deps, "M1").await.unwrap();

    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].copy_id().as_str(), "D2");
    assert!(matches!(
        list_loans_for_member(&deps, "M9").await,
        Err(LendingError::NotFound { .. })
    ));
}

// ============================================================================
// 会員名変更・延滞
// ============================================================================

#[tokio::test]
async fn test_rename_member_keeps_open_loans() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;
    borrow(&deps, "D1", "M1", day(0)).await.unwrap();

    let renamed = rename_member(
        &deps,
        RenameMember {
            membership_number: "M1".to_string(),
            name: "Ada".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(renamed.name().as_str(), "Ada");
    assert_eq!(renamed.open_loan_count(), 1);

    let missing = rename_member(
        &deps,
        RenameMember {
            membership_number: "M9".to_string(),
            name: "Nobody".to_string(),
        },
    )
    .await;
    assert!(matches!(missing, Err(LendingError::NotFound { .. })));
}

#[tokio::test]
async fn test_find_overdue_loans() {
    let (deps, _store) = setup();
    film_with_copies(&deps, "Inception", &["D1", "D2", "D3"]).await;
    member(&deps, "M1").await;

    borrow(&deps, "D1", "M1", day(2)).await.unwrap(); // 期限は5日目
    borrow(&deps, "D2", "M1", day(0)).await.unwrap(); // 期限は3日目
    borrow(&deps, "D3", "M1", day(0)).await.unwrap();
    give_back(&deps, "D3", day(1)).await.unwrap();

    // 期限当日は延滞ではない
    assert!(find_overdue_loans(&deps, day(3)).await.unwrap().is_empty());

    let overdue = find_overdue_loans(&deps, day(6)).await.unwrap();
    let copies: Vec<&str> = overdue.iter().map(|l| l.copy_id().as_str()).collect();
    assert_eq!(copies, vec!["D2", "D1"]);
}

// ============================================================================
// 並行実行
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_of_one_copy_admit_exactly_one() {
    let (deps, store) = setup();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    let numbers: Vec<String> = (1..=8).map(|n| format!("M{}", n)).collect();
    for number in &numbers {
        member(&deps, number).await;
    }

    let handles: Vec<_> = numbers
        .into_iter()
        .map(|number| {
            let deps = deps.clone();
            tokio::spawn(async move { borrow(&deps, "D1", &number, day(0)).await })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let succeeded = results
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(|result| result.is_ok())
        .count();

    assert_eq!(succeeded, 1);
    assert_eq!(list_active_loans(&deps).await.unwrap().len(), 1);
    assert_consistent(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_by_one_member_respect_limit() {
    let (deps, store) = setup();
    let ids: Vec<String> = (1..=10).map(|n| format!("C{}", n)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    film_with_copies(&deps, "Inception", &id_refs).await;
    member(&deps, "M1").await;

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let deps = deps.clone();
            tokio::spawn(async move { borrow(&deps, &id, "M1", day(0)).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), MAX_LOANS);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LendingError::LoanLimitExceeded { .. }))
    );
    assert_consistent(&store).await;
}

// ============================================================================
// 書き込み失敗時の整合性
// ============================================================================

#[tokio::test]
async fn test_failed_borrow_write_leaves_no_partial_state() {
    let (deps, failing, store) = setup_instrumented();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;

    failing.set_failing(true);
    let result = borrow(&deps, "D1", "M1", day(0)).await;

    assert!(matches!(result, Err(LendingError::Gateway(_))));
    assert_consistent(&store).await;
    assert!(store.list_loans().await.unwrap().is_empty());
    let d1 = find_copy_by_id(&deps, "D1").await.unwrap().unwrap();
    assert!(!d1.is_on_loan());
    let m1 = find_member_by_number(&deps, "M1").await.unwrap().unwrap();
    assert_eq!(m1.open_loan_count(), 0);

    // 保存先が復旧すれば同じ貸出をやり直せる
    failing.set_failing(false);
    borrow(&deps, "D1", "M1", day(0)).await.unwrap();
    assert_eq!(list_active_loans(&deps).await.unwrap().len(), 1);
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_failed_return_write_leaves_loan_open() {
    let (deps, failing, store) = setup_instrumented();
    film_with_copies(&deps, "Inception", &["D1"]).await;
    member(&deps, "M1").await;
    borrow(&deps, "D1", "M1", day(0)).await.unwrap();

    failing.set_failing(true);
    let result = give_back(&deps, "D1", day(1)).await;

    assert!(matches!(result, Err(LendingError::Gateway(_))));
    assert_consistent(&store).await;
    let d1 = find_copy_by_id(&deps, "D1").await.unwrap().unwrap();
    assert!(d1.is_on_loan());
    let active = list_active_loans(&deps).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].return_date(), None);

    failing.set_failing(false);
    let closed = give_back(&deps, "D1", day(1)).await.unwrap();
    assert_eq!(closed.return_date(), Some(day(1)));
    assert!(list_active_loans(&deps).await.unwrap().is_empty());
    assert_consistent(&store).await;
}

#[tokio::test]
async fn test_failed_add_copy_write_leaves_film_unchanged() {
    let (deps, failing, store) = setup_instrumented();
    film_with_copies(&deps, "Inception", &[]).await;

    failing.set_failing(true);
    let result = add_copy(
        &deps,
        AddCopy {
            film_title: "Inception".to_string(),
            copy_id: "D1".to_string(),
        },
    )
    .await;

    assert!(matches!(result, Err(LendingError::Gateway(_))));
    assert!(find_copy_by_id(&deps, "D1").await.unwrap().is_none());
    let film = find_film_by_title(&deps, "Inception").await.unwrap().unwrap();
    assert_eq!(film.total_copies(), 0);
    assert_consistent(&store).await;

    failing.set_failing(false);
    add_copy(
        &deps,
        AddCopy {
            film_title: "Inception".to_string(),
            copy_id: "D1".to_string(),
        },
    )
    .await
    .unwrap();
    let film = find_film_by_title(&deps, "Inception").await.unwrap().unwrap();
    assert_eq!(film.total_copies(), 1);
    assert_eq!(number_available(&deps, "Inception").await.unwrap(), 1);
}

// ============================================================================
// 在庫集計の読み取り回数
// ============================================================================

#[tokio::test]
async fn test_availability_search_reads_copies_in_one_pass() {
    let (deps, gateway, _store) = setup_instrumented();
    film_with_copies(&deps, "Inception", &["D1", "D2"]).await;
    film_with_copies(&deps, "The Matrix", &["M1", "M2", "M3"]).await;
    film_with_copies(&deps, "Heat", &[]).await;
    member(&deps, "A1").await;
    borrow(&deps, "M1", "A1", day(0)).await.unwrap();

    let before = gateway.copy_lookups();
    let films = search_by_availability(&deps, 2).await.unwrap();
    let summaries = availability_of(&deps, &films).await.unwrap();

    assert_eq!(gateway.copy_lookups(), before);
    let counts: Vec<(String, usize)> = summaries
        .iter()
        .map(|s| (s.title.to_string(), s.number_available))
        .collect();
    assert_eq!(
        counts,
        vec![("Inception".to_string(), 2), ("The Matrix".to_string(), 2)]
    );
}
