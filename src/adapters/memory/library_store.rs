use crate::domain::{CopyId, Film, FilmCopy, FilmTitle, Loan, Member, MembershipNumber};
use crate::ports::{
    CopyStore, FilmStore, GatewayError, LendingLedger, LoanStore, MemberStore, Result,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// ゲートウェイのインメモリ実装
///
/// 保存時に値を複製して保持し、取得時も複製を返す。
/// 共有参照による暗黙の更新はないため、変更は保存の呼び出しでのみ反映される。
/// 作品・複本・会員はキー順、貸出記録は保存順に返す。
///
/// 一括書き込みは関係するロックをすべて取得し、検査を終えてから反映する。
/// ロックは常に 作品 → 複本 → 会員 → 貸出 の順に取得する。
#[derive(Default)]
pub struct LibraryStore {
    films: Mutex<BTreeMap<FilmTitle, Film>>,
    copies: Mutex<BTreeMap<CopyId, FilmCopy>>,
    members: Mutex<BTreeMap<MembershipNumber, Member>>,
    loans: Mutex<Vec<Loan>>,
}

impl LibraryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// ロックを取得する（ポイズニングはゲートウェイのエラーとして返す）
fn lock<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| GatewayError::from(format!("in-memory {} store is poisoned", name)))
}

#[async_trait]
impl FilmStore for LibraryStore {
    async fn save_film(&self, film: Film) -> Result<()> {
        lock(&self.films, "film")?.insert(film.title().clone(), film);
        Ok(())
    }

    async fn find_film_by_title(&self, title: &FilmTitle) -> Result<Option<Film>> {
        Ok(lock(&self.films, "film")?.get(title).cloned())
    }

    async fn list_films(&self) -> Result<Vec<Film>> {
        Ok(lock(&self.films, "film")?.values().cloned().collect())
    }
}

#[async_trait]
impl CopyStore for LibraryStore {
    async fn save_copy(&self, copy: FilmCopy) -> Result<()> {
        lock(&self.copies, "copy")?.insert(copy.id().clone(), copy);
        Ok(())
    }

    async fn find_copy_by_id(&self, id: &CopyId) -> Result<Option<FilmCopy>> {
        Ok(lock(&self.copies, "copy")?.get(id).cloned())
    }

    async fn list_copies(&self) -> Result<Vec<FilmCopy>> {
        Ok(lock(&self.copies, "copy")?.values().cloned().collect())
    }
}

#[async_trait]
impl MemberStore for LibraryStore {
    async fn save_member(&self, member: Member) -> Result<()> {
        lock(&self.members, "member")?.insert(member.number().clone(), member);
        Ok(())
    }

    async fn find_member_by_number(&self, number: &MembershipNumber) -> Result<Option<Member>> {
        Ok(lock(&self.members, "member")?.get(number).cloned())
    }

    async fn list_members(&self) -> Result<Vec<Member>> {
        Ok(lock(&self.members, "member")?.values().cloned().collect())
    }
}

#[async_trait]
impl LoanStore for LibraryStore {
    async fn save_loan(&self, loan: Loan) -> Result<()> {
        let mut loans = lock(&self.loans, "loan")?;
        if loans.iter().any(|l| l.id() == loan.id()) {
            return Err(format!("loan {} is already saved", loan.id()).into());
        }
        loans.push(loan);
        Ok(())
    }

    async fn mark_loan_updated(&self, loan: Loan) -> Result<()> {
        let mut loans = lock(&self.loans, "loan")?;
        let slot = loans
            .iter_mut()
            .find(|l| l.id() == loan.id())
            .ok_or_else(|| GatewayError::from(format!("loan {} was never saved", loan.id())))?;
        *slot = loan;
        Ok(())
    }

    async fn find_open_loan_for_copy(&self, copy_id: &CopyId) -> Result<Option<Loan>> {
        Ok(lock(&self.loans, "loan")?
            .iter()
            .find(|l| l.copy_id() == copy_id && !l.is_returned())
            .cloned())
    }

    async fn list_loans(&self) -> Result<Vec<Loan>> {
        Ok(lock(&self.loans, "loan")?.clone())
    }
}

#[async_trait]
impl LendingLedger for LibraryStore {
    async fn record_new_copy(&self, film: Film, copy: FilmCopy) -> Result<()> {
        let mut films = lock(&self.films, "film")?;
        let mut copies = lock(&self.copies, "copy")?;

        if copies.contains_key(copy.id()) {
            return Err(format!("copy {} is already saved", copy.id()).into());
        }

        copies.insert(copy.id().clone(), copy);
        films.insert(film.title().clone(), film);
        Ok(())
    }

    async fn record_borrow(&self, loan: Loan, copy: FilmCopy, member: Member) -> Result<()> {
        let mut copies = lock(&self.copies, "copy")?;
        let mut members = lock(&self.members, "member")?;
        let mut loans = lock(&self.loans, "loan")?;

        if loans.iter().any(|l| l.id() == loan.id()) {
            return Err(format!("loan {} is already saved", loan.id()).into());
        }

        loans.push(loan);
        copies.insert(copy.id().clone(), copy);
        members.insert(member.number().clone(), member);
        Ok(())
    }

    async fn record_return(&self, loan: Loan, copy: FilmCopy, member: Member) -> Result<()> {
        let mut copies = lock(&self.copies, "copy")?;
        let mut members = lock(&self.members, "member")?;
        let mut loans = lock(&self.loans, "loan")?;

        let slot = loans
            .iter_mut()
            .find(|l| l.id() == loan.id())
            .ok_or_else(|| GatewayError::from(format!("loan {} was never saved", loan.id())))?;

        *slot = loan;
        copies.insert(copy.id().clone(), copy);
        members.insert(member.number().clone(), member);
        Ok(())
    }
}
