use crate::domain::{
    CopyId, Film, FilmCopy, FilmTitle, Loan, LoanId, Member, MemberName, MembershipNumber,
};
use crate::ports::{
    CopyStore, FilmStore, GatewayError, LendingLedger, LoanStore, MemberStore, Result,
};
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};
use std::collections::HashMap;

/// PostgreSQLの行データを貸出記録に変換する
///
/// 自然キーの検証に失敗した行はゲートウェイのエラーとして返す。
fn map_row_to_loan(row: &PgRow) -> Result<Loan> {
    Ok(Loan::restore(
        LoanId::from_uuid(row.try_get("loan_id")?),
        CopyId::new(row.try_get::<String, _>("copy_id")?)?,
        FilmTitle::new(row.try_get::<String, _>("film_title")?)?,
        MembershipNumber::new(row.try_get::<String, _>("membership_number")?)?,
        row.try_get("borrow_date")?,
        row.try_get("due_date")?,
        row.try_get("return_date")?,
    ))
}

fn map_row_to_copy(row: &PgRow) -> Result<FilmCopy> {
    let borrower = row
        .try_get::<Option<String>, _>("borrower")?
        .map(MembershipNumber::new)
        .transpose()?;

    Ok(FilmCopy::restore(
        CopyId::new(row.try_get::<String, _>("copy_id")?)?,
        FilmTitle::new(row.try_get::<String, _>("film_title")?)?,
        borrower,
    ))
}

const LOAN_COLUMNS: &str = r#"
    loan_id,
    copy_id,
    film_title,
    membership_number,
    borrow_date,
    due_date,
    return_date
"#;

/// 作品を書き込む（既存の場合は何もしない）
async fn insert_film<'e>(executor: impl PgExecutor<'e>, film: &Film) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO films (title)
        VALUES ($1)
        ON CONFLICT (title) DO NOTHING
        "#,
    )
    .bind(film.title().as_str())
    .execute(executor)
    .await?;

    Ok(())
}

/// 複本を書き込む（upsert）
///
/// 所属作品は変更されないため、既存の場合は借り手のみ更新する。
async fn upsert_copy<'e>(executor: impl PgExecutor<'e>, copy: &FilmCopy) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO copies (copy_id, film_title, borrower)
        VALUES ($1, $2, $3)
        ON CONFLICT (copy_id)
        DO UPDATE SET borrower = EXCLUDED.borrower
        "#,
    )
    .bind(copy.id().as_str())
    .bind(copy.film().as_str())
    .bind(copy.borrower().map(|m| m.as_str()))
    .execute(executor)
    .await?;

    Ok(())
}

/// 会員を書き込む（upsert）
async fn upsert_member<'e>(executor: impl PgExecutor<'e>, member: &Member) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO members (membership_number, name)
        VALUES ($1, $2)
        ON CONFLICT (membership_number)
        DO UPDATE SET name = EXCLUDED.name
        "#,
    )
    .bind(member.number().as_str())
    .bind(member.name().as_str())
    .execute(executor)
    .await?;

    Ok(())
}

async fn insert_loan<'e>(executor: impl PgExecutor<'e>, loan: &Loan) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO loans (
            loan_id,
            copy_id,
            film_title,
            membership_number,
            borrow_date,
            due_date,
            return_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(loan.id().value())
    .bind(loan.copy_id().as_str())
    .bind(loan.film_title().as_str())
    .bind(loan.member().as_str())
    .bind(loan.borrow_date())
    .bind(loan.due_date())
    .bind(loan.return_date())
    .execute(executor)
    .await?;

    Ok(())
}

/// 返却日を書き戻す（保存されていない貸出記録の場合はエラー）
async fn update_loan<'e>(executor: impl PgExecutor<'e>, loan: &Loan) -> Result<()> {
    let result = sqlx::query("UPDATE loans SET return_date = $2 WHERE loan_id = $1")
        .bind(loan.id().value())
        .bind(loan.return_date())
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(GatewayError::from(format!(
            "loan {} was never saved",
            loan.id()
        )));
    }
    Ok(())
}

/// ゲートウェイのPostgreSQL実装
///
/// 作品の複本一覧は`copies`テーブル（登録順）から、
/// 会員の未返却貸出一覧は`loans`テーブル（`return_date IS NULL`）から復元する。
/// そのため、作品・会員の保存はそれぞれの固有の列のみを書き込む。
///
/// 複数集約の一括書き込み（`LendingLedger`）は1つのトランザクションで行う。
pub struct LibraryStore {
    pool: PgPool,
}

impl LibraryStore {
    /// PostgreSQLコネクションプールから新しいLibraryStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// スキーマのマイグレーションを適用する
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// 作品ごとの複本ID（登録順）
    async fn copy_ids_by_film(&self) -> Result<HashMap<String, Vec<CopyId>>> {
        let rows = sqlx::query(
            r#"
            SELECT copy_id, film_title
            FROM copies
            ORDER BY created_seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_film: HashMap<String, Vec<CopyId>> = HashMap::new();
        for row in rows {
            let film_title: String = row.try_get("film_title")?;
            let copy_id = CopyId::new(row.try_get::<String, _>("copy_id")?)?;
            by_film.entry(film_title).or_default().push(copy_id);
        }
        Ok(by_film)
    }

    /// 会員ごとの未返却貸出ID（貸出順）
    async fn open_loan_ids_by_member(&self) -> Result<HashMap<String, Vec<LoanId>>> {
        let rows = sqlx::query(
            r#"
            SELECT loan_id, membership_number
            FROM loans
            WHERE return_date IS NULL
            ORDER BY created_seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_member: HashMap<String, Vec<LoanId>> = HashMap::new();
        for row in rows {
            let number: String = row.try_get("membership_number")?;
            let loan_id = LoanId::from_uuid(row.try_get("loan_id")?);
            by_member.entry(number).or_default().push(loan_id);
        }
        Ok(by_member)
    }
}

#[async_trait]
impl FilmStore for LibraryStore {
    async fn save_film(&self, film: Film) -> Result<()> {
        insert_film(&self.pool, &film).await
    }

    async fn find_film_by_title(&self, title: &FilmTitle) -> Result<Option<Film>> {
        let exists = sqlx::query("SELECT title FROM films WHERE title = $1")
            .bind(title.as_str())
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            r#"
            SELECT copy_id
            FROM copies
            WHERE film_title = $1
            ORDER BY created_seq ASC
            "#,
        )
        .bind(title.as_str())
        .fetch_all(&self.pool)
        .await?;

        let copies = rows
            .iter()
            .map(|row| -> Result<CopyId> {
                Ok(CopyId::new(row.try_get::<String, _>("copy_id")?)?)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Film::restore(title.clone(), copies)))
    }

    async fn list_films(&self) -> Result<Vec<Film>> {
        let rows = sqlx::query("SELECT title FROM films ORDER BY title ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut copies = self.copy_ids_by_film().await?;

        rows.iter()
            .map(|row| -> Result<Film> {
                let title: String = row.try_get("title")?;
                let ids = copies.remove(&title).unwrap_or_default();
                Ok(Film::restore(FilmTitle::new(title)?, ids))
            })
            .collect()
    }
}

#[async_trait]
impl CopyStore for LibraryStore {
    async fn save_copy(&self, copy: FilmCopy) -> Result<()> {
        upsert_copy(&self.pool, &copy).await
    }

    async fn find_copy_by_id(&self, id: &CopyId) -> Result<Option<FilmCopy>> {
        let row = sqlx::query(
            r#"
            SELECT copy_id, film_title, borrower
            FROM copies
            WHERE copy_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_copy).transpose()
    }

    async fn list_copies(&self) -> Result<Vec<FilmCopy>> {
        let rows = sqlx::query(
            r#"
            SELECT copy_id, film_title, borrower
            FROM copies
            ORDER BY copy_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_copy).collect()
    }
}

#[async_trait]
impl MemberStore for LibraryStore {
    async fn save_member(&self, member: Member) -> Result<()> {
        upsert_member(&self.pool, &member).await
    }

    async fn find_member_by_number(&self, number: &MembershipNumber) -> Result<Option<Member>> {
        let Some(row) = sqlx::query(
            r#"
            SELECT membership_number, name
            FROM members
            WHERE membership_number = $1
            "#,
        )
        .bind(number.as_str())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let loan_rows = sqlx::query(
            r#"
            SELECT loan_id
            FROM loans
            WHERE membership_number = $1 AND return_date IS NULL
            ORDER BY created_seq ASC
            "#,
        )
        .bind(number.as_str())
        .fetch_all(&self.pool)
        .await?;

        let open_loans = loan_rows
            .iter()
            .map(|row| -> Result<LoanId> {
                Ok(LoanId::from_uuid(row.try_get("loan_id")?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Member::restore(
            number.clone(),
            MemberName::new(row.try_get::<String, _>("name")?)?,
            open_loans,
        )))
    }

    async fn list_members(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query(
            r#"
            SELECT membership_number, name
            FROM members
            ORDER BY membership_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let mut open_loans = self.open_loan_ids_by_member().await?;

        rows.iter()
            .map(|row| -> Result<Member> {
                let number: String = row.try_get("membership_number")?;
                let loans = open_loans.remove(&number).unwrap_or_default();
                Ok(Member::restore(
                    MembershipNumber::new(number)?,
                    MemberName::new(row.try_get::<String, _>("name")?)?,
                    loans,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl LoanStore for LibraryStore {
    async fn save_loan(&self, loan: Loan) -> Result<()> {
        insert_loan(&self.pool, &loan).await
    }

    async fn mark_loan_updated(&self, loan: Loan) -> Result<()> {
        update_loan(&self.pool, &loan).await
    }

    async fn find_open_loan_for_copy(&self, copy_id: &CopyId) -> Result<Option<Loan>> {
        let query = format!(
            "SELECT {} FROM loans WHERE copy_id = $1 AND return_date IS NULL",
            LOAN_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(copy_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn list_loans(&self) -> Result<Vec<Loan>> {
        let query = format!("SELECT {} FROM loans ORDER BY created_seq ASC", LOAN_COLUMNS);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(map_row_to_loan).collect()
    }
}

#[async_trait]
impl LendingLedger for LibraryStore {
    async fn record_new_copy(&self, film: Film, copy: FilmCopy) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        insert_film(&mut *tx, &film).await?;

        // 既存の複本IDは上書きしない
        let inserted = sqlx::query(
            r#"
            INSERT INTO copies (copy_id, film_title, borrower)
            VALUES ($1, $2, NULL)
            ON CONFLICT (copy_id) DO NOTHING
            "#,
        )
        .bind(copy.id().as_str())
        .bind(copy.film().as_str())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(GatewayError::from(format!(
                "copy {} is already saved",
                copy.id()
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn record_borrow(&self, loan: Loan, copy: FilmCopy, member: Member) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        insert_loan(&mut *tx, &loan).await?;
        upsert_copy(&mut *tx, &copy).await?;
        upsert_member(&mut *tx, &member).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn record_return(&self, loan: Loan, copy: FilmCopy, member: Member) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        update_loan(&mut *tx, &loan).await?;
        upsert_copy(&mut *tx, &copy).await?;
        upsert_member(&mut *tx, &member).await?;

        tx.commit().await?;
        Ok(())
    }
}
