pub mod copy_store;
pub mod film_store;
pub mod lending_ledger;
pub mod loan_store;
pub mod member_store;

pub use copy_store::CopyStore;
pub use film_store::FilmStore;
pub use lending_ledger::LendingLedger;
pub use loan_store::LoanStore;
pub use member_store::MemberStore;

/// ゲートウェイ実装が返すエラー
///
/// 保存技術ごとのエラーをそのまま包む。ビジネスルールのエラーは含まない。
pub type GatewayError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// 永続化ゲートウェイ
///
/// 作品・複本・会員・貸出の4種のストアと、複数集約の一括書き込みを提供する保存先。
/// 保存技術（メモリ、PostgreSQL）を差し替えても貸出サービスは変更不要。
pub trait LibraryGateway:
    FilmStore + CopyStore + MemberStore + LoanStore + LendingLedger
{
}

impl<T> LibraryGateway for T where
    T: FilmStore + CopyStore + MemberStore + LoanStore + LendingLedger
{
}
