use thiserror::Error;

/// 入力値のエラー
///
/// 状態に触れる前に検出される。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 必須項目が空、または空白のみ
    #[error("{0} must not be blank")]
    Blank(&'static str),
    /// 在庫下限が負の値
    #[error("minimum available copies must not be negative (got {0})")]
    NegativeThreshold(i64),
}

/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowError {
    /// 複本が既に貸出中
    AlreadyOnLoan,
    /// 会員の貸出数が上限に達している
    LoanLimitExceeded,
    /// 会員が貸出を受け付けなかった（上限と会員番号の検査に失敗）
    LoanRejected,
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnError {
    /// 複本が貸出中ではない
    NotOnLoan,
    /// 貸出記録が渡された複本・会員と一致しない
    LoanMismatch,
    /// 既に返却済み
    AlreadyReturned,
}

/// 貸出記録を閉じる際のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseLoanError {
    /// 既に返却日が記録されている
    AlreadyClosed,
}

impl From<CloseLoanError> for ReturnError {
    fn from(err: CloseLoanError) -> Self {
        match err {
            CloseLoanError::AlreadyClosed => ReturnError::AlreadyReturned,
        }
    }
}
