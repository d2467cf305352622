use crate::domain::{CopyId, MAX_LOANS, MembershipNumber, ValidationError};
use crate::ports::GatewayError;
use std::fmt;
use thiserror::Error;

/// 自然キーで識別されるエンティティの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Film,
    Copy,
    Member,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Film => "Film",
            EntityKind::Copy => "Copy",
            EntityKind::Member => "Member",
        };
        f.write_str(name)
    }
}

/// 貸出サービスのエラー
///
/// どの操作も、このいずれかに分類されたエラーを返す。
/// `InconsistentState`と`Gateway`以外は、状態を変更する前に検出される。
#[derive(Debug, Error)]
pub enum LendingError {
    /// 入力値が不正（空白のみの必須項目、負の下限値）
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// 自然キーが既に使われている
    #[error("{kind} '{key}' already exists")]
    DuplicateKey { kind: EntityKind, key: String },

    /// 自然キーに該当するエンティティがない
    #[error("{kind} '{key}' not found")]
    NotFound { kind: EntityKind, key: String },

    /// 複本が既に貸出中
    #[error("Copy '{0}' is already on loan")]
    AlreadyOnLoan(CopyId),

    /// 会員の貸出数が上限に達している
    #[error("Member '{member}' has reached the maximum number of loans ({limit})")]
    LoanLimitExceeded {
        member: MembershipNumber,
        limit: usize,
    },

    /// 複本が貸出中ではない
    #[error("Copy '{0}' is not currently on loan")]
    NotOnLoan(CopyId),

    /// 集約間の不変条件が崩れている（どこかに不具合がある）
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// ゲートウェイのエラー
    #[error("Gateway error")]
    Gateway(#[source] GatewayError),
}

impl LendingError {
    pub(super) fn duplicate(kind: EntityKind, key: impl fmt::Display) -> Self {
        LendingError::DuplicateKey {
            kind,
            key: key.to_string(),
        }
    }

    pub(super) fn not_found(kind: EntityKind, key: impl fmt::Display) -> Self {
        LendingError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub(super) fn limit_exceeded(member: MembershipNumber) -> Self {
        LendingError::LoanLimitExceeded {
            member,
            limit: MAX_LOANS,
        }
    }

    /// 不変条件の崩れは握りつぶさず、必ずログに残す
    pub(super) fn inconsistent(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("Lending invariant broken: {}", message);
        LendingError::InconsistentState(message)
    }
}

/// 貸出サービスの Result型
pub type Result<T> = std::result::Result<T, LendingError>;
