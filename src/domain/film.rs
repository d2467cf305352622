use serde::{Deserialize, Serialize};

use super::{CopyId, FilmCopy, FilmTitle};

/// Film集約 - 貸出カタログに登録された作品
///
/// 複本はIDで保持する。複本の貸出状態は複本集約が持つため、
/// 在庫数は複本の現在状態を受け取って算出する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Film {
    title: FilmTitle,
    copies: Vec<CopyId>,
}

impl Film {
    pub fn new(title: FilmTitle) -> Self {
        Self {
            title,
            copies: Vec::new(),
        }
    }

    /// 永続化層から復元する
    pub fn restore(title: FilmTitle, copies: Vec<CopyId>) -> Self {
        Self { title, copies }
    }

    pub fn title(&self) -> &FilmTitle {
        &self.title
    }

    /// 登録順の複本ID
    pub fn copy_ids(&self) -> &[CopyId] {
        &self.copies
    }

    pub fn total_copies(&self) -> usize {
        self.copies.len()
    }

    /// 複本を登録する
    ///
    /// 複本の所属作品がこの作品でない場合、または登録済みの場合は何もせず`false`を返す。
    pub fn add_copy(&mut self, copy: &FilmCopy) -> bool {
        if copy.film() != &self.title || self.copies.contains(copy.id()) {
            return false;
        }
        self.copies.push(copy.id().clone());
        true
    }

    /// 貸出可能な複本数
    ///
    /// 渡された複本のうち、この作品に登録済みで貸出中でないものを数える。
    pub fn number_available<'a>(&self, copies: impl IntoIterator<Item = &'a FilmCopy>) -> usize {
        copies
            .into_iter()
            .filter(|copy| copy.film() == &self.title && self.copies.contains(copy.id()))
            .filter(|copy| !copy.is_on_loan())
            .count()
    }
}
