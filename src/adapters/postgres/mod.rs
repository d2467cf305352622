pub mod library_store;

// パブリックに型を再エクスポート
pub use library_store::LibraryStore as PostgresLibraryStore;
