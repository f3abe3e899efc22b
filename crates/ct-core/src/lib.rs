//! candi-tab/crates/ct-core/src/lib.rs
//!
//! The settings document, its typed mutations, and the logic that keeps the
//! local copy and the remote gist in step.

pub mod drag;
pub mod error;
pub mod models;
pub mod mutation;
pub mod reconcile;
pub mod store;
pub mod style;
pub mod sync;
pub mod traits;
pub mod transfer;

// Re-exporting for easier access in other crates
pub use drag::*;
pub use error::*;
pub use models::*;
pub use mutation::*;
pub use reconcile::*;
pub use store::*;
pub use sync::*;
pub use traits::*;
pub use transfer::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use super::transfer::*;

    #[test]
    fn test_export_round_trip() {
        let mut block = Block::new(gid(), "Daily", Setting::default().next_block_layout("", None));
        block.buttons.push(Link::new("Calendar", "https://calendar.example.com"));
        let setting = Setting {
            gist_id: Some("g".into()),
            created_at: 42,
            theme: ThemeSetting { solution: ThemeSolution::Light },
            links: vec![block],
        };

        let exported = export_document(&setting).unwrap();
        assert_eq!(parse_document(&exported), Some(setting));
    }
}
