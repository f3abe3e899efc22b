//! # Typed Mutations
//!
//! Every edit the dashboard can make to the settings document.
//! `Setting::apply` works on an owned copy and never touches `created_at`;
//! stamping is the reconciler's job.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::{Block, Layout, Link, Setting, ThemeSolution};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Appends a block to the grid. Its layout is replaced by the next free
    /// slot: below `anchor` in that block's column, or in the left column.
    AddBlock { block: Block, anchor: Option<String> },
    UpdateBlock { block_id: String, title: String },
    /// Removes a block together with all of its links.
    DeleteBlock { block_id: String },
    /// Inserts after `after`, or at the end when `after` is `None`.
    InsertLink {
        block_id: String,
        after: Option<String>,
        link: Link,
    },
    /// Replaces the link with the same id.
    UpdateLink { block_id: String, link: Link },
    DeleteLink { block_id: String, link_id: String },
    /// Moves a link to `index` of another (or the same) block.
    MoveLink {
        from_block: String,
        link_id: String,
        to_block: String,
        index: usize,
    },
    /// Layout emitted by the grid engine, matched to blocks by `i`.
    ApplyLayout(Vec<Layout>),
    SetTheme(ThemeSolution),
}

impl Mutation {
    pub fn is_layout(&self) -> bool {
        matches!(self, Mutation::ApplyLayout(_))
    }
}

impl Setting {
    /// Returns a new document with `mutation` applied.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown block or link ids, `Conflict` for reused ids,
    /// `ValidationError` for empty ids. The receiver is never modified.
    pub fn apply(&self, mutation: Mutation) -> Result<Setting> {
        let mut next = self.clone();

        match mutation {
            Mutation::AddBlock { mut block, anchor } => {
                let ids = std::iter::once(("block", &block.id))
                    .chain(block.buttons.iter().map(|link| ("link", &link.id)));
                let mut seen = HashSet::new();
                for (kind, id) in ids {
                    require_id(kind, id)?;
                    if next.contains_id(id) || !seen.insert(id.as_str()) {
                        return Err(AppError::Conflict(format!("id {id} already in use")));
                    }
                }
                if let Some(anchor) = &anchor {
                    if next.find_block(anchor).is_none() {
                        return Err(AppError::block_not_found(anchor));
                    }
                }
                block.layout = next.next_block_layout(&block.id, anchor.as_deref());
                next.links.push(block);
            }
            Mutation::UpdateBlock { block_id, title } => {
                let block = next
                    .find_block_mut(&block_id)
                    .ok_or_else(|| AppError::block_not_found(&block_id))?;
                block.title = title;
            }
            Mutation::DeleteBlock { block_id } => {
                let before = next.links.len();
                next.links.retain(|block| block.id != block_id);
                if next.links.len() == before {
                    return Err(AppError::block_not_found(&block_id));
                }
            }
            Mutation::InsertLink {
                block_id,
                after,
                link,
            } => {
                require_id("link", &link.id)?;
                if next.contains_id(&link.id) {
                    return Err(AppError::Conflict(format!("id {} already in use", link.id)));
                }
                let block = next
                    .find_block_mut(&block_id)
                    .ok_or_else(|| AppError::block_not_found(&block_id))?;
                let index = match after {
                    Some(after) => block
                        .position_after(&after)
                        .ok_or_else(|| AppError::link_not_found(&after))?,
                    None => block.buttons.len(),
                };
                block.buttons.insert(index, link);
            }
            Mutation::UpdateLink { block_id, link } => {
                let block = next
                    .find_block_mut(&block_id)
                    .ok_or_else(|| AppError::block_not_found(&block_id))?;
                let slot = block
                    .buttons
                    .iter_mut()
                    .find(|existing| existing.id == link.id)
                    .ok_or_else(|| AppError::link_not_found(&link.id))?;
                *slot = link;
            }
            Mutation::DeleteLink { block_id, link_id } => {
                let block = next
                    .find_block_mut(&block_id)
                    .ok_or_else(|| AppError::block_not_found(&block_id))?;
                block
                    .remove_link(&link_id)
                    .ok_or_else(|| AppError::link_not_found(&link_id))?;
            }
            Mutation::MoveLink {
                from_block,
                link_id,
                to_block,
                index,
            } => {
                if next.find_block(&to_block).is_none() {
                    return Err(AppError::block_not_found(&to_block));
                }
                let moving = next
                    .find_block_mut(&from_block)
                    .ok_or_else(|| AppError::block_not_found(&from_block))?
                    .remove_link(&link_id)
                    .ok_or_else(|| AppError::link_not_found(&link_id))?;
                // checked above
                if let Some(target) = next.find_block_mut(&to_block) {
                    let index = index.min(target.buttons.len());
                    target.buttons.insert(index, moving);
                }
            }
            Mutation::ApplyLayout(layouts) => {
                for block in &mut next.links {
                    if let Some(layout) = layouts.iter().find(|layout| layout.i == block.id) {
                        block.layout = layout.clone();
                    }
                }
            }
            Mutation::SetTheme(solution) => {
                next.theme.solution = solution;
            }
        }

        Ok(next)
    }
}

fn require_id(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{kind} id must not be empty")));
    }
    Ok(())
}
