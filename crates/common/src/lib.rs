/**
 * Prefix-based access grants and the
 *  provider trait for storing them.
 */
pub mod access;
/**
 * Error taxonomy shared by stores and the gateway.
 */
pub mod error;
/**
 * Human-readable formatting helpers for listings.
 */
pub mod format;
/**
 * The single entry point where principals
 *  meet the served tree: authorization,
 *  listings, search and share/grant management.
 */
pub mod gateway;
/**
 * In-memory mirror of the served tree,
 *  mutated only by filesystem events.
 */
pub mod index;
/**
 * Ordered, first-match-wins stack of
 *  UI asset sources (themes over defaults).
 */
pub mod overlay;
/**
 * Normalized absolute paths inside the served tree.
 */
pub mod path;
/**
 * Anonymous share links: token minting,
 *  resolution and the provider trait.
 */
pub mod share;
/**
 * OS filesystem watcher feeding the index's
 *  single writer.
 */
pub mod watcher;

pub mod prelude {
    pub use crate::access::{is_permitted, Grant, GrantStore, MemoryGrantStore};
    pub use crate::error::{GatewayError, StoreError};
    pub use crate::gateway::{AccessGateway, Decision, Listing, ListingEntry, Opened, Principal, Scope};
    pub use crate::index::{FileIndex, IndexEvent, IndexNode, SearchHit};
    pub use crate::overlay::{Asset, AssetSource, DirSource, OverlayFs};
    pub use crate::path::{PathError, TreePath};
    pub use crate::share::{MemoryShareStore, ShareLink, ShareRegistry, ShareStore};
    pub use crate::watcher::{FsWatcher, WatchError};
}
