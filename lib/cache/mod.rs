/// Time sources for cache expiry.
pub mod clock;
/// Open-handle cache keyed by inode.
pub mod fileinfo;
