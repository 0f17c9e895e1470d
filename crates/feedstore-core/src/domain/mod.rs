//! Domain model (ids, feed image records, snapshots, errors).
//!
//! ストアが扱う値型はすべてここに置きます。振る舞いは持たず、
//! 呼び出し側には常に owned な値（clone）を返します。

pub mod ids;
pub mod image;
pub mod snapshot;
pub mod errors;

pub use ids::{ImageId, ParseImageIdError};
pub use image::FeedImageRecord;
pub use snapshot::{CacheSnapshot, CachedFeed};
pub use errors::{BackendError, ErrorKind, StoreError};
