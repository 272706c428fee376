//! Scrapers for the listing site the ingest job reads from.
//!
//! Scrapers follow a two-phase pattern:
//!
//! 1. **Indexing**: Discover article URLs from the listing (`index_articles()`)
//! 2. **Fetching**: Download and extract each URL as a lazy stream
//!    (`fetch_articles(urls)`)
//!
//! Every request after the first, listing pages included, waits a fixed
//! pause. Failed fetches are logged and skipped.

pub mod blog;
