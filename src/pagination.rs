//! Range-based retrieval on top of page-based listing endpoints
//!
//! Users ask for a 1-based window of items (`--range-start`, `--range-end`,
//! `--list-all`); the console API only understands `page`/`per_page`. This
//! module maps the former onto the latter:
//!
//! - the requested window is converted to 0-based offsets
//! - only the pages overlapping the window are fetched, in order
//! - fetching stops early once the reported total has been exhausted
//! - the concatenated pages are trimmed back to exactly the window
//!
//! Fetch errors abort the whole range; partially fetched pages are dropped.

use std::future::Future;

use tracing::debug;

use crate::error::RangeError;

/// Number of items returned when `--range-end` is left at its sentinel
pub const DEFAULT_WINDOW: i64 = 50;

/// `--range-start` default (first item)
pub const DEFAULT_RANGE_START: i64 = 1;

/// `--range-end` sentinel meaning "start plus the default window"
pub const RANGE_END_DEFAULT_WINDOW: i64 = -1;

/// `--range-end` value meaning "through the last available item"
pub const RANGE_END_ALL: i64 = 0;

/// User-facing range arguments as given on the command line
///
/// `start`/`end` are `None` when the flag was not supplied, which is how the
/// `--list-all` conflict check distinguishes explicit values from defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeArgs {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub list_all: bool,
}

impl RangeArgs {
    pub fn new(start: Option<i64>, end: Option<i64>, list_all: bool) -> Self {
        Self {
            start,
            end,
            list_all,
        }
    }

    /// Everything, from the first item to the last
    pub fn all() -> Self {
        Self::new(None, None, true)
    }

    /// Rejects inconsistent flag combinations
    pub fn validate(&self) -> Result<(), RangeError> {
        if self.list_all && (self.start.is_some() || self.end.is_some()) {
            return Err(RangeError::ListAllWithRange);
        }
        let start = self.start.unwrap_or(DEFAULT_RANGE_START);
        if start < 1 {
            return Err(RangeError::StartBelowOne(start));
        }
        let end = self.end.unwrap_or(RANGE_END_DEFAULT_WINDOW);
        if end != RANGE_END_DEFAULT_WINDOW && end != RANGE_END_ALL && end <= start {
            return Err(RangeError::EndNotAfterStart { start, end });
        }
        Ok(())
    }

    /// Resolves to 0-based `[start, end)` offsets
    fn resolve(&self) -> (i64, i64) {
        if self.list_all {
            return (0, i64::MAX);
        }
        let start = self.start.unwrap_or(DEFAULT_RANGE_START) - 1;
        let end = match self.end.unwrap_or(RANGE_END_DEFAULT_WINDOW) {
            RANGE_END_DEFAULT_WINDOW => start.saturating_add(DEFAULT_WINDOW),
            RANGE_END_ALL => i64::MAX,
            end => end - 1,
        };
        (start, end)
    }
}

/// One page request handed to the fetch callback (page is 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

/// What a page fetch reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchResult {
    pub items_returned: u64,
    pub total_available: u64,
}

/// Offsets into the concatenation of all fetched pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

/// Page-walking state for one range retrieval
///
/// Holds the arithmetic shared by [`fetch_window`] and [`fetch_range`]; the
/// page size is fixed for the lifetime of the value.
#[derive(Debug, Clone)]
pub struct Paginator {
    page_size: i64,
    cur_page: i64,
    last_page: i64,
    total_available: i64,
    accumulated: i64,
    slice_start: i64,
    slice_end: i64,
}

impl Paginator {
    pub fn new(range: &RangeArgs, page_size: i64) -> Result<Self, RangeError> {
        range.validate()?;
        if page_size <= 0 {
            return Err(RangeError::InvalidPageSize(page_size));
        }

        let (range_start, range_end) = range.resolve();
        let cur_page = range_start / page_size;
        let offset = cur_page * page_size;

        Ok(Self {
            page_size,
            cur_page,
            last_page: (range_end / page_size).saturating_add(1),
            // unknown until the first page reports it
            total_available: i64::MAX,
            accumulated: 0,
            slice_start: range_start - offset,
            slice_end: range_end - offset,
        })
    }

    /// The next page to fetch, or `None` once the range or the data is exhausted
    pub fn next_request(&self) -> Option<PageRequest> {
        if self.cur_page < self.last_page
            && self.page_size.saturating_mul(self.cur_page) < self.total_available
        {
            Some(PageRequest {
                page: (self.cur_page + 1) as u64,
                per_page: self.page_size as u64,
            })
        } else {
            None
        }
    }

    /// Records the outcome of the page returned by the last `next_request`
    pub fn record(&mut self, result: FetchResult) {
        self.accumulated = self
            .accumulated
            .saturating_add(clamp_u64(result.items_returned));
        self.total_available = clamp_u64(result.total_available);
        self.cur_page += 1;
    }

    /// Window into the accumulated items, clamped to what was fetched
    pub fn window(&self) -> Window {
        let start = self.slice_start.clamp(0, self.accumulated);
        let end = self.slice_end.clamp(start, self.accumulated);
        Window {
            start: start as usize,
            end: end as usize,
        }
    }
}

fn clamp_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Drives page fetches for `range` and reports where the window lies in the
/// caller's accumulated buffer
///
/// The callback performs one page fetch, keeps the items itself and reports
/// `(items_returned, total_available)`.
pub async fn fetch_window<F, Fut, E>(
    range: &RangeArgs,
    page_size: i64,
    mut fetch_page: F,
) -> Result<Window, E>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<FetchResult, E>>,
    E: From<RangeError>,
{
    let mut pager = Paginator::new(range, page_size)?;
    while let Some(request) = pager.next_request() {
        debug!("Fetching page {} ({} per page)", request.page, request.per_page);
        let result = fetch_page(request).await?;
        pager.record(result);
    }

    let window = pager.window();
    debug!("Range resolved to items {}..{}", window.start, window.end);
    Ok(window)
}

/// A page of items as returned by a listing endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Fetches exactly the items in `range`, in server order
pub async fn fetch_range<T, F, Fut, E>(
    range: &RangeArgs,
    page_size: i64,
    mut fetch_page: F,
) -> Result<Vec<T>, E>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
    E: From<RangeError>,
{
    let mut pager = Paginator::new(range, page_size)?;
    let mut items = Vec::new();

    while let Some(request) = pager.next_request() {
        debug!("Fetching page {} ({} per page)", request.page, request.per_page);
        let page = fetch_page(request).await?;
        pager.record(FetchResult {
            items_returned: page.items.len() as u64,
            total_available: page.total,
        });
        items.extend(page.items);
    }

    let window = pager.window();
    items.truncate(window.end);
    items.drain(..window.start);
    Ok(items)
}
