//! In-memory stand-in for a paged backend. Requests are answered from the
//! timer queue after a fixed latency, like a network round trip would be.

use std::rc::Rc;
use std::time::Duration;

use harbor_core::{FetchResponder, Page, Signal, Timers};

pub const LATENCY: Duration = Duration::from_millis(120);

pub struct Catalog {
    entries: Vec<String>,
    page_size: usize,
}

impl Catalog {
    pub fn new(entries: Vec<String>, page_size: usize) -> Self {
        Self {
            entries,
            page_size: page_size.max(1),
        }
    }

    pub fn demo(page_size: usize) -> Self {
        let names = [
            "anchor", "ballast", "bollard", "buoy", "capstan", "cleat", "davit", "dock",
            "ferry", "gangway", "harbor", "hawser", "jetty", "keel", "lighthouse", "mooring",
            "pier", "quay", "rudder", "slipway", "tugboat", "wharf",
        ];
        let entries = names
            .iter()
            .flat_map(|n| [n.to_string(), format!("{n} (north)")])
            .collect();
        Self::new(entries, page_size)
    }

    /// Page starting at `offset` among entries containing `filter`; the
    /// cursor is the offset of the next page.
    pub fn page(&self, filter: &str, offset: usize) -> Page<usize, String> {
        let matching: Vec<&String> = self.entries.iter().filter(|e| e.contains(filter)).collect();
        let end = (offset + self.page_size).min(matching.len());
        let items = matching
            .get(offset..end)
            .map(|s| s.iter().map(|e| e.to_string()).collect())
            .unwrap_or_default();
        let cursor = (end < matching.len()).then_some(end);
        Page::new(items, cursor)
    }
}

/// Fetcher for the loader: reads the current filter when the request is
/// issued and resolves after [`LATENCY`].
pub fn fetcher(
    catalog: Rc<Catalog>,
    filter: Signal<String>,
    timers: Timers,
) -> impl Fn(Option<usize>, FetchResponder<usize, String>) + 'static {
    move |cursor: Option<usize>, responder: FetchResponder<usize, String>| {
        let offset = cursor.unwrap_or(0);
        let page = catalog.page(&filter.get(), offset);
        log::debug!("catalog: offset {offset} -> {} items", page.items.len());
        timers.set_timeout(LATENCY, move || {
            if responder.is_wanted() {
                responder.succeed(page);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_core::ManualClock;

    #[test]
    fn pages_until_exhausted() {
        let c = Catalog::new((0..5).map(|i| format!("item {i}")).collect(), 2);
        assert_eq!(c.page("", 0).cursor, Some(2));
        assert_eq!(c.page("", 4), Page::new(vec!["item 4".to_string()], None));
        assert!(c.page("", 9).items.is_empty());
        assert_eq!(c.page("3", 0).items, vec!["item 3".to_string()]);
    }

    #[test]
    fn fetcher_answers_after_latency() {
        let clock = ManualClock::new();
        let timers = Timers::new(Rc::new(clock.clone()));
        let catalog = Rc::new(Catalog::demo(4));
        let fetch = fetcher(catalog, harbor_core::signal("pier".to_string()), timers.clone());

        let vp = harbor_core::Viewport::new(harbor_core::Rect::new(0.0, 0.0, 10.0, 10.0));
        let loader = harbor_core::IncrementalLoader::new(
            "pier",
            &vp,
            fetch,
            harbor_core::LoaderOptions::default().fetch_on_mount(true),
        );
        assert!(loader.is_loading());
        timers.run_due();
        assert!(loader.is_loading());

        clock.advance(LATENCY);
        timers.run_due();
        assert_eq!(loader.items(), vec!["pier".to_string(), "pier (north)".to_string()]);
        assert!(!loader.has_next_page());
    }
}
