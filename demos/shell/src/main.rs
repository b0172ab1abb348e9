//! Harbor shell: a headless run of the application shell.
//!
//! Restores the saved session and back stack, signs in when needed, then
//! drives the home page: a paged catalog list that loads more as its
//! sentinel scrolls into view, filtered by a debounced search box.
//!
//! ```text
//! RUST_LOG=debug cargo run -p harbor-shell -- --config shell.json [--logout]
//! ```

mod catalog;
mod config;

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use harbor_core::*;
use harbor_navigation::{AuthSession, Navigator, Route, RouteDecision, UserIdentity};

use crate::catalog::Catalog;
use crate::config::{Args, ShellConfig};

const NAV_KEY: &str = "nav";
const ROW_HEIGHT: f32 = 40.0;
const VIEW: Rect = Rect {
    x: 0.0,
    y: 0.0,
    w: 360.0,
    h: 400.0,
};
const TICK: Duration = Duration::from_millis(50);
const TOAST_FOR: Duration = Duration::from_secs(2);
const MAX_FRAMES: usize = 400;

/// What the simulated user types into the search box, by frame.
const TYPING: &[(usize, &str)] = &[(30, "p"), (32, "pi"), (34, "pie")];

type CatalogLoader = IncrementalLoader<usize, String>;

struct Shell {
    config: ShellConfig,
    store: Arc<dyn DurableStore>,
    session: AuthSession,
    nav: Navigator,
    timers: Timers,
    viewport: Viewport,
    sentinel: ElementId,
    portals: PortalRoot<String>,
    catalog: Rc<Catalog>,
}

impl Shell {
    fn new(config: ShellConfig, store: Arc<dyn DurableStore>) -> Self {
        let session = AuthSession::new(store.clone());
        let nav = Navigator::new(Route::Home, session.clone());
        if let Some(saved) = store.get(NAV_KEY).unwrap_or_else(|e| {
            log::warn!("shell: could not read saved back stack: {e}");
            None
        }) {
            nav.from_json(&saved);
        }

        let viewport = Viewport::new(VIEW);
        let sentinel = viewport.mount_element(Rect::new(0.0, 0.0, VIEW.w, 1.0));
        let portals = PortalRoot::new();
        portals.mount(config.portal_target.clone());
        let catalog = Rc::new(Catalog::demo(config.page_size));

        Self {
            config,
            store,
            session,
            nav,
            timers: Timers::default(),
            viewport,
            sentinel,
            portals,
            catalog,
        }
    }

    fn toast(&self, text: String) {
        log::info!("toast: {text}");
        let dismiss = Portal::new(&self.portals, Some(self.config.portal_target.as_str())).render(text);
        self.timers.set_timeout(TOAST_FOR, move || dismiss.run());
    }

    fn sign_in(&self) {
        if let RouteDecision::Redirect(to) = self.nav.push_path(Route::Home.path()) {
            log::info!("shell: signed out, showing {}", to.path());
        }
        if self.nav.current() == Route::Login {
            let user = UserIdentity {
                name: Some("Demo Sailor".into()),
                email: Some("demo@harbor.test".into()),
                ..UserIdentity::with_id(1)
            };
            self.session.login(user, Some("demo-token".into()));
            self.toast("Signed in as Demo Sailor".into());
        }
        self.nav.clear_and_push(Route::Home);
    }

    /// One composition pass of the home page.
    fn home(&self, scope: &Scope, typed: &str) -> (Debounced<String>, CatalogLoader) {
        compose(scope, || {
            let search = remember_debounced(
                "search",
                &self.timers,
                typed.to_string(),
                self.config.debounce(),
            );
            let filter = search.get();
            let fetch = catalog::fetcher(self.catalog.clone(), search.signal(), self.timers.clone());
            let loader = remember_incremental_loader(
                "catalog",
                &format!("catalog:{filter}"),
                &self.viewport,
                fetch,
                || {
                    LoaderOptions::default()
                        .with_threshold(self.config.visibility_threshold)
                        .fetch_on_mount(self.config.fetch_on_mount)
                },
            );
            loader.sentinel().set(Some(self.sentinel));
            (search, loader)
        })
    }

    /// Lay the sentinel out below the rows and scroll it into view.
    fn layout(&self, rows: usize) {
        let bottom = rows as f32 * ROW_HEIGHT;
        self.viewport
            .set_element_rect(self.sentinel, Rect::new(0.0, bottom, VIEW.w, 1.0));
        let offset = (bottom + 1.0 - VIEW.h).max(0.0);
        self.viewport.scroll_to(Vec2 { x: 0.0, y: offset });
    }

    fn run(&self, logout: bool) -> anyhow::Result<()> {
        self.sign_in();
        let (_, _, scope) = self.nav.top();

        let mut typed = "";
        let mut shown = usize::MAX;
        let mut frames = 0;
        let mut settled = None;
        while frames < MAX_FRAMES {
            if let Some(&(_, text)) = TYPING.iter().find(|(f, _)| *f == frames) {
                log::info!("search: typed '{text}'");
                typed = text;
            }

            let (search, loader) = self.home(&scope, typed);
            let items = loader.items();
            if items.len() != shown {
                shown = items.len();
                log::info!(
                    "list [{}]: {} rows, status {:?}, more: {}",
                    search.get(),
                    shown,
                    loader.status(),
                    loader.has_next_page()
                );
            }
            if let Some(err) = loader.error() {
                log::warn!("list: {err}; retrying");
                loader.retry();
            }
            self.layout(items.len());

            let typing_done = TYPING.last().is_none_or(|(f, _)| frames > *f);
            let idle = !loader.is_loading() && !loader.has_next_page();
            if typing_done && idle && search.get() == typed && self.timers.pending() == 0 {
                settled = Some(items);
                break;
            }

            std::thread::sleep(TICK);
            self.timers.run_due();
            frames += 1;
        }

        match settled {
            Some(items) => log::info!("settled after {frames} frames: {items:?}"),
            None => log::warn!("gave up after {frames} frames"),
        }

        self.store.set(NAV_KEY, &self.nav.to_json())?;
        if logout {
            self.nav.logout();
            self.store.set(NAV_KEY, &self.nav.to_json())?;
        }
        log::info!(
            "shell: leaving at {} (signed in: {})",
            self.nav.current().path(),
            self.session.is_authenticated()
        );
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = ShellConfig::resolve(args.config.as_deref())?;
    log::debug!("config: {config:?}");

    let store: Arc<dyn DurableStore> = Arc::new(FileStore::open(&config.storage_path)?);
    Shell::new(config, store).run(args.logout)
}
